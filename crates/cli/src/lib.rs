//! The `replyradar` command line: evaluate conversations, recompute
//! follow-up episodes and inspect the classifier gate from JSON input.

pub mod commands;
pub mod input;
