// crates/types/src/message.rs
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Message direction relative to the business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inbound" | "in" => Some(Self::Inbound),
            "outbound" | "out" => Some(Self::Outbound),
            _ => None,
        }
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    Business,
    Customer,
    System,
}

impl SenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::Customer => "customer",
            Self::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "business" | "page" | "agent" => Some(Self::Business),
            "customer" | "user" => Some(Self::Customer),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parse_is_lenient() {
        assert_eq!(Direction::parse("Inbound"), Some(Direction::Inbound));
        assert_eq!(Direction::parse(" outbound "), Some(Direction::Outbound));
        assert_eq!(Direction::parse("sideways"), None);
    }

    #[test]
    fn test_sender_aliases() {
        assert_eq!(SenderType::parse("page"), Some(SenderType::Business));
        assert_eq!(SenderType::parse("user"), Some(SenderType::Customer));
        assert_eq!(SenderType::parse("SYSTEM"), Some(SenderType::System));
        assert_eq!(SenderType::System.as_str(), "system");
    }
}
