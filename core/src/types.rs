//! Shared primitive types used across the whole engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A segment label, e.g. "ММБ" or "КСБ".
pub type SegmentLabel = String;

/// A distribution channel name as it appears in the reference tables.
pub type ChannelName = String;

/// Label used for records without a segment.
pub const UNKNOWN_SEGMENT: &str = "Unknown";

/// Relationship of a record to the bank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// Total addressable market.
    Market,
    /// Active, already-banked company.
    Client,
    /// Dormant or non-banked company.
    NonClient,
    /// Any other label found in the source data.
    Other(String),
}

impl Relationship {
    /// Source files carry the Russian labels; English names are accepted too.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Рынок" | "Market" => Relationship::Market,
            "Клиент" | "Client" => Relationship::Client,
            "НеКлиент" | "NonClient" => Relationship::NonClient,
            other => Relationship::Other(other.to_string()),
        }
    }

    pub fn is_market(&self) -> bool {
        matches!(self, Relationship::Market)
    }
}

/// Product variant priced in the cost reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    /// Off-the-shelf product ("Коробка").
    #[default]
    Boxed,
    /// Tailored product ("Кастом").
    Custom,
}

impl ProductType {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "boxed" | "box" | "коробка" => Some(ProductType::Boxed),
            "custom" | "кастом" => Some(ProductType::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductType::Boxed => write!(f, "boxed"),
            ProductType::Custom => write!(f, "custom"),
        }
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
