//! Channel reference tables — read-only lookups keyed by composite keys.
//!
//! Every lookup returns `Option`; a missing entry is a normal outcome
//! the evaluator turns into a "no" decision, never an error.

use crate::{
    config::read_json,
    types::{ChannelName, ProductType, SegmentLabel},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelSegmentKey {
    pub channel: ChannelName,
    pub segment: SegmentLabel,
}

impl ChannelSegmentKey {
    pub fn new(channel: &str, segment: &str) -> Self {
        Self {
            channel: channel.to_string(),
            segment: segment.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CostKey {
    pub channel: ChannelName,
    pub segment: SegmentLabel,
    pub product_type: ProductType,
}

impl CostKey {
    pub fn new(channel: &str, segment: &str, product_type: ProductType) -> Self {
        Self {
            channel: channel.to_string(),
            segment: segment.to_string(),
            product_type,
        }
    }
}

/// Default commercial parameters of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentDefaults {
    /// Ownership share, percent.
    pub ownership_share: f64,
    /// Profit coefficient, percent.
    pub profit_coefficient: f64,
}

// ── File shapes ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityEntry {
    pub segment: SegmentLabel,
    pub channels: Vec<ChannelName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinClientsEntry {
    pub channel: ChannelName,
    pub segment: SegmentLabel,
    pub min_clients: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostPriceEntry {
    pub channel: ChannelName,
    pub segment: SegmentLabel,
    pub product_type: ProductType,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDefaultsEntry {
    pub segment: SegmentLabel,
    #[serde(flatten)]
    pub defaults: SegmentDefaults,
}

#[derive(Debug, Clone, Deserialize)]
struct EligibilityFile {
    segments: Vec<EligibilityEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct MinClientsFile {
    entries: Vec<MinClientsEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct CostPriceFile {
    entries: Vec<CostPriceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct SegmentDefaultsFile {
    segments: Vec<SegmentDefaultsEntry>,
}

// ── Tables ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    eligibility: HashMap<SegmentLabel, Vec<ChannelName>>,
    min_clients: HashMap<ChannelSegmentKey, f64>,
    cost_prices: HashMap<CostKey, f64>,
    segment_defaults: HashMap<SegmentLabel, SegmentDefaults>,
}

impl ReferenceTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `{data_dir}/reference/`.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let dir = format!("{data_dir}/reference");
        let eligibility: EligibilityFile = read_json(&format!("{dir}/channel_eligibility.json"))?;
        let min_clients: MinClientsFile = read_json(&format!("{dir}/min_clients.json"))?;
        let cost_prices: CostPriceFile = read_json(&format!("{dir}/cost_prices.json"))?;
        let defaults: SegmentDefaultsFile = read_json(&format!("{dir}/segment_defaults.json"))?;

        let mut tables = Self::new();
        for e in eligibility.segments {
            for channel in &e.channels {
                tables.add_eligible_channel(&e.segment, channel);
            }
        }
        for m in min_clients.entries {
            tables.set_min_clients(&m.channel, &m.segment, m.min_clients);
        }
        for c in cost_prices.entries {
            tables.set_cost_price(&c.channel, &c.segment, c.product_type, c.amount);
        }
        for d in defaults.segments {
            tables.set_segment_defaults(&d.segment, d.defaults);
        }
        Ok(tables)
    }

    /// Small hardcoded tables for tests: two segments, two channels.
    pub fn default_test() -> Self {
        let mut t = Self::new();
        for segment in ["ММБ", "КСБ"] {
            t.add_eligible_channel(segment, "Офис");
            t.add_eligible_channel(segment, "Дистанционный");
        }
        t.set_min_clients("Офис", "ММБ", 100.0);
        t.set_min_clients("Дистанционный", "ММБ", 50.0);
        t.set_min_clients("Офис", "КСБ", 20.0);
        t.set_min_clients("Дистанционный", "КСБ", 10.0);
        for (channel, segment, boxed, custom) in [
            ("Офис", "ММБ", 12_000.0, 25_000.0),
            ("Дистанционный", "ММБ", 4_000.0, 9_000.0),
            ("Офис", "КСБ", 30_000.0, 60_000.0),
            ("Дистанционный", "КСБ", 15_000.0, 35_000.0),
        ] {
            t.set_cost_price(channel, segment, ProductType::Boxed, boxed);
            t.set_cost_price(channel, segment, ProductType::Custom, custom);
        }
        t.set_segment_defaults("ММБ", SegmentDefaults { ownership_share: 6.0, profit_coefficient: 15.0 });
        t.set_segment_defaults("КСБ", SegmentDefaults { ownership_share: 10.0, profit_coefficient: 20.0 });
        t
    }

    /// Append a channel to a segment's eligible list, keeping first-seen order.
    pub fn add_eligible_channel(&mut self, segment: &str, channel: &str) {
        let channels = self.eligibility.entry(segment.to_string()).or_default();
        if !channels.iter().any(|c| c == channel) {
            channels.push(channel.to_string());
        }
    }

    pub fn set_min_clients(&mut self, channel: &str, segment: &str, min_clients: f64) {
        self.min_clients
            .insert(ChannelSegmentKey::new(channel, segment), min_clients);
    }

    pub fn set_cost_price(&mut self, channel: &str, segment: &str, product_type: ProductType, amount: f64) {
        self.cost_prices
            .insert(CostKey::new(channel, segment, product_type), amount);
    }

    pub fn set_segment_defaults(&mut self, segment: &str, defaults: SegmentDefaults) {
        self.segment_defaults.insert(segment.to_string(), defaults);
    }

    /// Channels eligible for a segment in table order; empty when none.
    pub fn eligible_channels(&self, segment: &str) -> &[ChannelName] {
        self.eligibility
            .get(segment)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn min_clients(&self, channel: &str, segment: &str) -> Option<f64> {
        self.min_clients
            .get(&ChannelSegmentKey::new(channel, segment))
            .copied()
    }

    pub fn cost_price(&self, channel: &str, segment: &str, product_type: ProductType) -> Option<f64> {
        self.cost_prices
            .get(&CostKey::new(channel, segment, product_type))
            .copied()
    }

    pub fn segment_defaults(&self, segment: &str) -> Option<SegmentDefaults> {
        self.segment_defaults.get(segment).copied()
    }
}
