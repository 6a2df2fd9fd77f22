//! Segment aggregator — reduces filtered records into market metrics.
//!
//! Two phases:
//!   1. Accumulate: every record adds into its segment's raw sums.
//!      Accumulators merge, so partial passes over disjoint slices of
//!      the input combine into the same result as one pass.
//!   2. Finalize: raw sums become derived averages under one policy.
//!
//! The denominator of the averages is
//! `market amount sum + non-market row count`: a money total plus a row
//! count. This is the agreed domain convention and is kept as is.

use crate::{
    config::{EngineConfig, MarketSumPolicy},
    event::{EventSink, PipelineEvent},
    record::InputRecord,
    types::{round_to, Relationship, SegmentLabel},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw per-segment sums. Only ever grows by `add` or `merge`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentAccumulator {
    pub market_amount_sum: f64,
    pub client_amount_sum: f64,
    pub non_client_amount_sum: f64,
    pub market_secondary_sum: f64,
    pub market_staff_sum: f64,
    /// Rows whose relationship is anything but Market, nulls included.
    pub non_market_rows: u64,
}

impl SegmentAccumulator {
    pub fn add(&mut self, record: &InputRecord) {
        let amount = record.amount.unwrap_or(0.0);
        match &record.relationship {
            Some(Relationship::Market) => {
                self.market_amount_sum += amount;
                self.market_secondary_sum += record.secondary_amount.unwrap_or(0.0);
                self.market_staff_sum += record.staff_count.unwrap_or(0) as f64;
            }
            Some(Relationship::Client) => self.client_amount_sum += amount,
            Some(Relationship::NonClient) => self.non_client_amount_sum += amount,
            Some(Relationship::Other(_)) | None => {}
        }
        if !record.relationship.as_ref().is_some_and(Relationship::is_market) {
            self.non_market_rows += 1;
        }
    }

    pub fn merge(&mut self, other: &SegmentAccumulator) {
        self.market_amount_sum += other.market_amount_sum;
        self.client_amount_sum += other.client_amount_sum;
        self.non_client_amount_sum += other.non_client_amount_sum;
        self.market_secondary_sum += other.market_secondary_sum;
        self.market_staff_sum += other.market_staff_sum;
        self.non_market_rows += other.non_market_rows;
    }

    fn denominator(&self) -> f64 {
        self.market_amount_sum + self.non_market_rows as f64
    }

    /// Derive the segment metrics from the raw sums.
    pub fn finalize(&self, config: &EngineConfig) -> SegmentMetrics {
        let denominator = self.denominator();
        let (average_revenue, average_staff) = if denominator > 0.0 {
            (
                round_to(self.market_secondary_sum / denominator / 1_000_000.0, 3),
                (self.market_staff_sum / denominator).round() as i64,
            )
        } else {
            (0.0, 0)
        };

        let average_check = if self.market_amount_sum > 0.0 {
            self.market_secondary_sum / self.market_amount_sum
        } else {
            config.fallback_average_check
        };

        let market_sum = match config.formula.market_sum {
            MarketSumPolicy::MarketBucket => self.market_amount_sum,
            MarketSumPolicy::ClientsPlusNonClients => {
                self.client_amount_sum + self.non_client_amount_sum
            }
        };

        SegmentMetrics {
            raw: *self,
            market_sum,
            client_sum: self.client_amount_sum,
            non_client_sum: self.non_client_amount_sum,
            average_revenue,
            average_staff,
            average_check,
        }
    }
}

/// Finalized metrics of one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMetrics {
    pub raw: SegmentAccumulator,
    /// Declared market size used downstream.
    pub market_sum: f64,
    pub client_sum: f64,
    pub non_client_sum: f64,
    /// Millions, 3 decimals.
    pub average_revenue: f64,
    pub average_staff: i64,
    pub average_check: f64,
}

/// Accumulators for every segment seen so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentAccumulators {
    segments: BTreeMap<SegmentLabel, SegmentAccumulator>,
}

impl SegmentAccumulators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'r, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'r InputRecord>,
    {
        let mut acc = Self::new();
        for record in records {
            acc.add(record);
        }
        acc
    }

    pub fn add(&mut self, record: &InputRecord) {
        self.segments
            .entry(record.segment_label().to_string())
            .or_default()
            .add(record);
    }

    /// Fold another partial result into this one.
    pub fn merge(&mut self, other: &SegmentAccumulators) {
        for (segment, acc) in &other.segments {
            self.segments.entry(segment.clone()).or_default().merge(acc);
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn finalize(
        &self,
        config: &EngineConfig,
        sink: &mut dyn EventSink,
    ) -> BTreeMap<SegmentLabel, SegmentMetrics> {
        self.segments
            .iter()
            .map(|(segment, acc)| {
                let metrics = acc.finalize(config);
                sink.emit(PipelineEvent::SegmentAggregated {
                    segment: segment.clone(),
                    market_sum: metrics.market_sum,
                    client_sum: metrics.client_sum,
                    non_client_sum: metrics.non_client_sum,
                    average_check: metrics.average_check,
                });
                (segment.clone(), metrics)
            })
            .collect()
    }
}

/// Single-pass aggregation of filtered records.
pub fn aggregate_segments<'r, I>(
    records: I,
    config: &EngineConfig,
    sink: &mut dyn EventSink,
) -> BTreeMap<SegmentLabel, SegmentMetrics>
where
    I: IntoIterator<Item = &'r InputRecord>,
{
    SegmentAccumulators::from_records(records).finalize(config, sink)
}
