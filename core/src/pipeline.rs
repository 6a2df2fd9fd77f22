//! Pipeline orchestrator.
//!
//! EXECUTION ORDER (fixed, never reordered):
//!   1. Loader      raw rows → typed records
//!   2. Filter      criteria → borrowed subset
//!   3. Aggregator  subset   → per-segment metrics
//!   4. Evaluator   metrics  → per-channel decision rows
//!
//! Each run is independent: the pipeline only holds read-only
//! references to config and reference tables.

use crate::{
    aggregate::{aggregate_segments, SegmentMetrics},
    config::EngineConfig,
    error::PotentialResult,
    evaluator::{CalculationParams, ChannelEvaluator, DecisionRow},
    event::EventSink,
    filter::{filter_records, FilterCriteria},
    loader::{load_sources, RowSource},
    record::InputRecord,
    reference::ReferenceTables,
    types::{round_to, SegmentLabel},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub segment_metrics: BTreeMap<SegmentLabel, SegmentMetrics>,
    pub decision_rows: Vec<DecisionRow>,
    pub filtered_count: usize,
}

impl PipelineReport {
    /// Per segment with decision rows: the sum of `ab_amount` over
    /// "yes" rows. A segment whose channels all said "no" maps to 0.
    pub fn segment_ab_totals(&self) -> BTreeMap<SegmentLabel, f64> {
        let mut totals: BTreeMap<SegmentLabel, f64> = BTreeMap::new();
        for row in &self.decision_rows {
            let total = totals.entry(row.segment.clone()).or_insert(0.0);
            if row.is_yes() {
                *total += row.ab_amount;
            }
        }
        totals.values_mut().for_each(|v| *v = round_to(*v, 3));
        totals
    }

    pub fn rows_for_segment<'a>(&'a self, segment: &'a str) -> impl Iterator<Item = &'a DecisionRow> {
        self.decision_rows.iter().filter(move |r| r.segment == segment)
    }
}

pub struct Pipeline<'a> {
    config: &'a EngineConfig,
    tables: &'a ReferenceTables,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a EngineConfig, tables: &'a ReferenceTables) -> Self {
        Self { config, tables }
    }

    /// Steps 1–4. Fails only when a source cannot be read.
    pub fn run(
        &self,
        sources: &mut [Box<dyn RowSource + '_>],
        criteria: &FilterCriteria,
        params: &CalculationParams,
        sink: &mut dyn EventSink,
    ) -> PotentialResult<PipelineReport> {
        let records = load_sources(sources, sink)?;
        Ok(self.run_records(&records, criteria, params, sink))
    }

    /// Steps 2–4 over records that are already loaded.
    pub fn run_records(
        &self,
        records: &[InputRecord],
        criteria: &FilterCriteria,
        params: &CalculationParams,
        sink: &mut dyn EventSink,
    ) -> PipelineReport {
        let filtered = filter_records(records, criteria, sink);
        let segment_metrics = aggregate_segments(filtered.iter().copied(), self.config, sink);
        let evaluator = ChannelEvaluator::new(self.config, self.tables, params, criteria.product_type);
        let decision_rows = evaluator.evaluate(&segment_metrics, sink);

        PipelineReport {
            segment_metrics,
            decision_rows,
            filtered_count: filtered.len(),
        }
    }
}
