//! Pipeline events and the sinks that receive them.
//!
//! RULE: Components never log through a global of their own.
//! Every stage takes a `&mut dyn EventSink` and reports what it did
//! through it. The caller decides where events go: the `log` facade
//! (`LogSink`), an in-memory list (`Vec<PipelineEvent>`), or nowhere.

use crate::{error::RowParseError, evaluator::Decision};
use serde::{Deserialize, Serialize};

/// Everything worth reporting during a run.
/// Variants are added over time, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    // ── Loader ─────────────────────────────────────
    NoSourcesFound {
        location: String,
    },
    SourceLoaded {
        source: String,
        loaded: usize,
        dropped: usize,
    },
    RowDropped {
        source: String,
        row_index: usize,
        reason: String,
    },

    // ── Filter ─────────────────────────────────────
    RecordsFiltered {
        total: usize,
        kept: usize,
    },

    // ── Aggregator ─────────────────────────────────
    SegmentAggregated {
        segment: String,
        market_sum: f64,
        client_sum: f64,
        non_client_sum: f64,
        average_check: f64,
    },

    // ── Evaluator ──────────────────────────────────
    SegmentWithoutChannels {
        segment: String,
    },
    DefaultParameterUsed {
        segment: String,
        parameter: String,
        value: f64,
    },
    ChannelEvaluated {
        segment: String,
        channel: String,
        decision: Decision,
        total_potential: f64,
    },
}

impl PipelineEvent {
    pub fn row_dropped(source: &str, row_index: usize, error: &RowParseError) -> Self {
        PipelineEvent::RowDropped {
            source: source.to_string(),
            row_index,
            reason: error.to_string(),
        }
    }
}

/// Receiver for pipeline events.
pub trait EventSink {
    fn emit(&mut self, event: PipelineEvent);
}

/// Collects events in memory. Used by tests and by callers that
/// want to attach the event trail to a report.
impl EventSink for Vec<PipelineEvent> {
    fn emit(&mut self, event: PipelineEvent) {
        self.push(event);
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: PipelineEvent) {}
}

/// Forwards events to the `log` facade. Configuring the logger
/// (env_logger or otherwise) is the binary's job, never the engine's.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: PipelineEvent) {
        match &event {
            PipelineEvent::NoSourcesFound { location } => {
                log::error!("no record sources found in {location}");
            }
            PipelineEvent::SourceLoaded { source, loaded, dropped } => {
                log::info!("loader: {source}: {loaded} records, {dropped} dropped");
            }
            PipelineEvent::RowDropped { source, row_index, reason } => {
                log::warn!("loader: {source} row {row_index} dropped: {reason}");
            }
            PipelineEvent::RecordsFiltered { total, kept } => {
                log::info!("filter: kept {kept} of {total} records");
            }
            PipelineEvent::SegmentAggregated {
                segment,
                market_sum,
                client_sum,
                non_client_sum,
                average_check,
            } => {
                log::info!(
                    "segment {segment}: market={market_sum:.0} clients={client_sum:.0} \
                     non_clients={non_client_sum:.0} avg_check={average_check:.2}"
                );
            }
            PipelineEvent::SegmentWithoutChannels { segment } => {
                log::info!("segment {segment}: no eligible channels");
            }
            PipelineEvent::DefaultParameterUsed { segment, parameter, value } => {
                log::warn!("segment {segment}: {parameter} not supplied, using default {value}");
            }
            PipelineEvent::ChannelEvaluated {
                segment,
                channel,
                decision,
                total_potential,
            } => {
                log::debug!("{segment} / {channel}: {decision:?} total_potential={total_potential}");
            }
        }
    }
}
