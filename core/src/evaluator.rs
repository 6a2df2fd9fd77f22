//! Channel evaluator — the per-channel go/no-go decision chain.
//!
//! For every segment with metrics and every channel eligible for it,
//! the chain below runs in order. The first failing step yields a "no"
//! row whose monetary fields are all exactly zero.
//!
//!   0. threshold present        → else MissingThreshold
//!   1. clients ≥ threshold      → else TooFewClients
//!   2. average amount > 0       → else ZeroAverageAmount
//!   3. cost price present       → else MissingCostReference
//!   4. potential amount
//!   5. rate, 1 decimal          → 0.0 is RateRoundsToZero
//!   6. ab amount
//!   7. chkd / revenue / total   when ownership share and profit
//!                               coefficient are known
//!   8. otherwise "yes" with ab amount only

use crate::{
    aggregate::SegmentMetrics,
    config::{AbAmountFormula, ClientCountPolicy, EngineConfig},
    event::{EventSink, PipelineEvent},
    reference::{ReferenceTables, SegmentDefaults},
    types::{round_to, ChannelName, ProductType, SegmentLabel},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Yes,
    No,
}

/// Why a row got its decision. Rendering is the presentation layer's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Explanation {
    PassedAllChecks,
    NoOwnershipParameters,
    MissingThreshold,
    TooFewClients,
    ZeroAverageAmount,
    MissingCostReference,
    RateRoundsToZero,
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Explanation::PassedAllChecks => "passed all checks",
            Explanation::NoOwnershipParameters => "no ownership share or profit coefficient",
            Explanation::MissingThreshold => "missing minimum-client threshold",
            Explanation::TooFewClients => "too few clients",
            Explanation::ZeroAverageAmount => "zero average amount",
            Explanation::MissingCostReference => "missing cost reference",
            Explanation::RateRoundsToZero => "rate rounds to zero",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRow {
    pub segment: SegmentLabel,
    pub channel: ChannelName,
    pub client_count: f64,
    /// Millions.
    pub potential_amount: f64,
    /// Percent, 1 decimal.
    pub rate: f64,
    pub ab_amount: f64,
    pub chkd_amount: f64,
    pub revenue: f64,
    pub total_potential: f64,
    pub decision: Decision,
    pub explanation: Explanation,
}

impl DecisionRow {
    fn rejected(segment: &str, channel: &str, client_count: f64, explanation: Explanation) -> Self {
        Self {
            segment: segment.to_string(),
            channel: channel.to_string(),
            client_count: round_to(client_count, 3),
            potential_amount: 0.0,
            rate: 0.0,
            ab_amount: 0.0,
            chkd_amount: 0.0,
            revenue: 0.0,
            total_potential: 0.0,
            decision: Decision::No,
            explanation,
        }
    }

    pub fn is_yes(&self) -> bool {
        self.decision == Decision::Yes
    }
}

/// Externally supplied overrides for one segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentParams {
    #[serde(default)]
    pub average_amount: Option<f64>,
    /// Percent.
    #[serde(default)]
    pub ownership_share: Option<f64>,
    /// Percent.
    #[serde(default)]
    pub profit_coefficient: Option<f64>,
}

/// Caller-supplied calculation parameters. All optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationParams {
    #[serde(default)]
    pub segments: HashMap<SegmentLabel, SegmentParams>,
    /// Average amount for segments without their own.
    #[serde(default)]
    pub default_average_amount: Option<f64>,
    /// Percent; only read by `AbAmountFormula::ExternalCoefficientPlusRate`.
    #[serde(default)]
    pub external_coefficient: Option<f64>,
}

impl CalculationParams {
    pub fn with_segment(mut self, segment: &str, params: SegmentParams) -> Self {
        self.segments.insert(segment.to_string(), params);
        self
    }

    pub fn with_default_average_amount(mut self, amount: f64) -> Self {
        self.default_average_amount = Some(amount);
        self
    }

    pub fn with_external_coefficient(mut self, coefficient: f64) -> Self {
        self.external_coefficient = Some(coefficient);
        self
    }

    fn segment(&self, segment: &str) -> SegmentParams {
        self.segments.get(segment).copied().unwrap_or_default()
    }
}

/// Per-segment inputs resolved once before the channel loop.
struct SegmentInputs {
    client_count: f64,
    average_amount: f64,
    ownership: Option<SegmentDefaults>,
}

pub struct ChannelEvaluator<'a> {
    config: &'a EngineConfig,
    tables: &'a ReferenceTables,
    params: &'a CalculationParams,
    product_type: ProductType,
}

impl<'a> ChannelEvaluator<'a> {
    pub fn new(
        config: &'a EngineConfig,
        tables: &'a ReferenceTables,
        params: &'a CalculationParams,
        product_type: ProductType,
    ) -> Self {
        Self {
            config,
            tables,
            params,
            product_type,
        }
    }

    /// Decision rows for all segments, segment order then table channel order.
    pub fn evaluate(
        &self,
        metrics: &BTreeMap<SegmentLabel, SegmentMetrics>,
        sink: &mut dyn EventSink,
    ) -> Vec<DecisionRow> {
        let mut rows = Vec::new();
        for (segment, m) in metrics {
            rows.extend(self.evaluate_segment(segment, m, sink));
        }
        rows
    }

    pub fn evaluate_segment(
        &self,
        segment: &str,
        metrics: &SegmentMetrics,
        sink: &mut dyn EventSink,
    ) -> Vec<DecisionRow> {
        let channels = self.tables.eligible_channels(segment);
        if channels.is_empty() {
            sink.emit(PipelineEvent::SegmentWithoutChannels {
                segment: segment.to_string(),
            });
            return Vec::new();
        }

        let inputs = self.resolve_inputs(segment, metrics, sink);
        channels
            .iter()
            .map(|channel| {
                let row = self.evaluate_channel(segment, channel, &inputs);
                sink.emit(PipelineEvent::ChannelEvaluated {
                    segment: segment.to_string(),
                    channel: channel.clone(),
                    decision: row.decision,
                    total_potential: row.total_potential,
                });
                row
            })
            .collect()
    }

    fn resolve_inputs(
        &self,
        segment: &str,
        metrics: &SegmentMetrics,
        sink: &mut dyn EventSink,
    ) -> SegmentInputs {
        let client_count = match self.config.formula.client_count {
            ClientCountPolicy::MarketOnly => metrics.market_sum,
            ClientCountPolicy::AllBuckets => {
                metrics.market_sum + metrics.client_sum + metrics.non_client_sum
            }
        };

        let explicit = self.params.segment(segment);
        let average_amount = explicit
            .average_amount
            .or(self.params.default_average_amount)
            .unwrap_or(metrics.average_check);

        let defaults = self.tables.segment_defaults(segment);
        let ownership_share = explicit.ownership_share.or_else(|| {
            let d = defaults?;
            sink.emit(PipelineEvent::DefaultParameterUsed {
                segment: segment.to_string(),
                parameter: "ownership_share".into(),
                value: d.ownership_share,
            });
            Some(d.ownership_share)
        });
        let profit_coefficient = explicit.profit_coefficient.or_else(|| {
            let d = defaults?;
            sink.emit(PipelineEvent::DefaultParameterUsed {
                segment: segment.to_string(),
                parameter: "profit_coefficient".into(),
                value: d.profit_coefficient,
            });
            Some(d.profit_coefficient)
        });

        let ownership = match (ownership_share, profit_coefficient) {
            (Some(ownership_share), Some(profit_coefficient)) => Some(SegmentDefaults {
                ownership_share,
                profit_coefficient,
            }),
            _ => None,
        };

        SegmentInputs {
            client_count,
            average_amount,
            ownership,
        }
    }

    fn evaluate_channel(&self, segment: &str, channel: &str, inputs: &SegmentInputs) -> DecisionRow {
        let clients = inputs.client_count;
        let reject = |explanation| DecisionRow::rejected(segment, channel, clients, explanation);

        let Some(min_clients) = self.tables.min_clients(channel, segment) else {
            return reject(Explanation::MissingThreshold);
        };
        if clients < min_clients {
            return reject(Explanation::TooFewClients);
        }

        let average_amount = inputs.average_amount;
        if average_amount.is_nan() || average_amount <= 0.0 {
            return reject(Explanation::ZeroAverageAmount);
        }

        let Some(cost_price) = self.tables.cost_price(channel, segment, self.product_type) else {
            return reject(Explanation::MissingCostReference);
        };

        let potential_amount = round_to(
            clients * average_amount / 1_000_000.0 * self.config.utilization_rate,
            self.config.formula.potential_precision.decimals(),
        );

        let rate = round_to(cost_price / average_amount * 100.0, 1);
        if rate == 0.0 {
            return reject(Explanation::RateRoundsToZero);
        }

        let ab_amount = match self.config.formula.ab_amount {
            AbAmountFormula::RateOnly => potential_amount * rate / 100.0,
            AbAmountFormula::ExternalCoefficientPlusRate => {
                let coefficient = self.params.external_coefficient.unwrap_or(0.0);
                potential_amount * (coefficient / 100.0 + rate / 100.0)
            }
        };

        let (chkd_amount, revenue, total_potential, explanation) = match inputs.ownership {
            Some(o) => {
                let chkd = ab_amount * o.ownership_share / 100.0;
                let revenue = chkd * o.profit_coefficient / 100.0;
                (chkd, revenue, ab_amount + chkd + revenue, Explanation::PassedAllChecks)
            }
            None => (0.0, 0.0, 0.0, Explanation::NoOwnershipParameters),
        };

        DecisionRow {
            segment: segment.to_string(),
            channel: channel.to_string(),
            client_count: round_to(clients, 3),
            potential_amount,
            rate,
            ab_amount: round_to(ab_amount, 3),
            chkd_amount: round_to(chkd_amount, 3),
            revenue: round_to(revenue, 3),
            total_potential: round_to(total_potential, 3),
            decision: Decision::Yes,
            explanation,
        }
    }
}
