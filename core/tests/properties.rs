//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Filter identity: empty criteria return the input unchanged
//! 2. Broad codes: "<class>.0" and "<class>.1" include every code of the class
//! 3. Aggregation merge: disjoint partial passes combine into one pass
//! 4. Fallback check: applies exactly when the Market amount sum is zero
//! 5. Thresholds: too few clients always gives an all-zero "no" row

use potential_core::{
    aggregate::{aggregate_segments, SegmentAccumulators},
    config::{EngineConfig, FALLBACK_AVERAGE_CHECK},
    evaluator::{CalculationParams, ChannelEvaluator, Decision, Explanation, SegmentParams},
    event::NullSink,
    filter::{filter_records, FilterCriteria},
    record::InputRecord,
    reference::ReferenceTables,
    types::{ProductType, Relationship},
};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_relationship() -> impl Strategy<Value = Option<Relationship>> {
    prop_oneof![
        Just(Some(Relationship::Market)),
        Just(Some(Relationship::Client)),
        Just(Some(Relationship::NonClient)),
        Just(Some(Relationship::Other("Партнёр".to_string()))),
        Just(None),
    ]
}

fn arb_segment() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(Some("ММБ".to_string())),
        Just(Some("КСБ".to_string())),
        Just(Some("A".to_string())),
        Just(None),
    ]
}

fn arb_industry() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[0-9]{2}(\\.[0-9]{1,2})?")
}

/// Integer-valued amounts keep every float sum exact.
fn arb_record() -> impl Strategy<Value = InputRecord> {
    (
        arb_segment(),
        arb_relationship(),
        0u32..1000,
        0u32..1000,
        arb_industry(),
        prop::option::of(prop_oneof![Just("Московский".to_string()), Just("Сибирский".to_string())]),
    )
        .prop_map(|(segment, relationship, amount, secondary, industry_code, region)| InputRecord {
            segment,
            relationship,
            amount: Some(amount as f64),
            secondary_amount: Some(secondary as f64),
            industry_code,
            region,
            ..Default::default()
        })
}

fn arb_records() -> impl Strategy<Value = Vec<InputRecord>> {
    prop::collection::vec(arb_record(), 0..40)
}

// ── 1. Filter identity ───────────────────────────────────────────────

proptest! {
    /// All-empty criteria keep every record, in the original order.
    #[test]
    fn empty_criteria_is_identity(records in arb_records()) {
        let kept = filter_records(&records, &FilterCriteria::accept_all(ProductType::Boxed), &mut NullSink);
        prop_assert_eq!(kept.len(), records.len());
        for (k, r) in kept.iter().zip(records.iter()) {
            prop_assert!(std::ptr::eq(*k, r));
        }
    }
}

// ── 2. Broad industry codes ──────────────────────────────────────────

proptest! {
    #[test]
    fn broad_code_includes_whole_class(
        class in "[0-9]{2}",
        subclass in "[0-9]{1,2}(\\.[0-9])?",
        broad_suffix in prop_oneof![Just("0"), Just("1")],
    ) {
        let records = vec![InputRecord {
            industry_code: Some(format!("{class}.{subclass}")),
            ..Default::default()
        }];
        let criteria = FilterCriteria::default().with_industries([format!("{class}.{broad_suffix}")]);
        prop_assert_eq!(filter_records(&records, &criteria, &mut NullSink).len(), 1);
    }
}

// ── 3. Aggregation merge ─────────────────────────────────────────────

proptest! {
    #[test]
    fn partial_aggregations_merge_to_single_pass(
        records in arb_records(),
        split in 0usize..40,
    ) {
        let split = split.min(records.len());
        let (left, right) = records.split_at(split);
        let mut merged = SegmentAccumulators::from_records(left);
        merged.merge(&SegmentAccumulators::from_records(right));
        prop_assert_eq!(merged, SegmentAccumulators::from_records(&records));
    }
}

// ── 4. Average check fallback ────────────────────────────────────────

proptest! {
    /// Secondary sums stay far below the fallback, so equality can only
    /// come from the fallback itself.
    #[test]
    fn fallback_check_iff_no_market_amount(records in arb_records()) {
        let metrics = aggregate_segments(&records, &EngineConfig::default_test(), &mut NullSink);
        for m in metrics.values() {
            let fallback = m.average_check == FALLBACK_AVERAGE_CHECK;
            prop_assert_eq!(fallback, m.raw.market_amount_sum == 0.0);
        }
    }
}

// ── 5. Client thresholds ─────────────────────────────────────────────

proptest! {
    #[test]
    fn too_few_clients_is_always_all_zero(
        records in arb_records(),
        margin in 1.0..1_000_000.0_f64,
        average_amount in prop::option::of(0.0..10_000_000.0_f64),
    ) {
        let config = EngineConfig::default_test();
        let metrics = aggregate_segments(&records, &config, &mut NullSink);

        let mut tables = ReferenceTables::new();
        let mut params = CalculationParams::default();
        for (segment, m) in &metrics {
            let clients = m.market_sum + m.client_sum + m.non_client_sum;
            tables.add_eligible_channel(segment, "Офис");
            tables.set_min_clients("Офис", segment, clients + margin);
            tables.set_cost_price("Офис", segment, ProductType::Boxed, 1_000.0);
            params = params.with_segment(segment, SegmentParams { average_amount, ..Default::default() });
        }

        let rows = ChannelEvaluator::new(&config, &tables, &params, ProductType::Boxed)
            .evaluate(&metrics, &mut NullSink);
        prop_assert_eq!(rows.len(), metrics.len());
        for row in &rows {
            prop_assert_eq!(row.decision, Decision::No);
            prop_assert_eq!(row.explanation, Explanation::TooFewClients);
            prop_assert_eq!(row.potential_amount, 0.0);
            prop_assert_eq!(row.rate, 0.0);
            prop_assert_eq!(row.ab_amount, 0.0);
            prop_assert_eq!(row.chkd_amount, 0.0);
            prop_assert_eq!(row.revenue, 0.0);
            prop_assert_eq!(row.total_potential, 0.0);
        }
    }
}
