//! Typed input records and the single fallible row parser.
//!
//! A raw row is a positional list of strings as delivered by a tabular
//! collaborator. `parse_row` is the only place where text turns into
//! numbers; everything downstream works on `InputRecord`.

use crate::{
    error::RowParseError,
    types::{Relationship, SegmentLabel, UNKNOWN_SEGMENT},
};
use serde::{Deserialize, Serialize};

/// Minimum number of positional fields a row exposes.
/// Shorter rows are padded with empty strings.
pub const RAW_ROW_WIDTH: usize = 21;

// Positional layout of a raw row.
const COL_ID_LVL_1: usize = 0;
const COL_ID_LVL_2: usize = 1;
const COL_PARAMETER_ID: usize = 2;
const COL_AMOUNT: usize = 3;
const COL_SECONDARY_AMOUNT: usize = 4;
const COL_SEGMENT: usize = 5;
const COL_RELATIONSHIP: usize = 7;
const COL_INDUSTRY_CODE: usize = 8;
const COL_REVENUE_BRACKET: usize = 11;
const COL_STAFF_BRACKET: usize = 12;
const COL_STAFF_COUNT: usize = 14;
const COL_REGION: usize = 19;

/// One raw tabular row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow {
    fields: Vec<String>,
}

impl RawRow {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Field at `index`, or "" when the row is shorter.
    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or("")
    }
}

impl<S: Into<String>> FromIterator<S> for RawRow {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// A typed business record. Every field is nullable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputRecord {
    pub id_lvl_1: Option<i64>,
    pub id_lvl_2: Option<i64>,
    pub parameter_id: Option<String>,
    /// Primary amount (company count for market rows).
    pub amount: Option<f64>,
    /// Secondary amount (revenue).
    pub secondary_amount: Option<f64>,
    pub segment: Option<SegmentLabel>,
    pub relationship: Option<Relationship>,
    /// Dotted hierarchical classification code, e.g. "47.81".
    pub industry_code: Option<String>,
    pub revenue_bracket: Option<String>,
    pub staff_bracket: Option<String>,
    pub staff_count: Option<i64>,
    pub region: Option<String>,
}

impl InputRecord {
    /// Segment label used for grouping.
    pub fn segment_label(&self) -> &str {
        self.segment.as_deref().unwrap_or(UNKNOWN_SEGMENT)
    }

    /// Industry class: the code up to the first dot.
    pub fn industry_class(&self) -> Option<&str> {
        self.industry_code
            .as_deref()
            .map(|code| code.split('.').next().unwrap_or(code))
    }
}

/// Convert one raw row into a typed record.
pub fn parse_row(row: &RawRow) -> Result<InputRecord, RowParseError> {
    Ok(InputRecord {
        id_lvl_1: parse_int("id_lvl_1", row.field(COL_ID_LVL_1))?,
        id_lvl_2: parse_int("id_lvl_2", row.field(COL_ID_LVL_2))?,
        parameter_id: parse_text(row.field(COL_PARAMETER_ID)),
        amount: parse_amount("amount", row.field(COL_AMOUNT))?,
        secondary_amount: parse_amount("secondary_amount", row.field(COL_SECONDARY_AMOUNT))?,
        segment: parse_text(row.field(COL_SEGMENT)),
        relationship: parse_text(row.field(COL_RELATIONSHIP))
            .map(|label| Relationship::from_label(&label)),
        industry_code: parse_text(row.field(COL_INDUSTRY_CODE)),
        revenue_bracket: parse_text(row.field(COL_REVENUE_BRACKET)),
        staff_bracket: parse_text(row.field(COL_STAFF_BRACKET)),
        staff_count: parse_int("staff_count", row.field(COL_STAFF_COUNT))?,
        region: parse_text(row.field(COL_REGION)),
    })
}

fn is_null_token(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("null") || value.eq_ignore_ascii_case("none")
}

fn parse_text(raw: &str) -> Option<String> {
    let value = raw.trim();
    if is_null_token(value) {
        None
    } else {
        Some(value.to_string())
    }
}

/// Locale-tolerant float: "1 234,5" is not supported, "1234,5" is.
fn parse_decimal(raw: &str) -> Option<f64> {
    let value = raw.trim().replace(',', ".");
    if is_null_token(&value) {
        return None;
    }
    value.parse::<f64>().ok()
}

/// NaN reads as null; only an infinity fails the row.
fn parse_amount(field: &'static str, raw: &str) -> Result<Option<f64>, RowParseError> {
    match parse_decimal(raw) {
        Some(v) if v.is_nan() => Ok(None),
        Some(v) if v.is_infinite() => Err(RowParseError::NonFinite {
            field,
            value: raw.trim().to_string(),
        }),
        other => Ok(other),
    }
}

/// Integers accept decimal text ("12,0", "7.9") and truncate toward zero.
/// NaN is unparsable and becomes null; infinities and values beyond i64
/// cannot be represented and fail the row.
fn parse_int(field: &'static str, raw: &str) -> Result<Option<i64>, RowParseError> {
    let Some(v) = parse_decimal(raw) else {
        return Ok(None);
    };
    if v.is_nan() {
        return Ok(None);
    }
    let truncated = v.trunc();
    if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(RowParseError::IntegerOutOfRange {
            field,
            value: raw.trim().to_string(),
        });
    }
    Ok(Some(truncated as i64))
}
