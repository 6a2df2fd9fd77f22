//! Criteria filter — selects records matching business criteria.
//!
//! Dimensions combine with AND; values inside a dimension combine with OR.
//! An empty dimension accepts everything, including null values.
//! A restricted dimension rejects records whose value is null.

use crate::{
    event::{EventSink, PipelineEvent},
    record::InputRecord,
    types::ProductType,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub industries: BTreeSet<String>,
    #[serde(default)]
    pub revenue_brackets: BTreeSet<String>,
    #[serde(default)]
    pub staff_brackets: BTreeSet<String>,
    #[serde(default)]
    pub regions: BTreeSet<String>,
    #[serde(default)]
    pub product_type: ProductType,
}

impl FilterCriteria {
    /// Criteria that accept every record.
    pub fn accept_all(product_type: ProductType) -> Self {
        Self {
            product_type,
            ..Default::default()
        }
    }

    pub fn with_industries<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.industries = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_revenue_brackets<I, S>(mut self, brackets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.revenue_brackets = brackets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_staff_brackets<I, S>(mut self, brackets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.staff_brackets = brackets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }
}

/// How one supplied industry code matches records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndustryPattern {
    /// `<class>.0` or `<class>.1`: the whole class, any subclass.
    Broad(String),
    /// Identical full code only.
    Exact(String),
}

impl IndustryPattern {
    pub fn compile(code: &str) -> Self {
        let code = code.trim();
        match code.split_once('.') {
            Some((class, sub)) if !class.is_empty() && (sub == "0" || sub == "1") => {
                IndustryPattern::Broad(class.to_string())
            }
            _ => IndustryPattern::Exact(code.to_string()),
        }
    }

    pub fn matches(&self, record: &InputRecord) -> bool {
        match self {
            IndustryPattern::Broad(class) => record.industry_class() == Some(class.as_str()),
            IndustryPattern::Exact(code) => record.industry_code.as_deref() == Some(code.as_str()),
        }
    }
}

/// Criteria compiled once per run.
struct CompiledCriteria<'a> {
    industries: Vec<IndustryPattern>,
    criteria: &'a FilterCriteria,
}

impl<'a> CompiledCriteria<'a> {
    fn new(criteria: &'a FilterCriteria) -> Self {
        Self {
            industries: criteria
                .industries
                .iter()
                .map(|c| IndustryPattern::compile(c))
                .collect(),
            criteria,
        }
    }

    fn accepts(&self, record: &InputRecord) -> bool {
        (self.industries.is_empty() || self.industries.iter().any(|p| p.matches(record)))
            && allowed(&self.criteria.revenue_brackets, record.revenue_bracket.as_deref())
            && allowed(&self.criteria.staff_brackets, record.staff_bracket.as_deref())
            && allowed(&self.criteria.regions, record.region.as_deref())
    }
}

fn allowed(accepted: &BTreeSet<String>, value: Option<&str>) -> bool {
    if accepted.is_empty() {
        return true;
    }
    value.is_some_and(|v| accepted.contains(v))
}

/// Select the records that satisfy every restricted dimension.
/// Original order is preserved; records are borrowed, never modified.
pub fn filter_records<'r>(
    records: &'r [InputRecord],
    criteria: &FilterCriteria,
    sink: &mut dyn EventSink,
) -> Vec<&'r InputRecord> {
    let compiled = CompiledCriteria::new(criteria);
    let kept: Vec<&InputRecord> = records.iter().filter(|r| compiled.accepts(r)).collect();
    sink.emit(PipelineEvent::RecordsFiltered {
        total: records.len(),
        kept: kept.len(),
    });
    kept
}
