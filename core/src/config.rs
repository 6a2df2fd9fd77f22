use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;

/// Fraction of the addressable market assumed realisable.
pub const UTILIZATION_RATE: f64 = 0.05;

/// Average check used when a segment has no market amount.
pub const FALLBACK_AVERAGE_CHECK: f64 = 100_000.0;

/// File name pattern of exported record parts.
pub const CSV_PART_PREFIX: &str = "output_excel_part_";
pub const CSV_PART_SUFFIX: &str = ".csv";

/// How the declared market size of a segment is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSumPolicy {
    /// Raw sum of primary amounts over the Market bucket.
    MarketBucket,
    /// `client_sum + non_client_sum`.
    ClientsPlusNonClients,
}

/// How the client count compared against channel thresholds is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientCountPolicy {
    /// `market_sum` alone.
    MarketOnly,
    /// `market_sum + client_sum + non_client_sum`.
    AllBuckets,
}

/// Decimal places kept on `potential_amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PotentialPrecision {
    One,
    Three,
}

impl PotentialPrecision {
    pub fn decimals(self) -> u32 {
        match self {
            PotentialPrecision::One => 1,
            PotentialPrecision::Three => 3,
        }
    }
}

/// How `ab_amount` is derived from the potential amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbAmountFormula {
    /// `potential × rate / 100`.
    RateOnly,
    /// `potential × (external_coefficient / 100 + rate / 100)`;
    /// a missing coefficient counts as 0.
    ExternalCoefficientPlusRate,
}

/// One complete, consistent rule set. A run applies exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaPolicy {
    pub market_sum: MarketSumPolicy,
    pub client_count: ClientCountPolicy,
    pub potential_precision: PotentialPrecision,
    pub ab_amount: AbAmountFormula,
}

impl FormulaPolicy {
    pub const CANONICAL: FormulaPolicy = FormulaPolicy {
        market_sum: MarketSumPolicy::MarketBucket,
        client_count: ClientCountPolicy::AllBuckets,
        potential_precision: PotentialPrecision::Three,
        ab_amount: AbAmountFormula::RateOnly,
    };
}

impl Default for FormulaPolicy {
    fn default() -> Self {
        Self::CANONICAL
    }
}

fn default_utilization_rate() -> f64 {
    UTILIZATION_RATE
}

fn default_fallback_average_check() -> f64 {
    FALLBACK_AVERAGE_CHECK
}

/// Engine knobs. Everything has a default; the file may be partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub formula: FormulaPolicy,
    #[serde(default = "default_utilization_rate")]
    pub utilization_rate: f64,
    #[serde(default = "default_fallback_average_check")]
    pub fallback_average_check: f64,
    #[serde(default)]
    pub loader: LoaderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            formula: FormulaPolicy::CANONICAL,
            utilization_rate: UTILIZATION_RATE,
            fallback_average_check: FALLBACK_AVERAGE_CHECK,
            loader: LoaderConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `{data_dir}/engine/engine_config.json`.
    /// In tests, use EngineConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        read_json(&format!("{data_dir}/engine/engine_config.json"))
    }

    /// Like [`EngineConfig::load`], but a missing file yields the defaults.
    /// A file that exists and cannot be read or parsed is still an error.
    pub fn load_or_default(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/engine/engine_config.json");
        if !Path::new(&path).exists() {
            log::info!("config: {path} not found, using defaults");
            return Ok(Self::default());
        }
        read_json(&path)
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Field delimiter of CSV sources.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// CSV sources start with a header line that is skipped.
    #[serde(default = "default_true")]
    pub has_header: bool,
    #[serde(default = "default_part_prefix")]
    pub part_prefix: String,
    #[serde(default = "default_part_suffix")]
    pub part_suffix: String,
}

fn default_delimiter() -> char {
    ','
}

fn default_true() -> bool {
    true
}

fn default_part_prefix() -> String {
    CSV_PART_PREFIX.to_string()
}

fn default_part_suffix() -> String {
    CSV_PART_SUFFIX.to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            has_header: true,
            part_prefix: default_part_prefix(),
            part_suffix: default_part_suffix(),
        }
    }
}

impl LoaderConfig {
    /// The delimiter as the single byte the CSV reader expects.
    /// Non-ASCII delimiters fall back to a comma.
    pub fn delimiter_byte(&self) -> u8 {
        if self.delimiter.is_ascii() {
            self.delimiter as u8
        } else {
            b','
        }
    }

    pub fn is_part_file(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.part_prefix) && file_name.ends_with(&self.part_suffix)
    }
}

/// Read and deserialize one JSON config file.
pub(crate) fn read_json<T: DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))
}
