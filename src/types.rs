use std::fmt;

use serde::Deserialize;

/// How a window's timeout deadline is anchored.
///
/// - `Nominal`: the deadline is the window's nominal time plus the timeout,
///   so late first arrivals wait less (default).
/// - `Arrival`: the deadline is a fixed offset from the first arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutMode {
    #[default]
    Nominal,
    Arrival,
}

/// What downstream quality control does with the configured detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityControlMode {
    /// Only analyze and record quality fields.
    Analyze,
    #[default]
    AnalyzeAndApply,
}

impl fmt::Display for QualityControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityControlMode::Analyze => f.write_str("ANALYZE"),
            QualityControlMode::AnalyzeAndApply => f.write_str("ANALYZE_AND_APPLY"),
        }
    }
}

/// Composite projection method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompositeMethod {
    #[default]
    Ppi,
    Cappi,
    Pcappi,
    Pmax,
    Max,
}

impl fmt::Display for CompositeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompositeMethod::Ppi => "PPI",
            CompositeMethod::Cappi => "CAPPI",
            CompositeMethod::Pcappi => "PCAPPI",
            CompositeMethod::Pmax => "PMAX",
            CompositeMethod::Max => "MAX",
        };
        f.write_str(s)
    }
}

/// How overlapping radars are resolved in a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionMethod {
    #[default]
    NearestRadar,
    HeightAboveSealevel,
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMethod::NearestRadar => f.write_str("NEAREST_RADAR"),
            SelectionMethod::HeightAboveSealevel => f.write_str("HEIGHT_ABOVE_SEALEVEL"),
        }
    }
}

/// Where the trigger ledger is kept. `File` also journals arrivals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStorageMode {
    /// Append-only JSON-lines file, survives restarts.
    File,
    /// In memory only (lost on restart).
    #[default]
    Memory,
}

/// Z-R relationship coefficients, `Z = a * R^b`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ZrCoefficients {
    pub a: f64,
    pub b: f64,
}

impl Default for ZrCoefficients {
    fn default() -> Self {
        Self { a: 200.0, b: 1.6 }
    }
}
