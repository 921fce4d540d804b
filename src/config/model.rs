// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::catalog::{CATALOG_FILE_PATH, ObjectType, RawContentFilter};
use crate::ledger::LEDGER_FILE_PATH;
use crate::rule::{RetryPolicy, Rule, RuleId};
use crate::types::{
    CompositeMethod, LedgerStorageMode, QualityControlMode, SelectionMethod, TimeoutMode,
};

/// Configuration as read from TOML.
///
/// ```toml
/// [engine]
/// ledger = "file"
///
/// [rule.swe_comp]
/// type = "composite"
/// area = "swegmaps_2000"
/// sources = ["seang", "sekir"]
/// timeout = "15m"
///
/// [route.hourly]
/// rules = ["acrr_12h"]
///
/// [schedule.every_10m]
/// every = "10m"
/// target = "hourly"
/// ```
///
/// Turn it into a [`ConfigFile`] with `ConfigFile::try_from`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: RawEngineSection,

    /// Rules keyed by rule id.
    #[serde(default)]
    pub rule: BTreeMap<String, RawRuleConfig>,

    #[serde(default)]
    pub route: BTreeMap<String, RawRoute>,

    #[serde(default)]
    pub schedule: BTreeMap<String, RawSchedule>,
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEngineSection {
    #[serde(default)]
    pub ledger: LedgerStorageMode,

    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,

    /// Arrival journal, kept next to a `file` ledger so re-armed windows
    /// still see the files that arrived before a restart.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    /// Delay before a timeout whose catalog fetch failed is retried.
    #[serde(default = "default_timeout_retry")]
    pub timeout_retry: String,

    #[serde(default = "default_max_timeout_retries")]
    pub max_timeout_retries: u32,
}

fn default_ledger_path() -> String {
    LEDGER_FILE_PATH.to_string()
}

fn default_catalog_path() -> String {
    CATALOG_FILE_PATH.to_string()
}

fn default_timeout_retry() -> String {
    "30s".to_string()
}

fn default_max_timeout_retries() -> u32 {
    3
}

impl Default for RawEngineSection {
    fn default() -> Self {
        Self {
            ledger: LedgerStorageMode::default(),
            ledger_path: default_ledger_path(),
            catalog_path: default_catalog_path(),
            timeout_retry: default_timeout_retry(),
            max_timeout_retries: default_max_timeout_retries(),
        }
    }
}

/// `[rule.<id>]`, discriminated by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RawRuleConfig {
    Composite(RawCompositeConfig),
    Volume(RawVolumeConfig),
    Acrr(RawAcrrConfig),
    Gra(RawGraConfig),
    Scansun(RawScansunConfig),
    Distribution(RawDistributionConfig),
    Trim(RawTrimConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCompositeConfig {
    pub area: String,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub sources: Vec<String>,
    /// Anomaly detectors run before compositing.
    #[serde(default)]
    pub detectors: Vec<String>,
    #[serde(default)]
    pub qc_mode: QualityControlMode,
    #[serde(default)]
    pub method: CompositeMethod,
    #[serde(default)]
    pub prodpar: String,
    #[serde(default)]
    pub selection: SelectionMethod,
    #[serde(default = "default_quantity")]
    pub quantity: String,
    /// e.g. `"15m"`; without it the composite waits for full coverage.
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub timeout_mode: TimeoutMode,
    /// Build from the lowest scan per radar instead of polar volumes.
    #[serde(default)]
    pub scan_based: bool,
    #[serde(default)]
    pub min_elevation: f64,
    #[serde(default = "default_max_elevation")]
    pub max_elevation: f64,
    /// Scans sweep upwards; a source is complete at `max_elevation`
    /// (or at `min_elevation` when false).
    #[serde(default = "default_true")]
    pub ascending: bool,
    #[serde(default)]
    pub apply_gra: bool,
    #[serde(default = "default_zr_a")]
    pub zr_a: f64,
    #[serde(default = "default_zr_b")]
    pub zr_b: f64,
    #[serde(default)]
    pub ignore_malfunc: bool,
    #[serde(default)]
    pub ctfilter: bool,
    #[serde(default)]
    pub qitotal_field: String,
    #[serde(default)]
    pub filter: Option<RawContentFilter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawVolumeConfig {
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub timeout_mode: TimeoutMode,
    #[serde(default)]
    pub elevation_min: f64,
    #[serde(default = "default_max_elevation")]
    pub elevation_max: f64,
    /// Explicit angle list; overrides the min/max band when non-empty.
    #[serde(default)]
    pub elevation_angles: Vec<f64>,
    #[serde(default = "default_true")]
    pub ascending: bool,
    #[serde(default)]
    pub detectors: Vec<String>,
    #[serde(default)]
    pub qc_mode: QualityControlMode,
    #[serde(default)]
    pub filter: Option<RawContentFilter>,
}

/// Fields shared by ACRR and GRA rules.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTermConfig {
    pub area: String,
    #[serde(default = "default_term_object_type")]
    pub object_type: ObjectType,
    #[serde(default = "default_files_per_hour")]
    pub files_per_hour: u32,
    /// Percent of expected files that may be missing.
    #[serde(default)]
    pub acceptable_loss: u32,
    #[serde(default = "default_distance_field")]
    pub distance_field: String,
    #[serde(default = "default_zr_a")]
    pub zr_a: f64,
    #[serde(default = "default_zr_b")]
    pub zr_b: f64,
    #[serde(default = "default_quantity")]
    pub quantity: String,
    #[serde(default)]
    pub filter: Option<RawContentFilter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAcrrConfig {
    #[serde(flatten)]
    pub term: RawTermConfig,
    #[serde(default = "default_acrr_hours")]
    pub hours: u32,
    #[serde(default)]
    pub first_term_offset: u32,
    #[serde(default)]
    pub apply_gra: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGraConfig {
    #[serde(flatten)]
    pub term: RawTermConfig,
    /// Coefficient interval, hours.
    #[serde(default = "default_gra_interval")]
    pub interval: u32,
    #[serde(default = "default_gra_first_term")]
    pub first_term_utc: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawScansunConfig {
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default = "default_scansun_object_types")]
    pub object_types: Vec<ObjectType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDistributionConfig {
    pub destination: String,
    #[serde(default)]
    pub name_template: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub filter: Option<RawContentFilter>,
}

/// Exactly one of `max_age` / `max_count`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrimConfig {
    #[serde(default)]
    pub max_age: Option<String>,
    #[serde(default)]
    pub max_count: Option<usize>,
}

/// `[route.<name>]`
#[derive(Debug, Clone, Deserialize)]
pub struct RawRoute {
    pub rules: Vec<String>,
}

/// `[schedule.<name>]`: periodic ticks at a rule or route.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSchedule {
    pub every: String,
    pub target: String,
}

fn default_interval() -> u32 {
    15
}

fn default_quantity() -> String {
    "DBZH".to_string()
}

fn default_max_elevation() -> f64 {
    90.0
}

fn default_zr_a() -> f64 {
    200.0
}

fn default_zr_b() -> f64 {
    1.6
}

fn default_true() -> bool {
    true
}

fn default_term_object_type() -> ObjectType {
    ObjectType::Comp
}

fn default_files_per_hour() -> u32 {
    4
}

fn default_distance_field() -> String {
    "eu.baltrad.composite.quality.distance.radar".to_string()
}

fn default_acrr_hours() -> u32 {
    12
}

fn default_gra_interval() -> u32 {
    12
}

fn default_gra_first_term() -> u32 {
    6
}

fn default_scansun_object_types() -> Vec<ObjectType> {
    vec![ObjectType::Scan, ObjectType::Pvol]
}

/// Validated engine settings.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub ledger: LedgerStorageMode,
    pub ledger_path: PathBuf,
    /// Only used with a `file` ledger.
    pub catalog_path: PathBuf,
    pub retry: RetryPolicy,
}

/// A validated periodic tick source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub name: String,
    pub every: std::time::Duration,
    /// A rule id or a route name.
    pub target: String,
}

/// Validated configuration, ready to hand to the dispatcher.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub engine: EngineSettings,
    /// Ordered by rule id.
    pub rules: Vec<Rule>,
    pub routes: BTreeMap<String, Vec<RuleId>>,
    pub schedules: Vec<Schedule>,
}
