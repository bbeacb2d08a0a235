//! Shipper configuration loaded from a toml file.
//!
//! Plain optional fields with defaults applied at the point of use; unknown
//! keys are ignored, malformed values fail the parse and therefore the load.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::collect::AccumulatorLimits;

/// Keys recognized by the output stage.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_format: Option<String>,
    pub output_socket: Option<String>,
    pub enable_ack_mode: Option<bool>,
    pub ack_queue_size: Option<u64>,
    pub ack_timeout: Option<i64>,
    pub filter_record_types: Vec<String>,
}

/// Assembly ceilings and flush cadence for the accumulator.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AccumulatorConfig {
    pub max_event_size: Option<usize>,
    pub max_execve_accum_size: Option<usize>,
    pub max_num_execve_records: Option<usize>,
    pub num_execve_rh_preserve: Option<usize>,
    pub max_cache_entry: Option<usize>,
    pub flush_interval_ms: Option<u64>,
    pub flush_idle_ms: Option<u64>,
}

impl AccumulatorConfig {
    pub fn limits(&self) -> AccumulatorLimits {
        let defaults = AccumulatorLimits::default();
        AccumulatorLimits {
            max_event_size: self.max_event_size.unwrap_or(defaults.max_event_size),
            max_execve_accum_size: self
                .max_execve_accum_size
                .unwrap_or(defaults.max_execve_accum_size),
            max_num_execve_records: self
                .max_num_execve_records
                .unwrap_or(defaults.max_num_execve_records),
            num_execve_rh_preserve: self
                .num_execve_rh_preserve
                .unwrap_or(defaults.num_execve_rh_preserve),
            max_cache_entry: self.max_cache_entry.unwrap_or(defaults.max_cache_entry),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ShipperConfig {
    pub cursor_file: Option<PathBuf>,
    pub queue_size: Option<usize>,
    pub output: OutputConfig,
    pub accumulator: AccumulatorConfig,
}

impl ShipperConfig {
    pub fn load(path: &Path) -> Result<ShipperConfig, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("could not read config {}: {e}", path.display()))?;
        toml::from_str(&contents).map_err(|e| format!("malformed config {}: {e}", path.display()))
    }
}
