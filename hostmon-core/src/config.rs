//! TOML configuration for the sampler, formatting and severity profiles.

use crate::error::{ConfigError, ConfigurationError};
use crate::format::FormatConfig;
use crate::process::{ProcessField, SamplerConfig};
use crate::severity::{SeverityBand, SeverityConfig, SeverityLevel, SeverityProfile};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostmonConfig {
    #[serde(default)]
    pub sampler: SamplerSection,

    #[serde(default)]
    pub format: FormatSection,

    /// Overrides for the default profiles, matched by name.
    #[serde(default)]
    pub profiles: Vec<ProfileSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplerSection {
    /// Refresh period in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_cold_start_passes")]
    pub cold_start_passes: usize,

    /// Pause between cold start passes in milliseconds
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,

    #[serde(default = "ProcessField::default_set")]
    pub fields: Vec<ProcessField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatSection {
    #[serde(default = "default_shorten_len")]
    pub shorten_len: usize,

    #[serde(default = "default_percent_decimals")]
    pub percent_decimals: usize,

    /// KiB/MiB/GiB when true, kB/MB/GB otherwise
    #[serde(default = "default_use_binary_units")]
    pub use_binary_units: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSection {
    /// Metric the profile classifies: `cpu`, `mem` or `disk`.
    pub name: String,

    #[serde(default = "default_clamp")]
    pub clamp: (f64, f64),

    #[serde(default = "default_higher_is_worse")]
    pub higher_is_worse: bool,

    pub bands: Vec<BandSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BandSection {
    pub min: f64,
    pub max: f64,
    pub label: SeverityLevel,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_cold_start_passes() -> usize {
    2
}

fn default_warmup_ms() -> u64 {
    200
}

fn default_shorten_len() -> usize {
    24
}

fn default_percent_decimals() -> usize {
    1
}

fn default_use_binary_units() -> bool {
    true
}

fn default_clamp() -> (f64, f64) {
    (0.0, 100.0)
}

fn default_higher_is_worse() -> bool {
    true
}

impl Default for SamplerSection {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            cold_start_passes: default_cold_start_passes(),
            warmup_ms: default_warmup_ms(),
            fields: ProcessField::default_set(),
        }
    }
}

impl Default for FormatSection {
    fn default() -> Self {
        Self {
            shorten_len: default_shorten_len(),
            percent_decimals: default_percent_decimals(),
            use_binary_units: default_use_binary_units(),
        }
    }
}

impl HostmonConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), profiles = config.profiles.len(), "loaded config");
        Ok(config)
    }

    /// Parse and validate; a profile that fails validation rejects the whole file.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.severity_config()?;
        Ok(config)
    }

    /// Default profiles with the configured ones installed over them.
    pub fn severity_config(&self) -> Result<SeverityConfig, ConfigurationError> {
        let mut severity = SeverityConfig::with_defaults()?;
        for section in &self.profiles {
            severity.install(section.name.clone(), section.build()?);
        }
        Ok(severity)
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            interval: Duration::from_millis(self.sampler.interval_ms),
            cold_start_passes: self.sampler.cold_start_passes,
            warmup: Duration::from_millis(self.sampler.warmup_ms),
            fields: self.sampler.fields.clone(),
        }
    }

    pub fn format_config(&self) -> FormatConfig {
        FormatConfig {
            shorten_len: self.format.shorten_len,
            percent_decimals: self.format.percent_decimals,
            use_binary_units: self.format.use_binary_units,
        }
    }
}

impl ProfileSection {
    fn build(&self) -> Result<SeverityProfile, ConfigurationError> {
        let bands = self
            .bands
            .iter()
            .map(|b| SeverityBand::new(b.min, b.max, b.label))
            .collect();
        SeverityProfile::new(
            format!("{}_percent", self.name),
            bands,
            self.clamp,
            self.higher_is_worse,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = HostmonConfig::from_toml_str("").unwrap();
        assert_eq!(config.sampler.interval_ms, 1000);
        assert_eq!(config.sampler.cold_start_passes, 2);
        assert_eq!(config.sampler.fields, ProcessField::default_set());
        assert_eq!(config.format.shorten_len, 24);
        assert!(config.format.use_binary_units);

        let severity = config.severity_config().unwrap();
        let metrics: Vec<&str> = severity.metrics().collect();
        assert_eq!(metrics, vec!["cpu", "disk", "mem"]);
    }

    #[test]
    fn test_profile_overrides_only_its_metric() {
        let config = HostmonConfig::from_toml_str(
            r#"
[sampler]
interval_ms = 250
fields = ["pid", "name", "nice"]

[[profiles]]
name = "cpu"
bands = [
  { min = 0.0, max = 90.0, label = "ok" },
  { min = 90.0, max = 100.0, label = "crit" },
]
"#,
        )
        .unwrap();

        assert_eq!(config.sampler_config().interval, Duration::from_millis(250));
        assert_eq!(
            config.sampler.fields,
            vec![ProcessField::Pid, ProcessField::Name, ProcessField::Nice]
        );

        let severity = config.severity_config().unwrap();
        assert_eq!(severity.severity_for("cpu", 80.0), SeverityLevel::Ok);
        assert_eq!(severity.severity_for("mem", 80.0), SeverityLevel::Warn);
    }

    #[test]
    fn test_invalid_profile_rejects_file() {
        let err = HostmonConfig::from_toml_str(
            r#"
[[profiles]]
name = "disk"
bands = [
  { min = 0.0, max = 40.0, label = "ok" },
  { min = 50.0, max = 100.0, label = "crit" },
]
"#,
        )
        .unwrap_err();

        match err {
            ConfigError::Profile(ConfigurationError::Gap { profile, .. }) => {
                assert_eq!(profile, "disk_percent")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_field_is_a_parse_error() {
        let err = HostmonConfig::from_toml_str("[sampler]\nfields = [\"cpu\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[format]\nuse_binary_units = false\npercent_decimals = 2").unwrap();

        let config = HostmonConfig::load(file.path()).unwrap();
        assert!(!config.format.use_binary_units);
        assert_eq!(config.format_config().percent_decimals, 2);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        match HostmonConfig::load(&path) {
            Err(ConfigError::Read { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
