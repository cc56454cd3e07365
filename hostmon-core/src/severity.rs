use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Tolerance used when comparing band edges.
pub const BAND_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Ok,
    Info,
    Warn,
    Crit,
}

impl SeverityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Ok => "ok",
            SeverityLevel::Info => "info",
            SeverityLevel::Warn => "warn",
            SeverityLevel::Crit => "crit",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open interval `[min_inclusive, max_exclusive)` mapped to a label.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct SeverityBand {
    pub min_inclusive: f64,
    pub max_exclusive: f64,
    pub label: SeverityLevel,
}

impl SeverityBand {
    pub const fn new(min_inclusive: f64, max_exclusive: f64, label: SeverityLevel) -> Self {
        Self {
            min_inclusive,
            max_exclusive,
            label,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min_inclusive <= value && value < self.max_exclusive
    }
}

/// A validated set of bands partitioning a clamp range.
///
/// The only way to obtain one is [`SeverityProfile::new`], which runs
/// [`validate`] first, so every profile in circulation satisfies the band
/// coverage invariants.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SeverityProfile {
    name: String,
    bands: Vec<SeverityBand>,
    clamp: (f64, f64),
    higher_is_worse: bool,
}

impl SeverityProfile {
    pub fn new<S: Into<String>>(
        name: S,
        bands: Vec<SeverityBand>,
        clamp: (f64, f64),
        higher_is_worse: bool,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        let bands = validate(&name, &bands, clamp)?;

        Ok(Self {
            name,
            bands,
            clamp,
            higher_is_worse,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bands in ascending order.
    pub fn bands(&self) -> &[SeverityBand] {
        &self.bands
    }

    pub fn clamp(&self) -> (f64, f64) {
        self.clamp
    }

    pub fn higher_is_worse(&self) -> bool {
        self.higher_is_worse
    }

    /// Copy of this profile under another name.
    pub fn renamed<S: Into<String>>(&self, name: S) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn classify(&self, value: f64) -> SeverityLevel {
        let (lo, hi) = self.clamp;
        let clamped = if value.is_nan() { lo } else { value.clamp(lo, hi) };
        let v = if self.higher_is_worse {
            clamped
        } else {
            hi - (clamped - lo)
        };

        self.bands
            .iter()
            .find(|band| band.contains(v))
            .or_else(|| self.bands.last())
            .map(|band| band.label)
            .unwrap_or(SeverityLevel::Ok)
    }
}

/// Check that `bands` exactly partition `clamp` and return them sorted.
pub fn validate(
    profile: &str,
    bands: &[SeverityBand],
    clamp: (f64, f64),
) -> Result<Vec<SeverityBand>, ConfigurationError> {
    let (lo, hi) = clamp;
    if !(lo < hi) {
        return Err(ConfigurationError::InvalidClamp {
            profile: profile.to_string(),
            lo,
            hi,
        });
    }
    if bands.is_empty() {
        return Err(ConfigurationError::NoBands {
            profile: profile.to_string(),
        });
    }

    let mut sorted = bands.to_vec();
    sorted.sort_by(|a, b| {
        a.min_inclusive
            .total_cmp(&b.min_inclusive)
            .then(a.max_exclusive.total_cmp(&b.max_exclusive))
    });

    let first_min = sorted[0].min_inclusive;
    if !((first_min - lo).abs() <= BAND_EPSILON) {
        return Err(ConfigurationError::StartMismatch {
            profile: profile.to_string(),
            first_min,
            lo,
        });
    }

    let mut previous_max = lo;
    for (index, band) in sorted.iter().enumerate() {
        let (min, max) = (band.min_inclusive, band.max_exclusive);

        if !(min + BAND_EPSILON < max) {
            return Err(ConfigurationError::NonMonotonic {
                profile: profile.to_string(),
                index,
                min,
                max,
            });
        }

        if min < lo - BAND_EPSILON || max > hi + BAND_EPSILON {
            return Err(ConfigurationError::OutOfClamp {
                profile: profile.to_string(),
                index,
                min,
                max,
                lo,
                hi,
            });
        }

        // Each band has to pick up exactly where the previous one stopped
        if (min - previous_max).abs() > BAND_EPSILON {
            if min > previous_max {
                return Err(ConfigurationError::Gap {
                    profile: profile.to_string(),
                    from: previous_max,
                    to: min,
                });
            }
            return Err(ConfigurationError::Overlap {
                profile: profile.to_string(),
                start: min,
                previous_max,
            });
        }

        previous_max = max;
    }

    if (previous_max - hi).abs() > BAND_EPSILON {
        return Err(ConfigurationError::IncompleteCoverage {
            profile: profile.to_string(),
            last_max: previous_max,
            hi,
        });
    }

    Ok(sorted)
}

pub fn default_bands() -> Vec<SeverityBand> {
    vec![
        SeverityBand::new(0.0, 50.0, SeverityLevel::Ok),
        SeverityBand::new(50.0, 75.0, SeverityLevel::Info),
        SeverityBand::new(75.0, 85.0, SeverityLevel::Warn),
        // 100.0 itself falls through to this band via the top fallback
        SeverityBand::new(85.0, 100.0, SeverityLevel::Crit),
    ]
}

/// Registry of validated profiles keyed by metric name (`cpu`, `mem`, `disk`).
#[derive(Debug, Clone, Default)]
pub struct SeverityConfig {
    profiles: BTreeMap<String, Arc<SeverityProfile>>,
}

impl SeverityConfig {
    pub const CPU: &'static str = "cpu";
    pub const MEMORY: &'static str = "mem";
    pub const DISK: &'static str = "disk";

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Result<Self, ConfigurationError> {
        let mut config = Self::empty();
        for metric in [Self::CPU, Self::MEMORY, Self::DISK] {
            let profile = SeverityProfile::new(
                format!("{}_percent", metric),
                default_bands(),
                (0.0, 100.0),
                true,
            )?;
            config.install(metric, profile);
        }
        Ok(config)
    }

    /// Register `profile` for `metric`, replacing any previous one.
    pub fn install<S: Into<String>>(&mut self, metric: S, profile: SeverityProfile) {
        self.profiles.insert(metric.into(), Arc::new(profile));
    }

    pub fn profile(&self, metric: &str) -> Option<&SeverityProfile> {
        self.profiles.get(metric).map(|p| p.as_ref())
    }

    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Classify `value` with the profile for `metric`, or `Ok` if there is none.
    pub fn severity_for(&self, metric: &str, value: f64) -> SeverityLevel {
        self.profile(metric)
            .map(|profile| profile.classify(value))
            .unwrap_or(SeverityLevel::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_bands() -> Vec<SeverityBand> {
        default_bands()
    }

    #[test]
    fn test_defaults_validate() {
        let config = SeverityConfig::with_defaults().unwrap();
        let names: Vec<&str> = config.metrics().collect();
        assert_eq!(names, vec!["cpu", "disk", "mem"]);
        assert_eq!(config.profile("cpu").unwrap().name(), "cpu_percent");
    }

    #[test]
    fn test_boundaries_resolve_to_upper_band() {
        let profile = SeverityProfile::new("cpu", four_bands(), (0.0, 100.0), true).unwrap();
        assert_eq!(profile.classify(0.0), SeverityLevel::Ok);
        assert_eq!(profile.classify(49.999), SeverityLevel::Ok);
        assert_eq!(profile.classify(50.0), SeverityLevel::Info);
        assert_eq!(profile.classify(75.0), SeverityLevel::Warn);
        assert_eq!(profile.classify(85.0), SeverityLevel::Crit);
        // exact top bound uses the inclusive fallback
        assert_eq!(profile.classify(100.0), SeverityLevel::Crit);
    }

    #[test]
    fn test_every_value_in_range_gets_a_label() {
        let profile = SeverityProfile::new("cpu", four_bands(), (0.0, 100.0), true).unwrap();
        let mut v = 0.0;
        while v <= 100.0 {
            let label = profile.classify(v);
            let expected = profile
                .bands()
                .iter()
                .find(|b| b.contains(v))
                .map(|b| b.label)
                .unwrap_or(SeverityLevel::Crit);
            assert_eq!(label, expected, "value {}", v);
            v += 0.25;
        }
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let profile = SeverityProfile::new("cpu", four_bands(), (0.0, 100.0), true).unwrap();
        assert_eq!(profile.classify(-20.0), SeverityLevel::Ok);
        assert_eq!(profile.classify(250.0), SeverityLevel::Crit);
        assert_eq!(profile.classify(f64::NAN), SeverityLevel::Ok);
    }

    #[test]
    fn test_reflection_symmetry() {
        let lower = SeverityProfile::new("battery", four_bands(), (0.0, 100.0), false).unwrap();
        let higher = SeverityProfile::new("battery", four_bands(), (0.0, 100.0), true).unwrap();
        let (lo, hi) = lower.clamp();

        for v in [0.0, 5.0, 14.9, 15.0, 25.0, 25.1, 49.0, 50.0, 50.5, 99.0, 100.0] {
            assert_eq!(lower.classify(v), higher.classify(hi - (v - lo)), "value {}", v);
        }
        // a nearly empty battery is critical
        assert_eq!(lower.classify(3.0), SeverityLevel::Crit);
        assert_eq!(lower.classify(90.0), SeverityLevel::Ok);
    }

    #[test]
    fn test_unsorted_bands_are_accepted_and_sorted() {
        let mut bands = four_bands();
        bands.reverse();
        let profile = SeverityProfile::new("cpu", bands, (0.0, 100.0), true).unwrap();
        assert_eq!(profile.bands()[0].label, SeverityLevel::Ok);
        assert_eq!(profile.classify(60.0), SeverityLevel::Info);
    }

    #[test]
    fn test_gap_is_rejected() {
        let bands = vec![
            SeverityBand::new(0.0, 40.0, SeverityLevel::Ok),
            SeverityBand::new(50.0, 100.0, SeverityLevel::Crit),
        ];
        let err = SeverityProfile::new("gappy", bands, (0.0, 100.0), true).unwrap_err();
        assert!(matches!(err, ConfigurationError::Gap { from, to, .. } if from == 40.0 && to == 50.0));
        assert_eq!(err.profile(), "gappy");
    }

    #[test]
    fn test_overlap_is_rejected() {
        let bands = vec![
            SeverityBand::new(0.0, 50.0, SeverityLevel::Ok),
            SeverityBand::new(40.0, 100.0, SeverityLevel::Crit),
        ];
        let err = SeverityProfile::new("overlap", bands, (0.0, 100.0), true).unwrap_err();
        assert!(matches!(err, ConfigurationError::Overlap { .. }));
    }

    #[test]
    fn test_short_last_band_is_rejected() {
        let bands = vec![
            SeverityBand::new(0.0, 50.0, SeverityLevel::Ok),
            SeverityBand::new(50.0, 90.0, SeverityLevel::Crit),
        ];
        let err = SeverityProfile::new("short", bands, (0.0, 100.0), true).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::IncompleteCoverage { last_max, hi, .. } if last_max == 90.0 && hi == 100.0
        ));
    }

    #[test]
    fn test_band_past_clamp_is_rejected() {
        let bands = vec![
            SeverityBand::new(0.0, 85.0, SeverityLevel::Ok),
            SeverityBand::new(85.0, 101.0, SeverityLevel::Crit),
        ];
        let err = SeverityProfile::new("wide", bands, (0.0, 100.0), true).unwrap_err();
        assert!(matches!(err, ConfigurationError::OutOfClamp { index: 1, .. }));
    }

    #[test]
    fn test_other_defects_are_distinguishable() {
        let err = SeverityProfile::new("clamp", four_bands(), (100.0, 0.0), true).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidClamp { .. }));

        let err = SeverityProfile::new("empty", Vec::new(), (0.0, 100.0), true).unwrap_err();
        assert!(matches!(err, ConfigurationError::NoBands { .. }));

        let bands = vec![SeverityBand::new(10.0, 100.0, SeverityLevel::Ok)];
        let err = SeverityProfile::new("late", bands, (0.0, 100.0), true).unwrap_err();
        assert!(matches!(err, ConfigurationError::StartMismatch { .. }));

        let bands = vec![
            SeverityBand::new(0.0, 0.0, SeverityLevel::Ok),
            SeverityBand::new(0.0, 100.0, SeverityLevel::Crit),
        ];
        let err = SeverityProfile::new("flat", bands, (0.0, 100.0), true).unwrap_err();
        assert!(matches!(err, ConfigurationError::NonMonotonic { index: 0, .. }));
    }

    #[test]
    fn test_edges_within_epsilon_are_tolerated() {
        let bands = vec![
            SeverityBand::new(0.0, 50.0, SeverityLevel::Ok),
            SeverityBand::new(50.0 + 1e-12, 100.0 - 1e-12, SeverityLevel::Crit),
        ];
        assert!(SeverityProfile::new("fuzzy", bands, (0.0, 100.0), true).is_ok());
    }

    #[test]
    fn test_severity_for_unknown_metric_is_ok() {
        let config = SeverityConfig::with_defaults().unwrap();
        assert_eq!(config.severity_for("gpu", 99.0), SeverityLevel::Ok);
        assert_eq!(config.severity_for("mem", 80.0), SeverityLevel::Warn);
    }
}
