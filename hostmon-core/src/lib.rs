pub mod config;
pub mod error;
pub mod format;
pub mod metrics;
pub mod monitor;
pub mod normalizer;
pub mod process;
pub mod rate;
pub mod severity;
pub mod source;


pub use config::HostmonConfig;
pub use error::{AccessorError, ConfigError, ConfigurationError, FormatError, SamplerError};
pub use format::{FormatConfig, Formatter, SimpleFormatter};
pub use monitor::HostMonitor;
pub use normalizer::{Domain, HostSnapshot, SnapshotNormalizer};
pub use process::{
    FieldValue, ProcessField, ProcessQuery, ProcessRecord, ProcessSampler, ProcessSource,
    ProcessTableSnapshot, ProjectedRecord, SamplerConfig, SamplerState, SysinfoProcessSource,
};
pub use rate::{ByteRate, RateTracker};
pub use severity::{SeverityBand, SeverityConfig, SeverityLevel, SeverityProfile};
pub use source::MetricsSource;
