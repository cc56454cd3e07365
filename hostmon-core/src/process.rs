//! Process table sampling and querying.

mod query;
mod record;
mod sampler;
mod snapshot;
mod source;

pub use query::{compare_records, FieldFormatter, ProcessQuery};
pub use record::{FieldValue, ProcessField, ProcessRecord, ProcessStatus, ProjectedRecord, UnknownField};
pub use sampler::{ProcessSampler, SamplerConfig, SamplerState, MIN_INTERVAL};
pub use snapshot::ProcessTableSnapshot;
pub use source::{ProcessSource, SysinfoProcessSource};
