use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Attribute that can be requested for every process in a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessField {
    Pid,
    Name,
    Username,
    CpuPercent,
    MemoryPercent,
    MemoryRss,
    MemoryVms,
    Ppid,
    Status,
    Nice,
    NumThreads,
    CreateTime,
    Cmdline,
    Exe,
    DiskReadBytes,
    DiskWriteBytes,
}

impl ProcessField {
    pub const ALL: [ProcessField; 16] = [
        ProcessField::Pid,
        ProcessField::Name,
        ProcessField::Username,
        ProcessField::CpuPercent,
        ProcessField::MemoryPercent,
        ProcessField::MemoryRss,
        ProcessField::MemoryVms,
        ProcessField::Ppid,
        ProcessField::Status,
        ProcessField::Nice,
        ProcessField::NumThreads,
        ProcessField::CreateTime,
        ProcessField::Cmdline,
        ProcessField::Exe,
        ProcessField::DiskReadBytes,
        ProcessField::DiskWriteBytes,
    ];

    /// Attribute set sampled when nothing else is configured.
    pub fn default_set() -> Vec<ProcessField> {
        vec![
            ProcessField::Pid,
            ProcessField::Name,
            ProcessField::Username,
            ProcessField::CpuPercent,
            ProcessField::MemoryPercent,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessField::Pid => "pid",
            ProcessField::Name => "name",
            ProcessField::Username => "username",
            ProcessField::CpuPercent => "cpu_percent",
            ProcessField::MemoryPercent => "memory_percent",
            ProcessField::MemoryRss => "memory_rss",
            ProcessField::MemoryVms => "memory_vms",
            ProcessField::Ppid => "ppid",
            ProcessField::Status => "status",
            ProcessField::Nice => "nice",
            ProcessField::NumThreads => "num_threads",
            ProcessField::CreateTime => "create_time",
            ProcessField::Cmdline => "cmdline",
            ProcessField::Exe => "exe",
            ProcessField::DiskReadBytes => "disk_read_bytes",
            ProcessField::DiskWriteBytes => "disk_write_bytes",
        }
    }
}

impl fmt::Display for ProcessField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown process field '{}'", self.0)
    }
}

impl std::error::Error for UnknownField {}

impl FromStr for ProcessField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcessField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Running,
    Sleeping,
    Idle,
    Stopped,
    Zombie,
    Dead,
    Unknown,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Running => "running",
            ProcessStatus::Sleeping => "sleeping",
            ProcessStatus::Idle => "idle",
            ProcessStatus::Stopped => "stopped",
            ProcessStatus::Zombie => "zombie",
            ProcessStatus::Dead => "dead",
            ProcessStatus::Unknown => "unknown",
        }
    }
}

/// Value of one process attribute, or `Unavailable` when it could not be read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Unavailable,
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn is_available(&self) -> bool {
        !matches!(self, FieldValue::Unavailable)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            FieldValue::Int(_) | FieldValue::Float(_) => 0,
            FieldValue::Text(_) => 1,
            FieldValue::List(_) => 2,
            FieldValue::Unavailable => 3,
        }
    }

    /// Total order over values: numbers, then text, then lists, then
    /// `Unavailable`.
    pub fn total_cmp(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::Int(a), FieldValue::Int(b)) => a.cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            (FieldValue::List(a), FieldValue::List(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => self.kind_rank().cmp(&other.kind_rank()),
            },
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Int(v as i64)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(v as f64)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(v: Vec<String>) -> Self {
        FieldValue::List(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Unavailable)
    }
}

static UNAVAILABLE: FieldValue = FieldValue::Unavailable;

/// One process as seen by a single refresh.
///
/// Values are kept in the order the attributes were requested.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRecord {
    pid: u32,
    values: Vec<(ProcessField, FieldValue)>,
}

impl ProcessRecord {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            values: Vec::new(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Set `field`, replacing an earlier value for the same field.
    pub fn set<V: Into<FieldValue>>(&mut self, field: ProcessField, value: V) {
        let value = value.into();
        match self.values.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.values.push((field, value)),
        }
    }

    pub fn with<V: Into<FieldValue>>(mut self, field: ProcessField, value: V) -> Self {
        self.set(field, value);
        self
    }

    /// Value of `field`; fields that were never requested read as `Unavailable`.
    pub fn get(&self, field: ProcessField) -> &FieldValue {
        self.values
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v)
            .unwrap_or(&UNAVAILABLE)
    }

    pub fn username(&self) -> Option<&str> {
        self.get(ProcessField::Username).as_str()
    }

    pub fn fields(&self) -> impl Iterator<Item = ProcessField> + '_ {
        self.values.iter().map(|(f, _)| *f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProcessField, &FieldValue)> {
        self.values.iter().map(|(f, v)| (*f, v))
    }
}

impl Serialize for ProcessRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in &self.values {
            map.serialize_entry(field.as_str(), value)?;
        }
        map.end()
    }
}

/// A record cut down to the fields a query asked for, in the asked order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRecord {
    pid: u32,
    values: Vec<(ProcessField, FieldValue)>,
}

impl ProjectedRecord {
    pub(crate) fn new(pid: u32, values: Vec<(ProcessField, FieldValue)>) -> Self {
        Self { pid, values }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn get(&self, field: ProcessField) -> Option<&FieldValue> {
        self.values.iter().find(|(f, _)| *f == field).map(|(_, v)| v)
    }

    pub fn fields(&self) -> Vec<ProcessField> {
        self.values.iter().map(|(f, _)| *f).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProcessField, &FieldValue)> {
        self.values.iter().map(|(f, v)| (*f, v))
    }

    pub(crate) fn values_mut(&mut self) -> &mut [(ProcessField, FieldValue)] {
        &mut self.values
    }
}

impl Serialize for ProjectedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in &self.values {
            map.serialize_entry(field.as_str(), value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_round_trip() {
        for field in ProcessField::ALL {
            assert_eq!(field.as_str().parse::<ProcessField>(), Ok(field));
        }
        assert!("cpu".parse::<ProcessField>().is_err());
    }

    #[test]
    fn test_missing_field_reads_unavailable() {
        let record = ProcessRecord::new(42).with(ProcessField::Name, "bash");
        assert_eq!(record.get(ProcessField::Name), &FieldValue::Text("bash".into()));
        assert_eq!(record.get(ProcessField::Nice), &FieldValue::Unavailable);
        assert_eq!(record.username(), None);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut record = ProcessRecord::new(1)
            .with(ProcessField::Pid, 1u32)
            .with(ProcessField::Name, "init");
        record.set(ProcessField::Pid, 7u32);
        let fields: Vec<ProcessField> = record.fields().collect();
        assert_eq!(fields, vec![ProcessField::Pid, ProcessField::Name]);
        assert_eq!(record.get(ProcessField::Pid), &FieldValue::Int(7));
    }

    #[test]
    fn test_value_ordering_mixes_numbers() {
        assert_eq!(FieldValue::Int(2).total_cmp(&FieldValue::Float(1.5)), Ordering::Greater);
        assert_eq!(FieldValue::Float(2.0).total_cmp(&FieldValue::Int(2)), Ordering::Equal);
        assert_eq!(FieldValue::Int(99).total_cmp(&FieldValue::Text("a".into())), Ordering::Less);
        assert_eq!(
            FieldValue::Text("zsh".into()).total_cmp(&FieldValue::Text("bash".into())),
            Ordering::Greater
        );
    }

    #[test]
    fn test_record_serializes_in_request_order() {
        let record = ProcessRecord::new(9)
            .with(ProcessField::Username, "root")
            .with(ProcessField::Pid, 9u32)
            .with(ProcessField::Nice, FieldValue::Unavailable);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"username":"root","pid":9,"nice":null}"#);
    }
}
