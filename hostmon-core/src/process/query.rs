use super::record::{FieldValue, ProcessField, ProcessRecord, ProjectedRecord};
use crate::error::FormatError;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

/// Presentation transform applied to one field after projection.
pub type FieldFormatter = Arc<dyn Fn(&FieldValue) -> Result<FieldValue, FormatError> + Send + Sync>;

/// Sort, filter, project and format a process list.
///
/// Stages run in that order: user filter, sort, limit, projection, formatting.
#[derive(Clone)]
pub struct ProcessQuery {
    pub sort_by: Option<ProcessField>,
    pub descending: bool,
    pub limit: Option<usize>,
    pub fields: Option<Vec<ProcessField>>,
    pub user_filter: Option<String>,
    pub formatters: HashMap<ProcessField, FieldFormatter>,
}

impl Default for ProcessQuery {
    fn default() -> Self {
        Self {
            sort_by: None,
            descending: true,
            limit: None,
            fields: None,
            user_filter: None,
            formatters: HashMap::new(),
        }
    }
}

impl fmt::Debug for ProcessQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formatted: Vec<&ProcessField> = self.formatters.keys().collect();
        formatted.sort();
        f.debug_struct("ProcessQuery")
            .field("sort_by", &self.sort_by)
            .field("descending", &self.descending)
            .field("limit", &self.limit)
            .field("fields", &self.fields)
            .field("user_filter", &self.user_filter)
            .field("formatters", &formatted)
            .finish()
    }
}

impl ProcessQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_by(mut self, field: ProcessField) -> Self {
        self.sort_by = Some(field);
        self
    }

    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn fields<I: IntoIterator<Item = ProcessField>>(mut self, fields: I) -> Self {
        self.fields = Some(fields.into_iter().collect());
        self
    }

    pub fn user<S: Into<String>>(mut self, username: S) -> Self {
        self.user_filter = Some(username.into());
        self
    }

    pub fn format<F>(mut self, field: ProcessField, formatter: F) -> Self
    where
        F: Fn(&FieldValue) -> Result<FieldValue, FormatError> + Send + Sync + 'static,
    {
        self.formatters.insert(field, Arc::new(formatter));
        self
    }

    pub fn format_with(mut self, field: ProcessField, formatter: FieldFormatter) -> Self {
        self.formatters.insert(field, formatter);
        self
    }

    pub fn run(&self, records: &[ProcessRecord]) -> Vec<ProjectedRecord> {
        let mut selected: Vec<&ProcessRecord> = match &self.user_filter {
            Some(user) => records
                .iter()
                .filter(|r| r.username() == Some(user.as_str()))
                .collect(),
            None => records.iter().collect(),
        };

        if let Some(field) = self.sort_by {
            selected.sort_by(|a, b| compare_records(a, b, field, self.descending));
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }

        selected
            .into_iter()
            .map(|record| {
                let mut projected = project(record, self.fields.as_deref());
                self.apply_formatters(&mut projected);
                projected
            })
            .collect()
    }

    fn apply_formatters(&self, record: &mut ProjectedRecord) {
        if self.formatters.is_empty() {
            return;
        }
        let pid = record.pid();
        for (field, value) in record.values_mut() {
            if let Some(formatter) = self.formatters.get(field) {
                if let Some(formatted) = format_best_effort(pid, *field, formatter, value) {
                    *value = formatted;
                }
            }
        }
    }
}

/// Order two records by `field`.
///
/// The key is `(is_missing, value, pid)`: records lacking the field always
/// come after the ones that have it, whatever the direction, and equal values
/// fall back to ascending pid.
pub fn compare_records(
    a: &ProcessRecord,
    b: &ProcessRecord,
    field: ProcessField,
    descending: bool,
) -> Ordering {
    let (va, vb) = (a.get(field), b.get(field));
    let by_value = match (va.is_available(), vb.is_available()) {
        (true, true) => {
            let ord = va.total_cmp(vb);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    };
    by_value.then_with(|| a.pid().cmp(&b.pid()))
}

fn project(record: &ProcessRecord, fields: Option<&[ProcessField]>) -> ProjectedRecord {
    let values = match fields {
        Some(fields) => fields
            .iter()
            .map(|field| (*field, record.get(*field).clone()))
            .collect(),
        None => record.iter().map(|(f, v)| (f, v.clone())).collect(),
    };
    ProjectedRecord::new(record.pid(), values)
}

fn format_best_effort(
    pid: u32,
    field: ProcessField,
    formatter: &FieldFormatter,
    raw: &FieldValue,
) -> Option<FieldValue> {
    match panic::catch_unwind(AssertUnwindSafe(|| formatter(raw))) {
        Ok(Ok(formatted)) => Some(formatted),
        Ok(Err(e)) => {
            debug!(pid, field = %field, error = %e, "formatter failed, keeping raw value");
            None
        }
        Err(_) => {
            debug!(pid, field = %field, "formatter panicked, keeping raw value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pid: u32, user: &str, cpu: Option<f64>) -> ProcessRecord {
        ProcessRecord::new(pid)
            .with(ProcessField::Pid, pid)
            .with(ProcessField::Name, format!("proc{}", pid))
            .with(ProcessField::Username, user)
            .with(ProcessField::CpuPercent, cpu)
    }

    fn table() -> Vec<ProcessRecord> {
        vec![
            record(30, "root", Some(5.0)),
            record(10, "alice", None),
            record(20, "alice", Some(5.0)),
            record(40, "bob", Some(50.0)),
            record(5, "root", None),
            record(15, "bob", Some(0.5)),
        ]
    }

    fn pids(rows: &[ProjectedRecord]) -> Vec<u32> {
        rows.iter().map(|r| r.pid()).collect()
    }

    #[test]
    fn test_descending_sort_puts_missing_last() {
        let rows = ProcessQuery::new()
            .sort_by(ProcessField::CpuPercent)
            .descending(true)
            .run(&table());
        assert_eq!(pids(&rows), vec![40, 20, 30, 15, 5, 10]);
    }

    #[test]
    fn test_ascending_sort_puts_missing_last() {
        let rows = ProcessQuery::new()
            .sort_by(ProcessField::CpuPercent)
            .descending(false)
            .run(&table());
        assert_eq!(pids(&rows), vec![15, 20, 30, 40, 5, 10]);
    }

    #[test]
    fn test_sort_is_stable_across_input_orders() {
        let query = ProcessQuery::new().sort_by(ProcessField::CpuPercent);
        let first = pids(&query.run(&table()));

        let mut shuffled = table();
        shuffled.reverse();
        shuffled.swap(0, 3);
        assert_eq!(pids(&query.run(&shuffled)), first);
        assert_eq!(pids(&query.run(&table())), first);
    }

    #[test]
    fn test_user_filter_and_limit() {
        let rows = ProcessQuery::new()
            .user("alice")
            .sort_by(ProcessField::Pid)
            .descending(false)
            .run(&table());
        assert_eq!(pids(&rows), vec![10, 20]);

        let rows = ProcessQuery::new()
            .sort_by(ProcessField::CpuPercent)
            .limit(2)
            .run(&table());
        assert_eq!(pids(&rows), vec![40, 20]);

        assert!(ProcessQuery::new().user("nobody").run(&table()).is_empty());
    }

    #[test]
    fn test_projection_keeps_requested_order() {
        let rows = ProcessQuery::new()
            .fields([ProcessField::CpuPercent, ProcessField::Pid, ProcessField::Nice])
            .run(&table()[..1]);
        assert_eq!(
            rows[0].fields(),
            vec![ProcessField::CpuPercent, ProcessField::Pid, ProcessField::Nice]
        );
        // never-sampled fields stay present as null
        assert_eq!(rows[0].get(ProcessField::Nice), Some(&FieldValue::Unavailable));
        assert_eq!(rows[0].get(ProcessField::Name), None);
    }

    #[test]
    fn test_formatter_applies_after_projection() {
        let rows = ProcessQuery::new()
            .fields([ProcessField::Pid, ProcessField::CpuPercent])
            .format(ProcessField::CpuPercent, |v| match v.as_f64() {
                Some(cpu) => Ok(FieldValue::Text(format!("{:.1}%", cpu))),
                None => Err(FormatError::new("cpu_percent", "not a number")),
            })
            .run(&table());

        let row40 = rows.iter().find(|r| r.pid() == 40).unwrap();
        assert_eq!(row40.get(ProcessField::CpuPercent), Some(&FieldValue::Text("50.0%".into())));
    }

    #[test]
    fn test_failing_formatter_keeps_raw_none() {
        let rows = ProcessQuery::new()
            .fields([ProcessField::CpuPercent])
            .format(ProcessField::CpuPercent, |v| match v.as_f64() {
                Some(cpu) => Ok(FieldValue::Text(format!("{:.1}%", cpu))),
                None => Err(FormatError::new("cpu_percent", "not a number")),
            })
            .run(&table());

        let row10 = rows.iter().find(|r| r.pid() == 10).unwrap();
        assert_eq!(row10.get(ProcessField::CpuPercent), Some(&FieldValue::Unavailable));
        assert_eq!(rows.len(), 6);
    }

    #[test]
    fn test_panicking_formatter_keeps_raw_value() {
        let rows = ProcessQuery::new()
            .fields([ProcessField::Name])
            .format(ProcessField::Name, |_| panic!("formatter bug"))
            .run(&table()[..1]);
        assert_eq!(rows[0].get(ProcessField::Name), Some(&FieldValue::Text("proc30".into())));
    }

    #[test]
    fn test_projected_record_serializes_in_order() {
        let rows = ProcessQuery::new()
            .fields([ProcessField::Username, ProcessField::Pid])
            .run(&table()[..1]);
        let json = serde_json::to_string(&rows).unwrap();
        assert_eq!(json, r#"[{"username":"root","pid":30}]"#);
    }
}
