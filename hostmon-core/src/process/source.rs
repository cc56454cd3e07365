use super::record::{FieldValue, ProcessField, ProcessRecord, ProcessStatus};
use crate::error::{AccessorError, SourceResult};
use std::collections::HashSet;
use std::fs;
use sysinfo::{
    CpuRefreshKind, MemoryRefreshKind, Pid, Process, ProcessRefreshKind, RefreshKind, System,
    Users,
};
use tracing::trace;

/// Enumerates every visible process with a fixed attribute set.
///
/// A failure to read one attribute of one process must come back as
/// [`FieldValue::Unavailable`] in that record; an `Err` is reserved for the
/// case where the process table itself cannot be read.
pub trait ProcessSource: Send {
    fn enumerate(&mut self, fields: &[ProcessField]) -> SourceResult<Vec<ProcessRecord>>;
}

/// Process table backed by `sysinfo`, with `/proc` for what sysinfo lacks.
///
/// The `System` is kept between calls so CPU percentages are computed over
/// the interval between two enumerations.
pub struct SysinfoProcessSource {
    system: System,
    users: Users,
}

impl SysinfoProcessSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            users: Users::new_with_refreshed_list(),
        }
    }

    fn refresh(&mut self) {
        self.system.refresh_specifics(
            RefreshKind::new()
                .with_processes(ProcessRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything())
                .with_cpu(CpuRefreshKind::everything()),
        );
    }
}

impl Default for SysinfoProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for SysinfoProcessSource {
    fn enumerate(&mut self, fields: &[ProcessField]) -> SourceResult<Vec<ProcessRecord>> {
        self.refresh();
        if fields.contains(&ProcessField::Username) {
            self.users.refresh_list();
        }

        // sysinfo also reports threads; only PIDs listed in /proc are processes
        let real_pids = list_proc_pids()?;
        let total_memory = self.system.total_memory();
        let users = &self.users;

        let mut records: Vec<ProcessRecord> = self
            .system
            .processes()
            .iter()
            .filter(|(pid, _)| real_pids.contains(&pid.as_u32()))
            .map(|(pid, process)| record_for(users, *pid, process, fields, total_memory))
            .collect();
        records.sort_by_key(|record| record.pid());

        trace!(count = records.len(), "enumerated processes");
        Ok(records)
    }
}

fn record_for(
    users: &Users,
    pid: Pid,
    process: &Process,
    fields: &[ProcessField],
    total_memory: u64,
) -> ProcessRecord {
    let pid_u32 = pid.as_u32();
    let mut record = ProcessRecord::new(pid_u32);
    // Only touch /proc/<pid>/stat when a field needs it
    let mut proc_stat: Option<Option<ProcStat>> = None;

    for field in fields {
        let value: FieldValue = match field {
            ProcessField::Pid => pid_u32.into(),
            ProcessField::Name => process.name().to_string_lossy().to_string().into(),
            ProcessField::Username => process
                .user_id()
                .and_then(|uid| users.get_user_by_id(uid))
                .map(|user| user.name().to_string())
                .into(),
            ProcessField::CpuPercent => process.cpu_usage().into(),
            ProcessField::MemoryPercent => {
                if total_memory == 0 {
                    FieldValue::Unavailable
                } else {
                    (process.memory() as f64 / total_memory as f64 * 100.0).into()
                }
            }
            ProcessField::MemoryRss => process.memory().into(),
            ProcessField::MemoryVms => process.virtual_memory().into(),
            ProcessField::Ppid => process.parent().map(|p| p.as_u32()).into(),
            ProcessField::Status => convert_process_status(process.status()).as_str().into(),
            ProcessField::Nice => stat_for(pid_u32, &mut proc_stat).map(|s| s.nice).into(),
            ProcessField::NumThreads => stat_for(pid_u32, &mut proc_stat)
                .map(|s| s.num_threads)
                .into(),
            ProcessField::CreateTime => process.start_time().into(),
            ProcessField::Cmdline => {
                let cmd: Vec<String> = process
                    .cmd()
                    .iter()
                    .map(|s| s.to_string_lossy().to_string())
                    .collect();
                // Kernel threads and processes we may not inspect have no cmdline
                if cmd.is_empty() {
                    FieldValue::Unavailable
                } else {
                    cmd.into()
                }
            }
            ProcessField::Exe => process.exe().map(|p| p.display().to_string()).into(),
            ProcessField::DiskReadBytes => process.disk_usage().total_read_bytes.into(),
            ProcessField::DiskWriteBytes => process.disk_usage().total_written_bytes.into(),
        };
        record.set(*field, value);
    }

    record
}

fn list_proc_pids() -> SourceResult<HashSet<u32>> {
    let entries = fs::read_dir("/proc").map_err(|e| AccessorError::from_io("/proc", e))?;
    Ok(entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter_map(|name| name.parse::<u32>().ok())
        .collect())
}

#[derive(Debug, Clone, Copy)]
struct ProcStat {
    nice: i64,
    num_threads: i64,
}

fn stat_for(pid: u32, cache: &mut Option<Option<ProcStat>>) -> Option<ProcStat> {
    *cache.get_or_insert_with(|| {
        match procfs::process::Process::new(pid as i32).and_then(|p| p.stat()) {
            Ok(stat) => Some(ProcStat {
                nice: stat.nice,
                num_threads: stat.num_threads,
            }),
            Err(e) => {
                // Vanished or not ours to read
                trace!(pid, error = %e, "process stat unavailable");
                None
            }
        }
    })
}

pub(crate) fn convert_process_status(status: sysinfo::ProcessStatus) -> ProcessStatus {
    match status {
        sysinfo::ProcessStatus::Run => ProcessStatus::Running,
        sysinfo::ProcessStatus::Sleep => ProcessStatus::Sleeping,
        sysinfo::ProcessStatus::Idle => ProcessStatus::Idle,
        sysinfo::ProcessStatus::Stop => ProcessStatus::Stopped,
        sysinfo::ProcessStatus::Zombie => ProcessStatus::Zombie,
        sysinfo::ProcessStatus::Dead => ProcessStatus::Dead,
        _ => ProcessStatus::Unknown,
    }
}
