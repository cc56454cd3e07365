use crate::error::SourceResult;
use crate::metrics::*;
use crate::monitor::HostMonitor;
use crate::rate::{RateTracker, AGGREGATE};
use crate::severity::{SeverityConfig, SeverityLevel};
use crate::source::MetricsSource;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

/// One domain of a host snapshot.
///
/// An accessor failure turns into `supported: false` with a null payload so
/// the other domains still come through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Domain<T> {
    pub supported: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl<T> Domain<T> {
    pub fn supported(data: T) -> Self {
        Self {
            supported: true,
            data: Some(data),
            reason: None,
        }
    }

    pub fn unsupported<S: Into<String>>(reason: S) -> Self {
        Self {
            supported: false,
            data: None,
            reason: Some(reason.into()),
        }
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Domain<U> {
        Domain {
            supported: self.supported,
            data: self.data.map(f),
            reason: self.reason,
        }
    }

    fn from_result(domain: &str, result: SourceResult<T>) -> Self {
        match result {
            Ok(data) => Self::supported(data),
            Err(e) => {
                debug!(domain, error = %e, "metrics domain unavailable");
                Self::unsupported(e.to_string())
            }
        }
    }
}

/// Values for the 1, 5 and 15 minute load windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadTriple<T> {
    #[serde(rename = "1m")]
    pub one: T,
    #[serde(rename = "5m")]
    pub five: T,
    #[serde(rename = "15m")]
    pub fifteen: T,
}

impl<T: Copy> LoadTriple<T> {
    pub fn map<U, F: Fn(T) -> U>(&self, f: F) -> LoadTriple<U> {
        LoadTriple {
            one: f(self.one),
            five: f(self.five),
            fifteen: f(self.fifteen),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuTimesSnapshot {
    pub timestamp: DateTime<Utc>,
    pub percpu: bool,
    pub logical_count: usize,
    pub times: Vec<CpuTimes>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuPercentSnapshot {
    pub total: f64,
    pub total_severity: SeverityLevel,
    pub per_core: Vec<f64>,
    pub per_core_severity: Vec<SeverityLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuFreqSnapshot {
    pub per_core: Vec<CpuFreq>,
    pub avg_current_mhz: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSnapshot {
    pub logical_count: usize,
    pub raw: LoadTriple<f64>,
    pub per_core: LoadTriple<f64>,
    pub util_percent_est: LoadTriple<f64>,
    pub severity: LoadTriple<SeverityLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualMemoryView {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
    pub severity: SeverityLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapView {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
    pub severity: SeverityLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySnapshot {
    #[serde(rename = "virtual")]
    pub virtual_memory: Domain<VirtualMemoryView>,
    pub swap: Domain<SwapView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskUsageView {
    pub mountpoint: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
    pub severity: SeverityLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskIoView {
    pub read_count: u64,
    pub write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_time_ms: u64,
    pub write_time_ms: u64,
    pub busy_time_ms: u64,
    /// `None` until the device has been seen twice.
    pub read_bytes_per_sec: Option<f64>,
    pub write_bytes_per_sec: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetIoView {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errin: u64,
    pub errout: u64,
    pub recv_bytes_per_sec: Option<f64>,
    pub sent_bytes_per_sec: Option<f64>,
}

/// Per-device views keyed by name, with the host total under `aggregate`.
pub type IoTable<V> = BTreeMap<String, V>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BootInfo {
    pub boot_time: u64,
    pub boot_time_iso: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostSnapshot {
    pub taken_at: DateTime<Utc>,
    pub cpu_times: Domain<CpuTimesSnapshot>,
    pub cpu_percent: Domain<CpuPercentSnapshot>,
    pub cpu_freq: Domain<CpuFreqSnapshot>,
    pub cpu_stats: Domain<CpuStats>,
    pub load_average: Domain<LoadSnapshot>,
    pub memory: MemorySnapshot,
    pub disk_partitions: Domain<Vec<DiskPartition>>,
    pub disk_usage: Domain<Vec<DiskUsageView>>,
    pub disk_io: Domain<IoTable<DiskIoView>>,
    pub net_io: Domain<IoTable<NetIoView>>,
    pub net_if_addrs: Domain<Vec<NicAddress>>,
    pub net_if_stats: Domain<Vec<NicStats>>,
    pub connections: Domain<Vec<Connection>>,
    pub temperatures: Domain<Vec<Temperature>>,
    pub fans: Domain<Vec<Fan>>,
    pub battery: Domain<Battery>,
    pub boot: Domain<BootInfo>,
    pub users: Domain<Vec<String>>,
}

/// Turns raw accessor output into semantic host snapshots.
///
/// Owns the rate baselines, so rate-bearing calls take `&mut self`.
pub struct SnapshotNormalizer<S = HostMonitor> {
    source: S,
    severity: SeverityConfig,
    disk_rates: RateTracker,
    net_rates: RateTracker,
}

impl SnapshotNormalizer<HostMonitor> {
    pub fn for_host(severity: SeverityConfig) -> Self {
        Self::new(HostMonitor::new(), severity)
    }
}

impl<S: MetricsSource> SnapshotNormalizer<S> {
    pub fn new(source: S, severity: SeverityConfig) -> Self {
        Self {
            source,
            severity,
            disk_rates: RateTracker::new(),
            net_rates: RateTracker::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn severity(&self) -> &SeverityConfig {
        &self.severity
    }

    pub fn cpu_times(&mut self, percpu: bool) -> Domain<CpuTimesSnapshot> {
        let logical_count = self.source.logical_cpu_count().unwrap_or(0);
        let times = self.source.cpu_times(percpu);
        Domain::from_result("cpu_times", times).map(|times| CpuTimesSnapshot {
            timestamp: Utc::now(),
            percpu,
            logical_count,
            times,
        })
    }

    pub fn cpu_percent(&mut self) -> Domain<CpuPercentSnapshot> {
        let usage = self.source.cpu_percent();
        let severity = &self.severity;
        Domain::from_result("cpu_percent", usage).map(|usage| CpuPercentSnapshot {
            total: usage.total,
            total_severity: severity.severity_for(SeverityConfig::CPU, usage.total),
            per_core_severity: usage
                .per_core
                .iter()
                .map(|v| severity.severity_for(SeverityConfig::CPU, *v))
                .collect(),
            per_core: usage.per_core,
        })
    }

    pub fn cpu_freq(&mut self) -> Domain<CpuFreqSnapshot> {
        let freq = self.source.cpu_freq();
        Domain::from_result("cpu_freq", freq).map(|per_core| {
            let avg_current_mhz = if per_core.is_empty() {
                None
            } else {
                Some(per_core.iter().map(|f| f.current_mhz).sum::<f64>() / per_core.len() as f64)
            };
            CpuFreqSnapshot {
                per_core,
                avg_current_mhz,
            }
        })
    }

    pub fn cpu_stats(&mut self) -> Domain<CpuStats> {
        let stats = self.source.cpu_stats();
        Domain::from_result("cpu_stats", stats)
    }

    /// Load average scaled by `logical_count`, which is floored at one.
    pub fn load_average(&mut self, logical_count: usize) -> Domain<LoadSnapshot> {
        let load = self.source.load_average();
        let severity = &self.severity;
        let cores = logical_count.max(1);

        Domain::from_result("load_average", load).map(|load| {
            let raw = LoadTriple {
                one: load.one,
                five: load.five,
                fifteen: load.fifteen,
            };
            let per_core = raw.map(|v| v / cores as f64);
            let util_percent_est = raw.map(|v| (v * 100.0 / cores as f64).clamp(0.0, 100.0));
            LoadSnapshot {
                logical_count: cores,
                raw,
                per_core,
                util_percent_est,
                severity: util_percent_est.map(|v| severity.severity_for(SeverityConfig::CPU, v)),
            }
        })
    }

    pub fn memory(&mut self) -> MemorySnapshot {
        let vm = self.source.virtual_memory();
        let swap = self.source.swap_memory();
        let severity = &self.severity;

        MemorySnapshot {
            virtual_memory: Domain::from_result("virtual_memory", vm).map(|vm| {
                let percent = percent_of(vm.total.saturating_sub(vm.available), vm.total);
                VirtualMemoryView {
                    total: vm.total,
                    available: vm.available,
                    used: vm.used,
                    free: vm.free,
                    percent,
                    severity: severity.severity_for(SeverityConfig::MEMORY, percent),
                }
            }),
            swap: Domain::from_result("swap_memory", swap).map(|swap| {
                let percent = percent_of(swap.used, swap.total);
                SwapView {
                    total: swap.total,
                    used: swap.used,
                    free: swap.free,
                    percent,
                    severity: severity.severity_for(SeverityConfig::MEMORY, percent),
                }
            }),
        }
    }

    pub fn disk_partitions(&mut self) -> Domain<Vec<DiskPartition>> {
        let partitions = self.source.disk_partitions();
        Domain::from_result("disk_partitions", partitions)
    }

    pub fn disk_usage(&mut self) -> Domain<Vec<DiskUsageView>> {
        let usage = self.source.disk_usage();
        let severity = &self.severity;
        Domain::from_result("disk_usage", usage).map(|mounts| {
            mounts
                .into_iter()
                .map(|usage| {
                    let percent = percent_of(usage.used, usage.used + usage.free);
                    DiskUsageView {
                        mountpoint: usage.mountpoint,
                        total: usage.total,
                        used: usage.used,
                        free: usage.free,
                        percent,
                        severity: severity.severity_for(SeverityConfig::DISK, percent),
                    }
                })
                .collect()
        })
    }

    /// Disk counters with read/write byte rates since the previous call.
    pub fn disk_io(&mut self, now: Instant) -> Domain<IoTable<DiskIoView>> {
        let counters = self.source.disk_io_counters();
        let rates = &mut self.disk_rates;

        Domain::from_result("disk_io", counters).map(|disks| {
            let mut total = DiskIoCounters {
                device: AGGREGATE.to_string(),
                ..Default::default()
            };
            // Partitions repeat their parent's I/O
            for disk in disks.iter().filter(|d| d.whole_disk) {
                total.read_count += disk.read_count;
                total.write_count += disk.write_count;
                total.read_bytes += disk.read_bytes;
                total.write_bytes += disk.write_bytes;
                total.read_time_ms += disk.read_time_ms;
                total.write_time_ms += disk.write_time_ms;
                total.busy_time_ms += disk.busy_time_ms;
            }

            rates.retain_only(disks.iter().map(|d| d.device.as_str()).chain([AGGREGATE]));

            let mut table = IoTable::new();
            for disk in disks.iter().chain(std::iter::once(&total)) {
                let rate = rates.rate(&disk.device, disk.read_bytes, disk.write_bytes, now);
                table.insert(
                    disk.device.clone(),
                    DiskIoView {
                        read_count: disk.read_count,
                        write_count: disk.write_count,
                        read_bytes: disk.read_bytes,
                        write_bytes: disk.write_bytes,
                        read_time_ms: disk.read_time_ms,
                        write_time_ms: disk.write_time_ms,
                        busy_time_ms: disk.busy_time_ms,
                        read_bytes_per_sec: rate.map(|r| r.recv_per_sec),
                        write_bytes_per_sec: rate.map(|r| r.sent_per_sec),
                    },
                );
            }
            table
        })
    }

    /// NIC counters with receive/send byte rates since the previous call.
    pub fn net_io(&mut self, now: Instant) -> Domain<IoTable<NetIoView>> {
        let counters = self.source.net_io_counters();
        let rates = &mut self.net_rates;

        Domain::from_result("net_io", counters).map(|nics| {
            let mut total = NetIoCounters {
                interface: AGGREGATE.to_string(),
                ..Default::default()
            };
            for nic in &nics {
                total.bytes_sent += nic.bytes_sent;
                total.bytes_recv += nic.bytes_recv;
                total.packets_sent += nic.packets_sent;
                total.packets_recv += nic.packets_recv;
                total.errin += nic.errin;
                total.errout += nic.errout;
            }

            rates.retain_only(nics.iter().map(|n| n.interface.as_str()).chain([AGGREGATE]));

            let mut table = IoTable::new();
            for nic in nics.iter().chain(std::iter::once(&total)) {
                let rate = rates.rate(&nic.interface, nic.bytes_recv, nic.bytes_sent, now);
                table.insert(
                    nic.interface.clone(),
                    NetIoView {
                        bytes_sent: nic.bytes_sent,
                        bytes_recv: nic.bytes_recv,
                        packets_sent: nic.packets_sent,
                        packets_recv: nic.packets_recv,
                        errin: nic.errin,
                        errout: nic.errout,
                        recv_bytes_per_sec: rate.map(|r| r.recv_per_sec),
                        sent_bytes_per_sec: rate.map(|r| r.sent_per_sec),
                    },
                );
            }
            table
        })
    }

    pub fn net_if_addrs(&mut self) -> Domain<Vec<NicAddress>> {
        let addrs = self.source.net_if_addrs();
        Domain::from_result("net_if_addrs", addrs)
    }

    pub fn net_if_stats(&mut self) -> Domain<Vec<NicStats>> {
        let stats = self.source.net_if_stats();
        Domain::from_result("net_if_stats", stats)
    }

    /// Inet sockets, ordered by kind, local address and inode.
    pub fn net_connections(&mut self) -> Domain<Vec<Connection>> {
        let connections = self.source.net_connections();
        Domain::from_result("net_connections", connections).map(|mut connections| {
            connections.sort_by(|a, b| {
                (a.kind as u8, a.local_address, a.inode).cmp(&(b.kind as u8, b.local_address, b.inode))
            });
            connections
        })
    }

    pub fn sensors_temperatures(&mut self) -> Domain<Vec<Temperature>> {
        let temps = self.source.temperatures();
        Domain::from_result("temperatures", temps)
    }

    pub fn sensors_fans(&mut self) -> Domain<Vec<Fan>> {
        let fans = self.source.fans();
        Domain::from_result("fans", fans)
    }

    pub fn sensors_battery(&mut self) -> Domain<Battery> {
        match self.source.battery() {
            Ok(Some(battery)) => Domain::supported(battery),
            Ok(None) => Domain::unsupported("no battery present"),
            Err(e) => Domain::from_result("battery", Err(e)),
        }
    }

    pub fn boot_info(&mut self) -> Domain<BootInfo> {
        let boot = self.source.boot_time();
        let uptime = self.source.uptime().unwrap_or(0);
        Domain::from_result("boot_time", boot).map(|boot_time| BootInfo {
            boot_time,
            boot_time_iso: DateTime::<Utc>::from_timestamp(boot_time as i64, 0)
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default(),
            uptime_secs: uptime,
        })
    }

    /// Distinct names of logged-in users, in session order.
    pub fn logged_in_users(&mut self) -> Domain<Vec<String>> {
        let users = self.source.users();
        Domain::from_result("users", users).map(|sessions| {
            let mut names: Vec<String> = Vec::new();
            for session in sessions {
                if !names.contains(&session.name) {
                    names.push(session.name);
                }
            }
            names
        })
    }

    pub fn process_details(&mut self, pid: u32) -> Domain<ProcessDetails> {
        let details = self.source.process_details(pid);
        Domain::from_result("process_details", details)
    }

    /// Every host domain in one snapshot.
    pub fn collect(&mut self, now: Instant) -> HostSnapshot {
        let logical_count = self.source.logical_cpu_count().unwrap_or(1);

        HostSnapshot {
            taken_at: Utc::now(),
            cpu_times: self.cpu_times(false),
            cpu_percent: self.cpu_percent(),
            cpu_freq: self.cpu_freq(),
            cpu_stats: self.cpu_stats(),
            load_average: self.load_average(logical_count),
            memory: self.memory(),
            disk_partitions: self.disk_partitions(),
            disk_usage: self.disk_usage(),
            disk_io: self.disk_io(now),
            net_io: self.net_io(now),
            net_if_addrs: self.net_if_addrs(),
            net_if_stats: self.net_if_stats(),
            connections: self.net_connections(),
            temperatures: self.sensors_temperatures(),
            fans: self.sensors_fans(),
            battery: self.sensors_battery(),
            boot: self.boot_info(),
            users: self.logged_in_users(),
        }
    }
}

fn percent_of(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}
