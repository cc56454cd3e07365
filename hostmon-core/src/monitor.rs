use crate::error::{AccessorError, SourceResult};
use crate::metrics::*;
use crate::source::MetricsSource;
use procfs::net::{TcpNetEntry, UdpNetEntry};
use procfs::process::{FDTarget, Process};
use procfs::{ProcError, ProcResult};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::process::Command;
use sysinfo::{
    Components, CpuRefreshKind, Disks, MemoryRefreshKind, Networks, RefreshKind, System,
};
use tracing::trace;

const SECTOR_SIZE: u64 = 512;
/// `IFF_UP` in /sys/class/net/<nic>/flags.
const IFF_UP: u32 = 0x1;

/// Live host metrics from sysinfo, procfs and sysfs.
pub struct HostMonitor {
    system: System,
    networks: Networks,
    disks: Disks,
    components: Components,
    clock_ticks: f64,
}

impl HostMonitor {
    pub fn new() -> Self {
        let mut system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        // Baseline for the first cpu_percent() call
        system.refresh_cpu_usage();

        Self {
            system,
            networks: Networks::new_with_refreshed_list(),
            disks: Disks::new_with_refreshed_list(),
            components: Components::new_with_refreshed_list(),
            clock_ticks: procfs::ticks_per_second() as f64,
        }
    }

    fn proc_stat(&self) -> SourceResult<ProcStatSummary> {
        let content = read_file("/proc/stat")?;
        Ok(parse_proc_stat(&content, self.clock_ticks))
    }
}

impl Default for HostMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for HostMonitor {
    fn cpu_times(&mut self, percpu: bool) -> SourceResult<Vec<CpuTimes>> {
        let stat = self.proc_stat()?;
        if percpu {
            Ok(stat.per_cpu)
        } else {
            stat.total
                .map(|total| vec![total])
                .ok_or_else(|| AccessorError::Other("no cpu line in /proc/stat".to_string()))
        }
    }

    fn cpu_percent(&mut self) -> SourceResult<CpuUsage> {
        self.system.refresh_cpu_usage();
        Ok(CpuUsage {
            total: self.system.global_cpu_usage() as f64,
            per_core: self
                .system
                .cpus()
                .iter()
                .map(|cpu| cpu.cpu_usage() as f64)
                .collect(),
        })
    }

    fn cpu_freq(&mut self) -> SourceResult<Vec<CpuFreq>> {
        self.system.refresh_cpu_frequency();
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return Err(AccessorError::unsupported("cpu frequency"));
        }

        Ok(cpus
            .iter()
            .enumerate()
            .map(|(index, cpu)| {
                let base = format!("/sys/devices/system/cpu/cpu{}/cpufreq", index);
                CpuFreq {
                    current_mhz: cpu.frequency() as f64,
                    min_mhz: read_khz(&format!("{}/cpuinfo_min_freq", base)),
                    max_mhz: read_khz(&format!("{}/cpuinfo_max_freq", base)),
                }
            })
            .collect())
    }

    fn cpu_stats(&mut self) -> SourceResult<CpuStats> {
        Ok(self.proc_stat()?.stats)
    }

    fn logical_cpu_count(&mut self) -> SourceResult<usize> {
        Ok(self.system.cpus().len())
    }

    fn load_average(&mut self) -> SourceResult<LoadAverage> {
        if !Path::new("/proc/loadavg").exists() {
            return Err(AccessorError::unsupported("load average"));
        }
        let load = System::load_average();
        Ok(LoadAverage {
            one: load.one,
            five: load.five,
            fifteen: load.fifteen,
        })
    }

    fn virtual_memory(&mut self) -> SourceResult<VirtualMemory> {
        self.system.refresh_memory();
        Ok(VirtualMemory {
            total: self.system.total_memory(),
            available: self.system.available_memory(),
            used: self.system.used_memory(),
            free: self.system.free_memory(),
        })
    }

    fn swap_memory(&mut self) -> SourceResult<SwapMemory> {
        self.system.refresh_memory();
        Ok(SwapMemory {
            total: self.system.total_swap(),
            used: self.system.used_swap(),
            free: self.system.free_swap(),
        })
    }

    fn disk_partitions(&mut self) -> SourceResult<Vec<DiskPartition>> {
        self.disks.refresh_list();
        Ok(self
            .disks
            .iter()
            .map(|disk| DiskPartition {
                device: disk.name().to_string_lossy().to_string(),
                mountpoint: disk.mount_point().to_string_lossy().to_string(),
                fstype: disk.file_system().to_string_lossy().to_string(),
                removable: disk.is_removable(),
            })
            .collect())
    }

    fn disk_usage(&mut self) -> SourceResult<Vec<DiskUsage>> {
        self.disks.refresh();
        Ok(self
            .disks
            .iter()
            .map(|disk| {
                let total = disk.total_space();
                let free = disk.available_space();
                DiskUsage {
                    mountpoint: disk.mount_point().to_string_lossy().to_string(),
                    total,
                    used: total.saturating_sub(free),
                    free,
                }
            })
            .collect())
    }

    fn disk_io_counters(&mut self) -> SourceResult<Vec<DiskIoCounters>> {
        let content = read_file("/proc/diskstats")?;
        // Whole disks have a /sys/block entry; `/` in names shows up there as `!`
        Ok(parse_diskstats(&content, |device| {
            Path::new("/sys/block").join(device.replace('/', "!")).exists()
        }))
    }

    fn net_io_counters(&mut self) -> SourceResult<Vec<NetIoCounters>> {
        self.networks.refresh();
        let mut counters: Vec<NetIoCounters> = self
            .networks
            .iter()
            .map(|(name, data)| NetIoCounters {
                interface: name.to_string(),
                bytes_sent: data.total_transmitted(),
                bytes_recv: data.total_received(),
                packets_sent: data.total_packets_transmitted(),
                packets_recv: data.total_packets_received(),
                errin: data.total_errors_on_received(),
                errout: data.total_errors_on_transmitted(),
            })
            .collect();
        counters.sort_by(|a, b| a.interface.cmp(&b.interface));
        Ok(counters)
    }

    fn net_if_addrs(&mut self) -> SourceResult<Vec<NicAddress>> {
        self.networks.refresh_list();
        let mut addrs = Vec::new();
        for (name, data) in self.networks.iter() {
            addrs.push(NicAddress {
                interface: name.to_string(),
                family: AddressFamily::Mac,
                address: data.mac_address().to_string(),
            });
            for network in data.ip_networks() {
                let family = if network.addr.is_ipv4() {
                    AddressFamily::Ipv4
                } else {
                    AddressFamily::Ipv6
                };
                addrs.push(NicAddress {
                    interface: name.to_string(),
                    family,
                    address: network.addr.to_string(),
                });
            }
        }
        // Stable, so each NIC keeps its MAC first
        addrs.sort_by(|a, b| a.interface.cmp(&b.interface));
        Ok(addrs)
    }

    fn net_if_stats(&mut self) -> SourceResult<Vec<NicStats>> {
        let entries =
            fs::read_dir("/sys/class/net").map_err(|e| AccessorError::from_io("/sys/class/net", e))?;

        let mut stats: Vec<NicStats> = entries
            .flatten()
            .map(|entry| {
                let path = entry.path();
                let flags = read_trimmed(&path.join("flags"))
                    .and_then(|s| u32::from_str_radix(s.trim_start_matches("0x"), 16).ok());
                NicStats {
                    interface: entry.file_name().to_string_lossy().to_string(),
                    is_up: flags.map(|f| (f & IFF_UP) != 0).unwrap_or(false),
                    // Reads fail with EINVAL on links without a speed
                    speed_mbps: read_trimmed(&path.join("speed"))
                        .and_then(|s| s.parse::<i64>().ok())
                        .filter(|speed| *speed > 0)
                        .map(|speed| speed as u32),
                    mtu: read_trimmed(&path.join("mtu")).and_then(|s| s.parse().ok()),
                }
            })
            .collect();
        stats.sort_by(|a, b| a.interface.cmp(&b.interface));
        Ok(stats)
    }

    fn net_connections(&mut self) -> SourceResult<Vec<Connection>> {
        let mut connections = build_connections(
            procfs::net::tcp(),
            procfs::net::tcp6(),
            procfs::net::udp(),
            procfs::net::udp6(),
        )?;
        let owners = socket_owners();
        for connection in &mut connections {
            connection.pid = owners.get(&connection.inode).copied();
        }
        Ok(connections)
    }

    fn temperatures(&mut self) -> SourceResult<Vec<Temperature>> {
        self.components.refresh();
        Ok(self
            .components
            .iter()
            .filter(|c| c.temperature().is_finite())
            .map(|c| Temperature {
                label: c.label().to_string(),
                current: c.temperature() as f64,
                high: Some(c.max() as f64).filter(|t| t.is_finite() && *t > 0.0),
                critical: c.critical().map(|t| t as f64),
            })
            .collect())
    }

    fn fans(&mut self) -> SourceResult<Vec<Fan>> {
        let entries = fs::read_dir("/sys/class/hwmon")
            .map_err(|e| AccessorError::from_io("/sys/class/hwmon", e))?;

        let mut fans = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let chip = read_trimmed(&path.join("name")).unwrap_or_else(|| "hwmon".to_string());
            for index in 1..=16 {
                let Some(rpm) = read_trimmed(&path.join(format!("fan{}_input", index)))
                    .and_then(|s| s.parse::<u64>().ok())
                else {
                    continue;
                };
                let label = read_trimmed(&path.join(format!("fan{}_label", index)))
                    .unwrap_or_else(|| format!("{} fan{}", chip, index));
                fans.push(Fan { label, rpm });
            }
        }
        Ok(fans)
    }

    fn battery(&mut self) -> SourceResult<Option<Battery>> {
        let entries = fs::read_dir("/sys/class/power_supply")
            .map_err(|e| AccessorError::from_io("/sys/class/power_supply", e))?;

        let supplies: Vec<_> = entries.flatten().map(|e| e.path()).collect();
        let mains_online = supplies
            .iter()
            .filter(|p| read_trimmed(&p.join("type")).as_deref() == Some("Mains"))
            .map(|p| read_trimmed(&p.join("online")).as_deref() == Some("1"))
            .reduce(|a, b| a || b);

        let Some(bat) = supplies
            .iter()
            .find(|p| read_trimmed(&p.join("type")).as_deref() == Some("Battery"))
        else {
            return Ok(None);
        };

        let Some(percent) = read_trimmed(&bat.join("capacity")).and_then(|s| s.parse::<f64>().ok())
        else {
            return Ok(None);
        };
        let status = read_trimmed(&bat.join("status"));
        let plugged = mains_online.or_else(|| {
            status
                .as_deref()
                .map(|s| matches!(s, "Charging" | "Full" | "Not charging"))
        });

        let secs_left = if plugged == Some(true) {
            None
        } else {
            let read = |name: &str| read_trimmed(&bat.join(name)).and_then(|s| s.parse::<f64>().ok());
            let remaining = read("energy_now").zip(read("power_now"))
                .or_else(|| read("charge_now").zip(read("current_now")));
            remaining
                .filter(|(_, rate)| *rate > 0.0)
                .map(|(left, rate)| (left / rate * 3600.0) as u64)
        };

        Ok(Some(Battery {
            percent,
            plugged,
            secs_left,
        }))
    }

    fn boot_time(&mut self) -> SourceResult<u64> {
        Ok(System::boot_time())
    }

    fn uptime(&mut self) -> SourceResult<u64> {
        Ok(System::uptime())
    }

    fn users(&mut self) -> SourceResult<Vec<LoggedInUser>> {
        let output = Command::new("who")
            .output()
            .map_err(|e| AccessorError::from_io("who", e))?;
        if !output.status.success() {
            return Err(AccessorError::unsupported("who"));
        }
        Ok(parse_who(&String::from_utf8_lossy(&output.stdout)))
    }

    fn process_details(&mut self, pid: u32) -> SourceResult<ProcessDetails> {
        let process = Process::new(pid as i32)?;
        let mut details = ProcessDetails {
            pid,
            ..Default::default()
        };

        details.name = soft(pid, "stat", process.stat().map(|s| s.comm));
        if let Some(status) = soft(pid, "status", process.status()) {
            details.rss_bytes = status.vmrss.map(|kb| kb * 1024);
            details.vms_bytes = status.vmsize.map(|kb| kb * 1024);
        }
        if let Some(io) = soft(pid, "io", process.io()) {
            details.read_bytes = Some(io.read_bytes);
            details.write_bytes = Some(io.write_bytes);
        }
        let mut sockets = HashSet::new();
        details.open_files = soft(pid, "fd", process.fd()).map(|fds| {
            let mut files = Vec::new();
            for fd in fds.flatten() {
                match fd.target {
                    FDTarget::Path(path) => files.push(path.display().to_string()),
                    FDTarget::Socket(inode) => {
                        sockets.insert(inode);
                    }
                    _ => {}
                }
            }
            files
        });
        // Socket ownership comes from the descriptors, so no fds means no connections
        if details.open_files.is_some() {
            let tables = build_connections(process.tcp(), process.tcp6(), process.udp(), process.udp6());
            details.connections = soft(pid, "net", tables).map(|connections| {
                connections
                    .into_iter()
                    .filter(|c| sockets.contains(&c.inode))
                    .map(|c| Connection { pid: Some(pid), ..c })
                    .collect()
            });
        }
        details.threads = soft(pid, "task", process.tasks())
            .map(|tasks| tasks.flatten().map(|task| task.tid as u32).collect());

        Ok(details)
    }
}

/// A process attribute we could not read becomes `None`.
fn soft<T>(pid: u32, what: &str, result: ProcResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            trace!(pid, what, error = %e, "process attribute unavailable");
            None
        }
    }
}

fn read_file(path: &str) -> SourceResult<String> {
    fs::read_to_string(path).map_err(|e| AccessorError::from_io(path, e))
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn read_khz(path: &str) -> Option<f64> {
    read_trimmed(Path::new(path))
        .and_then(|s| s.parse::<f64>().ok())
        .map(|khz| khz / 1000.0)
}

#[derive(Debug, Default)]
struct ProcStatSummary {
    total: Option<CpuTimes>,
    per_cpu: Vec<CpuTimes>,
    stats: CpuStats,
}

fn parse_proc_stat(content: &str, clock_ticks: f64) -> ProcStatSummary {
    let mut summary = ProcStatSummary::default();

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let Some(key) = parts.next() else { continue };
        let first_number = || line.split_whitespace().nth(1).and_then(|v| v.parse().ok()).unwrap_or(0);

        match key {
            "cpu" => summary.total = Some(cpu_times_from(parts, clock_ticks)),
            k if k.starts_with("cpu") => summary.per_cpu.push(cpu_times_from(parts, clock_ticks)),
            "ctxt" => summary.stats.ctx_switches = first_number(),
            "intr" => summary.stats.interrupts = first_number(),
            "softirq" => summary.stats.soft_interrupts = first_number(),
            _ => {}
        }
    }

    summary
}

fn cpu_times_from<'a, I: Iterator<Item = &'a str>>(fields: I, clock_ticks: f64) -> CpuTimes {
    // Older kernels report fewer columns; the rest read as zero
    let mut secs = fields.map(|v| v.parse::<u64>().unwrap_or(0) as f64 / clock_ticks);
    let mut next = || secs.next().unwrap_or(0.0);

    CpuTimes {
        user: next(),
        nice: next(),
        system: next(),
        idle: next(),
        iowait: next(),
        irq: next(),
        softirq: next(),
        steal: next(),
        guest: next(),
        guest_nice: next(),
    }
}

fn parse_diskstats<F: Fn(&str) -> bool>(content: &str, is_whole_disk: F) -> Vec<DiskIoCounters> {
    let mut counters = Vec::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue;
        }
        let device = parts[2];
        // Skip loop and ram devices
        if device.starts_with("loop") || device.starts_with("ram") {
            continue;
        }

        let field = |i: usize| parts[i].parse::<u64>().unwrap_or(0);
        counters.push(DiskIoCounters {
            device: device.to_string(),
            whole_disk: is_whole_disk(device),
            read_count: field(3),
            read_bytes: field(5) * SECTOR_SIZE,
            read_time_ms: field(6),
            write_count: field(7),
            write_bytes: field(9) * SECTOR_SIZE,
            write_time_ms: field(10),
            busy_time_ms: field(12),
        });
    }

    counters
}

fn parse_who(output: &str) -> Vec<LoggedInUser> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?.to_string();
            let terminal = parts.next().map(str::to_string);
            let host = line
                .rfind('(')
                .zip(line.rfind(')'))
                .filter(|(open, close)| open < close)
                .map(|(open, close)| line[open + 1..close].to_string())
                .filter(|h| !h.is_empty());
            Some(LoggedInUser {
                name,
                terminal,
                host,
            })
        })
        .collect()
}

/// Every table of one network namespace. An IPv6 table is missing when the
/// kernel runs without IPv6.
fn build_connections(
    tcp: ProcResult<Vec<TcpNetEntry>>,
    tcp6: ProcResult<Vec<TcpNetEntry>>,
    udp: ProcResult<Vec<UdpNetEntry>>,
    udp6: ProcResult<Vec<UdpNetEntry>>,
) -> ProcResult<Vec<Connection>> {
    let mut connections = Vec::new();
    for entry in tcp?.into_iter().chain(missing_is_empty(tcp6)?) {
        connections.push(connection(
            SocketKind::Tcp,
            entry.local_address,
            entry.remote_address,
            Some(tcp_status(&format!("{:?}", entry.state))),
            entry.inode,
        ));
    }
    for entry in udp?.into_iter().chain(missing_is_empty(udp6)?) {
        connections.push(connection(
            SocketKind::Udp,
            entry.local_address,
            entry.remote_address,
            None,
            entry.inode,
        ));
    }
    Ok(connections)
}

fn missing_is_empty<T>(result: ProcResult<Vec<T>>) -> ProcResult<Vec<T>> {
    match result {
        Err(ProcError::NotFound(_)) => Ok(Vec::new()),
        other => other,
    }
}

fn connection(
    kind: SocketKind,
    local: SocketAddr,
    remote: SocketAddr,
    status: Option<String>,
    inode: u64,
) -> Connection {
    let family = if local.is_ipv4() {
        AddressFamily::Ipv4
    } else {
        AddressFamily::Ipv6
    };
    let connected = !(remote.ip().is_unspecified() && remote.port() == 0);
    Connection {
        kind,
        family,
        local_address: local,
        remote_address: connected.then_some(remote),
        status,
        inode,
        pid: None,
    }
}

/// `FinWait1` -> `FIN_WAIT1`, matching the kernel's state names.
fn tcp_status(variant: &str) -> String {
    let mut out = String::with_capacity(variant.len() + 4);
    for (i, c) in variant.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            out.push('_');
        }
        out.push(c.to_ascii_uppercase());
    }
    out
}

/// Socket inode to pid, over every process whose descriptors we may read.
fn socket_owners() -> HashMap<u64, u32> {
    let mut owners = HashMap::new();
    let Ok(processes) = procfs::process::all_processes() else {
        return owners;
    };
    for process in processes.flatten() {
        let Ok(fds) = process.fd() else { continue };
        for fd in fds.flatten() {
            if let FDTarget::Socket(inode) = fd.target {
                owners.insert(inode, process.pid as u32);
            }
        }
    }
    owners
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proc_stat() {
        let content = "\
cpu  1000 20 300 4000 50 6 7 8 0 0
cpu0 500 10 150 2000 25 3 3 4 0 0
cpu1 500 10 150 2000 25 3 4 4 0 0
intr 123456 1 2 3
ctxt 98765
btime 1700000000
softirq 4321 1 2
";
        let summary = parse_proc_stat(content, 100.0);
        let total = summary.total.unwrap();
        assert_eq!(total.user, 10.0);
        assert_eq!(total.idle, 40.0);
        assert_eq!(total.steal, 0.08);
        assert_eq!(summary.per_cpu.len(), 2);
        assert_eq!(summary.per_cpu[1].softirq, 0.04);
        assert_eq!(summary.stats.ctx_switches, 98765);
        assert_eq!(summary.stats.interrupts, 123456);
        assert_eq!(summary.stats.soft_interrupts, 4321);
        assert_eq!(summary.stats.syscalls, 0);
    }

    #[test]
    fn test_parse_proc_stat_short_cpu_line() {
        // Old kernels stop after iowait
        let summary = parse_proc_stat("cpu 100 0 100 800 5\n", 100.0);
        let total = summary.total.unwrap();
        assert_eq!(total.iowait, 0.05);
        assert_eq!(total.guest_nice, 0.0);
    }

    #[test]
    fn test_parse_diskstats() {
        let content = "\
   7       0 loop0 10 0 20 0 0 0 0 0 0 0 0 0 0
   8       0 sda 1000 10 8000 400 2000 20 16000 900 0 1200 1300 0 0 0 0
   8       1 sda1 900 10 7000 350 1900 20 15000 850 0 1100 1200 0 0 0 0
   1       0 ram0 1 0 1 0 0 0 0 0 0 0 0
";
        let counters = parse_diskstats(content, |device| device == "sda");
        assert_eq!(counters.len(), 2);

        let sda = &counters[0];
        assert_eq!(sda.device, "sda");
        assert!(sda.whole_disk);
        assert!(!counters[1].whole_disk);
        assert_eq!(sda.read_count, 1000);
        assert_eq!(sda.read_bytes, 8000 * 512);
        assert_eq!(sda.write_bytes, 16000 * 512);
        assert_eq!(sda.read_time_ms, 400);
        assert_eq!(sda.write_time_ms, 900);
        assert_eq!(sda.busy_time_ms, 1200);
    }

    #[test]
    fn test_parse_who() {
        let output = "\
alice    pts/0        2024-05-01 09:12 (10.0.0.7)
bob      tty2         2024-05-01 08:00
";
        let users = parse_who(output);
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].name, "alice");
        assert_eq!(users[0].terminal.as_deref(), Some("pts/0"));
        assert_eq!(users[0].host.as_deref(), Some("10.0.0.7"));
        assert_eq!(users[1].host, None);
    }

    #[test]
    fn test_process_details_for_self() {
        let mut monitor = HostMonitor::new();
        let details = monitor.process_details(std::process::id()).unwrap();
        assert!(details.rss_bytes.unwrap_or(0) > 0);
        assert!(!details.threads.unwrap_or_default().is_empty());
    }

    #[test]
    fn test_tcp_status_names() {
        assert_eq!(tcp_status("Established"), "ESTABLISHED");
        assert_eq!(tcp_status("FinWait1"), "FIN_WAIT1");
        assert_eq!(tcp_status("NewSynRecv"), "NEW_SYN_RECV");
    }

    #[test]
    fn test_unconnected_peer_is_none() {
        let local: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let listening = connection(SocketKind::Tcp, local, "0.0.0.0:0".parse().unwrap(), None, 7);
        assert_eq!(listening.family, AddressFamily::Ipv4);
        assert_eq!(listening.remote_address, None);

        let peer: SocketAddr = "[::1]:5432".parse().unwrap();
        let connected = connection(SocketKind::Tcp, "[::1]:40000".parse().unwrap(), peer, None, 8);
        assert_eq!(connected.family, AddressFamily::Ipv6);
        assert_eq!(connected.remote_address, Some(peer));
    }

    #[test]
    fn test_own_listener_shows_up_in_connections() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut monitor = HostMonitor::new();

        let all = monitor.net_connections().unwrap();
        let entry = all
            .iter()
            .find(|c| c.kind == SocketKind::Tcp && c.local_address == addr)
            .expect("listener in connection table");
        assert_eq!(entry.status.as_deref(), Some("LISTEN"));
        assert_eq!(entry.pid, Some(std::process::id()));

        let details = monitor.process_details(std::process::id()).unwrap();
        let own = details.connections.unwrap();
        assert!(own.iter().any(|c| c.local_address == addr && c.pid == Some(std::process::id())));
    }

    #[test]
    fn test_missing_process_is_an_error() {
        let mut monitor = HostMonitor::new();
        assert!(monitor.process_details(u32::MAX / 2).is_err());
    }
}
