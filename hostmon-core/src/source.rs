use crate::error::SourceResult;
use crate::metrics::*;

/// Raw host counters.
///
/// Every call may fail with [`AccessorError::Unsupported`] or
/// [`AccessorError::PermissionDenied`]; callers treat both as a soft,
/// per-domain failure.
///
/// [`AccessorError::Unsupported`]: crate::error::AccessorError::Unsupported
/// [`AccessorError::PermissionDenied`]: crate::error::AccessorError::PermissionDenied
pub trait MetricsSource: Send {
    /// Host-wide totals when `percpu` is false, one entry per core otherwise.
    fn cpu_times(&mut self, percpu: bool) -> SourceResult<Vec<CpuTimes>>;
    fn cpu_percent(&mut self) -> SourceResult<CpuUsage>;
    fn cpu_freq(&mut self) -> SourceResult<Vec<CpuFreq>>;
    fn cpu_stats(&mut self) -> SourceResult<CpuStats>;
    fn logical_cpu_count(&mut self) -> SourceResult<usize>;
    fn load_average(&mut self) -> SourceResult<LoadAverage>;

    fn virtual_memory(&mut self) -> SourceResult<VirtualMemory>;
    fn swap_memory(&mut self) -> SourceResult<SwapMemory>;

    fn disk_partitions(&mut self) -> SourceResult<Vec<DiskPartition>>;
    fn disk_usage(&mut self) -> SourceResult<Vec<DiskUsage>>;
    fn disk_io_counters(&mut self) -> SourceResult<Vec<DiskIoCounters>>;

    fn net_io_counters(&mut self) -> SourceResult<Vec<NetIoCounters>>;
    fn net_if_addrs(&mut self) -> SourceResult<Vec<NicAddress>>;
    fn net_if_stats(&mut self) -> SourceResult<Vec<NicStats>>;
    /// TCP and UDP sockets over IPv4 and IPv6.
    fn net_connections(&mut self) -> SourceResult<Vec<Connection>>;

    fn temperatures(&mut self) -> SourceResult<Vec<Temperature>>;
    fn fans(&mut self) -> SourceResult<Vec<Fan>>;
    /// `Ok(None)` on hosts without a battery.
    fn battery(&mut self) -> SourceResult<Option<Battery>>;

    /// Seconds since the Unix epoch.
    fn boot_time(&mut self) -> SourceResult<u64>;
    fn uptime(&mut self) -> SourceResult<u64>;
    fn users(&mut self) -> SourceResult<Vec<LoggedInUser>>;

    fn process_details(&mut self, pid: u32) -> SourceResult<ProcessDetails>;
}
