use crate::ui;
use anyhow::{Context, Result};
use hostmon_core::format::{bytes_field, path_field, percent_field};
use hostmon_core::{
    HostmonConfig, ProcessField, ProcessQuery, ProcessSampler, SimpleFormatter,
    SysinfoProcessSource,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct TopOptions {
    pub sort: ProcessField,
    pub descending: bool,
    pub limit: usize,
    pub user: Option<String>,
    pub fields: Vec<ProcessField>,
    pub iterations: Option<u64>,
}

pub struct App {
    sampler: ProcessSampler,
    query: ProcessQuery,
    columns: Vec<ProcessField>,
    iterations: Option<u64>,
    update_interval: Duration,
}

impl App {
    pub async fn new(config: &HostmonConfig, options: TopOptions) -> Result<Self> {
        let mut sampler_config = config.sampler_config();
        // Sample everything the table shows, sorts by or filters on
        let mut needed = options.fields.clone();
        needed.push(options.sort);
        if options.user.is_some() {
            needed.push(ProcessField::Username);
        }
        for field in needed {
            if !sampler_config.fields.contains(&field) {
                sampler_config.fields.push(field);
            }
        }
        let update_interval = sampler_config.interval;

        let sampler = ProcessSampler::new(SysinfoProcessSource::new(), sampler_config);
        let sampler = start_sampler(sampler).await?;

        Ok(Self {
            sampler,
            query: build_query(config, &options),
            columns: options.fields,
            iterations: options.iterations,
            update_interval,
        })
    }

    pub async fn run(&self) -> Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let mut printed = 0u64;
        loop {
            self.draw();
            printed += 1;
            if self.iterations.is_some_and(|n| printed >= n) {
                return Ok(());
            }

            tokio::select! {
                res = &mut ctrl_c => {
                    res.context("failed to listen for Ctrl-C")?;
                    info!("interrupted");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.update_interval) => {}
            }
        }
    }

    pub async fn shutdown(self) -> Result<()> {
        stop_sampler(self.sampler).await
    }

    fn draw(&self) {
        let snapshot = self.sampler.snapshot();
        let rows = snapshot.query(&self.query);
        println!(
            "{}",
            ui::render_table(snapshot.generation(), snapshot.taken_at(), snapshot.len(), &self.columns, &rows)
        );
    }
}

/// Cold start sleeps between passes, so it runs off the runtime thread.
async fn start_sampler(sampler: ProcessSampler) -> Result<ProcessSampler> {
    tokio::task::spawn_blocking(move || sampler.start().map(|()| sampler))
        .await
        .context("sampler start task failed")?
        .context("failed to start process sampler")
}

/// `stop()` joins the refresh thread.
async fn stop_sampler(sampler: ProcessSampler) -> Result<()> {
    tokio::task::spawn_blocking(move || sampler.stop())
        .await
        .context("sampler stop task failed")
}

fn build_query(config: &HostmonConfig, options: &TopOptions) -> ProcessQuery {
    let formatter = Arc::new(SimpleFormatter::new(config.format_config()));
    let shorten_len = formatter.config().shorten_len;

    let mut query = ProcessQuery::new()
        .sort_by(options.sort)
        .descending(options.descending)
        .limit(options.limit)
        .fields(options.fields.iter().copied());
    if let Some(user) = &options.user {
        query = query.user(user.clone());
    }

    for field in &options.fields {
        query = match field {
            ProcessField::CpuPercent | ProcessField::MemoryPercent => {
                query.format_with(*field, percent_field(Arc::clone(&formatter)))
            }
            ProcessField::MemoryRss
            | ProcessField::MemoryVms
            | ProcessField::DiskReadBytes
            | ProcessField::DiskWriteBytes => {
                query.format_with(*field, bytes_field(Arc::clone(&formatter)))
            }
            ProcessField::Exe => {
                query.format_with(*field, path_field(Arc::clone(&formatter), shorten_len))
            }
            _ => query,
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostmon_core::{ProcessRecord, ProcessSource, SamplerConfig, SamplerState};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct StaticSource;

    impl ProcessSource for StaticSource {
        fn enumerate(
            &mut self,
            _fields: &[ProcessField],
        ) -> hostmon_core::error::SourceResult<Vec<ProcessRecord>> {
            Ok(vec![ProcessRecord::new(1).with(ProcessField::Name, "init")])
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_sampler_lifecycle_leaves_runtime_free() {
        let config = SamplerConfig {
            interval: Duration::from_secs(3600),
            cold_start_passes: 2,
            warmup: Duration::from_millis(100),
            fields: vec![ProcessField::Pid, ProcessField::Name],
        };
        let sampler = ProcessSampler::new(StaticSource, config);

        let ticks = Arc::new(AtomicU64::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
        };

        let sampler = start_sampler(sampler).await.unwrap();
        // The other task kept running through the 200ms cold start
        assert!(ticks.load(Ordering::SeqCst) >= 5);
        assert_eq!(sampler.state(), SamplerState::Running);
        assert_eq!(sampler.snapshot().len(), 1);

        stop_sampler(sampler).await.unwrap();
        ticker.abort();
    }
}
