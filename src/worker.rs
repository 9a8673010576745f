//! Message-queue front end: turns queued test requests into runs and streams
//! their progress back out.

use crate::config::{QueueNames, WorkerConfig};
use crate::error::ConfigError;
use crate::load_test::{LogCallback, StressTestRunner};
use crate::report::{format_report, ReportFormat};
use crate::sampler::SnapshotCallback;
use crate::signal::StopSignal;
use crate::types::{
    ControlAction, ControlMessage, LogMessage, MetricsSnapshot, SnapshotMessage,
    StressTestMessage, TestResult,
};
use anyhow::{Context, Result};
use lapin::{options::BasicPublishOptions, BasicProperties, Channel};
use log::{error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

pub fn parse_test_message(payload: &[u8]) -> serde_json::Result<StressTestMessage> {
    serde_json::from_slice(payload)
}

pub fn parse_control_message(payload: &[u8]) -> serde_json::Result<ControlMessage> {
    serde_json::from_slice(payload)
}

/// Publishes to queues through the default exchange.
#[derive(Clone)]
pub struct Publisher {
    channel: Channel,
}

impl Publisher {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    pub async fn publish(&self, queue: &str, payload: &[u8]) -> Result<()> {
        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default(),
            )
            .await
            .with_context(|| format!("publish to {} failed", queue))?;
        Ok(())
    }

    pub async fn publish_json<T: Serialize + ?Sized>(&self, queue: &str, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.publish(queue, &payload).await
    }
}

/// Stop flags of the runs currently executing, keyed by test id.
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<Mutex<HashMap<String, StopSignal>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if a run with this id is already registered.
    pub async fn register(&self, test_id: &str, stop: StopSignal) -> bool {
        let mut runs = self.runs.lock().await;
        if runs.contains_key(test_id) {
            return false;
        }
        runs.insert(test_id.to_string(), stop);
        true
    }

    /// Raises the stop flag of a running test. Returns false for unknown ids.
    pub async fn stop(&self, test_id: &str) -> bool {
        match self.runs.lock().await.get(test_id) {
            Some(stop) => {
                stop.stop();
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, test_id: &str) {
        self.runs.lock().await.remove(test_id);
    }

    pub async fn running(&self) -> usize {
        self.runs.lock().await.len()
    }
}

/// Writes `result` in every report format as `<dir>/<test_id>.<ext>`.
pub async fn write_reports(dir: &Path, result: &TestResult) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("cannot create report directory {}", dir.display()))?;

    let mut written = Vec::with_capacity(ReportFormat::ALL.len());
    for format in ReportFormat::ALL {
        let bytes = format_report(result, format)
            .with_context(|| format!("{} report for {} failed", format, result.test_id))?;
        let path = dir.join(format!("{}.{}", result.test_id, format.extension()));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("cannot write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Drains serialized messages into one queue until every sender is gone.
fn spawn_forwarder(
    publisher: Publisher,
    queue: String,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if let Err(e) = publisher.publish(&queue, &payload).await {
                warn!("⚠️ {:#}", e);
            }
        }
    })
}

#[derive(Clone)]
pub struct Worker {
    runner: StressTestRunner,
    publisher: Publisher,
    queues: QueueNames,
    registry: RunRegistry,
    report_dir: Option<PathBuf>,
}

impl Worker {
    pub fn new(runner: StressTestRunner, publisher: Publisher, config: &WorkerConfig) -> Self {
        Self {
            runner,
            publisher,
            queues: config.queues.clone(),
            registry: RunRegistry::new(),
            report_dir: config.report_dir.clone(),
        }
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Validates and starts a run in the background. A configuration error
    /// is returned before anything is spawned.
    pub async fn launch(&self, message: StressTestMessage) -> Result<Option<JoinHandle<()>>, ConfigError> {
        let run = self
            .runner
            .prepare(message.test_id, message.name, message.config)?;
        let test_id = run.test_id().to_string();

        if !self.registry.register(&test_id, run.stop_signal()).await {
            warn!("⚠️ Test {} is already running, ignoring duplicate", test_id);
            return Ok(None);
        }

        let (log_tx, log_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let log_forwarder =
            spawn_forwarder(self.publisher.clone(), self.queues.logs.clone(), log_rx);
        let snapshot_forwarder = spawn_forwarder(
            self.publisher.clone(),
            self.queues.snapshots.clone(),
            snapshot_rx,
        );

        let id = test_id.clone();
        let on_log: LogCallback = Arc::new(move |line: &str| {
            match serde_json::to_vec(&LogMessage { test_id: &id, line }) {
                Ok(payload) => {
                    let _ = log_tx.send(payload);
                }
                Err(e) => warn!("⚠️ Log line not serializable: {}", e),
            }
        });

        let id = test_id.clone();
        let on_snapshot: SnapshotCallback = Arc::new(move |snapshot: &MetricsSnapshot| {
            match serde_json::to_vec(&SnapshotMessage { test_id: &id, snapshot }) {
                Ok(payload) => {
                    let _ = snapshot_tx.send(payload);
                }
                Err(e) => warn!("⚠️ Snapshot not serializable: {}", e),
            }
        });

        let worker = self.clone();
        info!("🧪 Starting stress test: {}", test_id);
        Ok(Some(tokio::spawn(async move {
            let result = run.run(Some(on_log), Some(on_snapshot)).await;

            // The callbacks went out of scope with the run; flush what they queued.
            let _ = log_forwarder.await;
            let _ = snapshot_forwarder.await;

            worker.finish(result).await;
            worker.registry.remove(&test_id).await;
        })))
    }

    async fn finish(&self, result: TestResult) {
        match self
            .publisher
            .publish_json(&self.queues.results, &result)
            .await
        {
            Ok(()) => info!("📤 Result of {} sent ({})", result.test_id, result.status),
            Err(e) => error!("❌ Result of {} not sent: {:#}", result.test_id, e),
        }

        if let Some(dir) = &self.report_dir {
            match write_reports(dir, &result).await {
                Ok(paths) => info!("📝 {} reports written to {}", paths.len(), dir.display()),
                Err(e) => error!("❌ Reports for {} not written: {:#}", result.test_id, e),
            }
        }
    }

    pub async fn control(&self, message: ControlMessage) -> bool {
        match message.action {
            ControlAction::Stop => {
                let stopped = self.registry.stop(&message.test_id).await;
                if stopped {
                    info!("🛑 Stop requested for {}", message.test_id);
                } else {
                    warn!("⚠️ Stop requested for unknown test {}", message.test_id);
                }
                stopped
            }
        }
    }
}
