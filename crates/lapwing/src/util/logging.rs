use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;

use lapwing_core::TagId;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrossingLogConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_path")]
    pub path: PathBuf,
}

fn default_path() -> PathBuf {
    PathBuf::from("logs/crossings.jsonl")
}

impl Default for CrossingLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_path(),
        }
    }
}

/// One registered lap crossing, as appended to the crossing log.
#[derive(Debug, Clone, Serialize)]
pub struct CrossingEntry {
    pub seq: u64,
    pub tag: TagId,
    pub address: String,
    pub lap: usize,
    pub lap_start_offset_ms: u64,
    pub rssi: i16,
}

enum LogMessage {
    Entry(String),
    Shutdown,
}

/// Append-only jsonl log of lap crossings.
///
/// Writing happens on a dedicated task fed through an unbounded channel, so
/// logging never stalls the coordinator.
#[derive(Clone)]
pub struct CrossingLogger {
    sender: mpsc::UnboundedSender<LogMessage>,
    seq: std::sync::Arc<AtomicU64>,
}

impl CrossingLogger {
    pub fn new(config: &CrossingLogConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        if let Some(parent) = config.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), error = %e, "failed to create log directory");
                return None;
            }
        }

        let file = match OpenOptions::new().create(true).append(true).open(&config.path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(path = %config.path.display(), error = %e, "failed to open crossing log");
                return None;
            }
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let seq = std::sync::Arc::new(AtomicU64::new(0));

        let path_for_task = config.path.clone();
        tokio::spawn(async move {
            writer_task(receiver, file, path_for_task).await;
        });

        tracing::info!(path = %config.path.display(), "crossing logger initialized");

        Some(Self { sender, seq })
    }

    pub fn log(&self, tag: TagId, address: &str, lap: usize, lap_start_offset_ms: u64, rssi: i16) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;

        let entry = CrossingEntry {
            seq,
            tag,
            address: address.to_string(),
            lap,
            lap_start_offset_ms,
            rssi,
        };

        let line = match serde_json::to_string(&entry) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize crossing entry");
                return;
            }
        };

        if self.sender.send(LogMessage::Entry(line)).is_err() {
            tracing::warn!(seq, "crossing log channel closed, entry dropped");
        }
    }

    pub fn current_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        let _ = self.sender.send(LogMessage::Shutdown);
    }
}

async fn writer_task(mut receiver: mpsc::UnboundedReceiver<LogMessage>, file: File, path: PathBuf) {
    let mut writer = BufWriter::new(file);

    while let Some(msg) = receiver.recv().await {
        match msg {
            LogMessage::Entry(line) => {
                if let Err(e) = writeln!(writer, "{}", line) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to write crossing entry");
                }
                if let Err(e) = writer.flush() {
                    tracing::warn!(path = %path.display(), error = %e, "failed to flush crossing log");
                }
            }
            LogMessage::Shutdown => {
                let _ = writer.flush();
                tracing::debug!(path = %path.display(), "crossing log writer shutting down");
                break;
            }
        }
    }
}
