use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use file_rotate::{
    compression::Compression,
    suffix::AppendCount,
    ContentLimit, FileRotate,
};
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub max_size_mb: u64,
    pub max_files: usize,
}

/// Size-rotated jsonl sink shared with the subscriber. `FileRotate` is not
/// internally synchronized, so every write takes the mutex.
struct JsonlSink(Arc<Mutex<FileRotate<AppendCount>>>);

impl JsonlSink {
    fn open(config: &LoggingConfig, file_name: &str) -> Self {
        let rotate = FileRotate::new(
            config.log_dir.join(file_name),
            AppendCount::new(config.max_files),
            ContentLimit::Bytes((config.max_size_mb * 1024 * 1024) as usize),
            Compression::None,
            #[cfg(unix)]
            None,
        );
        Self(Arc::new(Mutex::new(rotate)))
    }
}

impl<'a> MakeWriter<'a> for JsonlSink {
    type Writer = SinkGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SinkGuard(self.0.lock().unwrap())
    }
}

struct SinkGuard<'a>(MutexGuard<'a, FileRotate<AppendCount>>);

impl<'a> Write for SinkGuard<'a> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

/// Console output plus a rotating `events.jsonl` stream carrying the full
/// operational log down to debug level.
pub fn init_logging(config: LoggingConfig) -> anyhow::Result<()> {
    fs::create_dir_all(&config.log_dir)?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_filter(EnvFilter::from_default_env().add_directive("lapwing=info".parse()?));

    let events_layer = fmt::layer()
        .json()
        .with_writer(JsonlSink::open(&config, "events.jsonl"))
        .with_filter(EnvFilter::new("lapwing=debug"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(events_layer)
        .init();

    tracing::info!(
        log_dir = %config.log_dir.display(),
        max_size_mb = config.max_size_mb,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(())
}
