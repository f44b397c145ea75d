//! Tool invocation orchestrator.
//!
//! Discovers tools exposed by a remote tool server, lets a language model call
//! them, and drives each chat turn through the two-phase
//! model → tools → model protocol while keeping bounded conversation history.
//!
//! - [`mcp_client`]: tool discovery, registry and invocation
//! - [`inference`]: OpenAI-compatible completion provider
//! - [`agent_core`]: conversation store, tool router and orchestrator
//! - [`commands`]: the session bridge front-ends drive
//! - [`config`]: YAML configuration

pub mod agent_core;
pub mod commands;
pub mod config;
pub mod inference;
pub mod mcp_client;

use std::path::Path;

use config::LoggingConfig;

/// Number of rotated log files kept next to the active one.
const LOG_FILES_KEPT: u32 = 3;

/// Default filter when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "mcp_orchestrator=info,warn";

/// Initialize the tracing subscriber.
///
/// Honors `RUST_LOG`. With `config.file` set, logs go to that file (rotated
/// on startup, flushed per line); otherwise to stderr. `config.json` switches
/// to one JSON object per line.
pub fn init_tracing(config: &LoggingConfig) -> std::io::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::EnvFilter;

    let writer = match &config.file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            rotate_log_file(path, LOG_FILES_KEPT);
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            BoxMakeWriter::new(FlushingWriter::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| std::io::Error::other(format!("tracing already initialized: {e}")))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = ?config.file,
        json = config.json,
        pid = std::process::id(),
        "=== mcp-orchestrator starting ==="
    );
    Ok(())
}

/// Rotate log files: `x.log` → `x.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write, so
/// each log line is on disk even if the process dies.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_rotate_log_file_shifts_and_caps() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("orchestrator.log");

        for generation in 0..5 {
            std::fs::write(&log, format!("gen {generation}")).unwrap();
            rotate_log_file(&log, 3);
        }

        assert!(!log.exists());
        let read = |suffix: &str| {
            std::fs::read_to_string(format!("{}.{suffix}", log.display())).unwrap()
        };
        assert_eq!(read("1"), "gen 4");
        assert_eq!(read("2"), "gen 3");
        assert_eq!(read("3"), "gen 2");
        assert!(!Path::new(&format!("{}.4", log.display())).exists());
    }

    #[test]
    fn test_rotate_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("absent.log");
        rotate_log_file(&log, 3);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_flushing_writer_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let file = std::fs::File::create(&path).unwrap();

        let mut writer = FlushingWriter::new(file);
        let mut clone = writer.clone();
        writer.write_all(b"first\n").unwrap();
        clone.write_all(b"second\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
