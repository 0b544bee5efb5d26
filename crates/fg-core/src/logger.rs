use std::sync::Arc;
use std::thread::JoinHandle;

use fg_queue::{Recv, ScQueue};

/// Severity levels accepted by a [`LogSink`] (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Debug = 10,
    Info = 20,
    Warning = 30,
}

/// A pluggable log destination. Implementations must be safe to invoke from
/// the dedicated logging thread only — the engine never calls a sink
/// concurrently with itself.
pub trait LogSink: Send {
    fn log(&mut self, level: LogLevel, message: &str);
}

/// Writes to stderr, prefixed with the level name. The engine's default
/// sink when none is configured.
pub struct StderrSink;

impl LogSink for StderrSink {
    fn log(&mut self, level: LogLevel, message: &str) {
        eprintln!("[{level:?}] {message}");
    }
}

struct LogRecord {
    level: LogLevel,
    message: String,
}

/// A logging thread backed by the same lock-free SC queue used for the
/// engine's task handoffs: producers (maintainer, workers, dispatcher)
/// never block to log, they just enqueue and move on.
pub struct Logger {
    queue: Arc<ScQueue<LogRecord>>,
    handle: Option<JoinHandle<()>>,
}

impl Logger {
    pub fn spawn(mut sink: Box<dyn LogSink>) -> Self {
        let queue = Arc::new(ScQueue::new());
        let worker_queue = Arc::clone(&queue);
        let handle = std::thread::Builder::new()
            .name("fg-logger".into())
            .spawn(move || loop {
                match worker_queue.pop() {
                    Recv::Value(record) => sink.log(record.level, &record.message),
                    Recv::Stop => break,
                }
            })
            .expect("failed to spawn logger thread");
        Self {
            queue,
            handle: Some(handle),
        }
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.queue.push(LogRecord {
            level,
            message: message.into(),
        });
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.queue.request_stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
