use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use fg_queue::{PriorityQueue, ScQueue};

use crate::callback::{self, CallbackTask};
use crate::filter::Filter;
use crate::instance::WorkItem;
use crate::logger::{LogSink, Logger, StderrSink};
use crate::maintainer::{self, Shared};
use crate::output::Output;
use crate::substrate::SubstrateId;

/// `{thread_count, mem_hint_mb}` (§6). `thread_count` defaults to the
/// host's available parallelism; `mem_hint_mb` is advisory only — nothing
/// in this crate enforces it, it exists for hosts that want to pass a
/// budget through to their own allocator tuning.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub thread_count: u32,
    pub mem_hint_mb: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_count: std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1),
            mem_hint_mb: 0,
        }
    }
}

struct Threads {
    maintainer: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

/// The in-process frame-graph engine (§2 data-flow summary): owns the
/// substrate registry, the three queues connecting maintainer / workers /
/// dispatcher, and the logger, and drives their lifecycle.
pub struct Engine {
    shared: Arc<Shared>,
    callback_queue: Arc<ScQueue<CallbackTask>>,
    logger: Arc<Logger>,
    stop: Arc<AtomicBool>,
    config: Mutex<EngineConfig>,
    threads: Mutex<Option<Threads>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Arc<Self> {
        Self::with_sink(config, Box::new(StderrSink))
    }

    pub fn with_sink(config: EngineConfig, sink: Box<dyn LogSink>) -> Arc<Self> {
        let logger = Arc::new(Logger::spawn(sink));
        let work_queue = Arc::new(PriorityQueue::new());
        let maintain_queue = Arc::new(ScQueue::new());
        let callback_queue = Arc::new(ScQueue::new());
        let shared = Arc::new(Shared::new(
            config.thread_count.max(1) as usize,
            work_queue,
            maintain_queue,
            Arc::clone(&logger),
        ));
        Arc::new(Self {
            shared,
            callback_queue,
            logger,
            stop: Arc::new(AtomicBool::new(false)),
            config: Mutex::new(config),
            threads: Mutex::new(None),
        })
    }

    pub fn register_filter(&self, filter: Box<dyn Filter>) -> SubstrateId {
        self.shared.register_filter(filter)
    }

    pub fn create_output(self: &Arc<Self>, substrate: SubstrateId) -> Output {
        Output::new(substrate, Arc::clone(&self.shared), Arc::clone(&self.callback_queue))
    }

    /// Apply a new config. Takes effect the next time `react` starts the
    /// thread pool (§6: "`set_config` may be called while reacting;
    /// changes apply on the next thread-pool start").
    pub fn set_config(&self, config: EngineConfig) {
        *self.config.lock().unwrap() = config;
    }

    pub fn is_reacting(&self) -> bool {
        self.threads.lock().unwrap().is_some()
    }

    /// Start the maintainer, dispatcher, and worker threads. A no-op if
    /// already reacting.
    pub fn react(self: &Arc<Self>) {
        let mut threads = self.threads.lock().unwrap();
        if threads.is_some() {
            return;
        }
        let thread_count = self.config.lock().unwrap().thread_count.max(1) as usize;
        self.shared.set_worker_count(thread_count);

        let maintainer = maintainer::spawn(Arc::clone(&self.shared));
        let dispatcher = callback::spawn(Arc::clone(&self.callback_queue));
        let workers = (0..thread_count)
            .map(|id| crate::worker::spawn(id, Arc::clone(&self.shared), Arc::clone(&self.stop)))
            .collect();

        *threads = Some(Threads {
            maintainer,
            dispatcher,
            workers,
        });
    }

    /// Cooperative shutdown (§5): set `stop`, release every queue's stop
    /// sentinel, and join every thread. Safe to call more than once.
    pub fn shutdown(&self) {
        let mut threads_guard = self.threads.lock().unwrap();
        let Some(threads) = threads_guard.take() else {
            return;
        };
        self.stop.store(true, Ordering::Release);

        self.shared.work_queue.request_stop();
        self.shared.maintain_queue.request_stop();
        self.callback_queue.request_stop();

        for worker in threads.workers {
            let _ = worker.join();
        }
        let _ = threads.maintainer.join();
        let _ = threads.dispatcher.join();
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
