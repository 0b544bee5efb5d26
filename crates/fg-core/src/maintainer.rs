use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Instant;

use fg_queue::{PriorityQueue, Recv, ScQueue};
use slotmap::SlotMap;

use crate::instance::{Callback, FrameInstance, InstanceKey, WorkItem};
use crate::invariants::{debug_assert_i1_unique_instance, debug_assert_i4_neck_exclusive};
use crate::logger::Logger;
use crate::substrate::{Substrate, SubstrateId};
use crate::error::EngineError;
use crate::filter::FilterFlags;
use crate::scheduler_state::SchedulerState;

/// How many maintainer batches elapse between garbage-collection passes
/// (§4.G "Periodic garbage collection (every 256 maintainer ticks)").
const GC_INTERVAL: u64 = 256;

/// History-set cap before it's cleared wholesale (§4.G).
const HISTORY_CAP: usize = 65535;

/// A task posted into the maintain queue.
pub enum MaintainTask {
    Construct {
        substrate: SubstrateId,
        idx: u32,
        callback: Option<Callback>,
    },
    Notify {
        instance: InstanceKey,
        error: Option<EngineError>,
    },
}

/// Accumulates worker idle time for the "bubble" metric (§4.G): the ratio
/// of time workers spent parked versus wall-clock time, logged
/// periodically as a coarse saturation signal.
#[derive(Default)]
pub struct BubbleMeter {
    nanos: AtomicU64,
}

impl BubbleMeter {
    pub fn record(&self, nanos: u64) {
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn take(&self) -> u64 {
        self.nanos.swap(0, Ordering::Relaxed)
    }
}

/// Shared, shared-nothing-except-this-lock scheduler state plus the
/// registry of substrates filters are registered against.
pub struct Shared {
    pub state: Mutex<SchedulerState>,
    pub substrates: RwLock<SlotMap<SubstrateId, Substrate>>,
    pub work_queue: Arc<PriorityQueue<WorkItem>>,
    pub maintain_queue: Arc<ScQueue<MaintainTask>>,
    pub bubble: BubbleMeter,
    pub logger: Arc<Logger>,
    /// Matched to the worker count `react()` last spawned with (§6:
    /// `set_config` changes apply on the next thread-pool start). An
    /// `AtomicUsize` rather than a plain field so `Engine::react` can update
    /// it in place without requiring `&mut Shared` through the `Arc`.
    worker_count: AtomicUsize,
}

impl Shared {
    pub fn new(
        worker_count: usize,
        work_queue: Arc<PriorityQueue<WorkItem>>,
        maintain_queue: Arc<ScQueue<MaintainTask>>,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            state: Mutex::new(SchedulerState::new()),
            substrates: RwLock::new(SlotMap::with_key()),
            work_queue,
            maintain_queue,
            bubble: BubbleMeter::default(),
            logger,
            worker_count: AtomicUsize::new(worker_count),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count.load(Ordering::Acquire)
    }

    pub fn set_worker_count(&self, count: usize) {
        self.worker_count.store(count, Ordering::Release);
    }

    pub fn register_filter(&self, filter: Box<dyn crate::filter::Filter>) -> SubstrateId {
        self.substrates.write().unwrap().insert(Substrate::new(filter))
    }
}

/// Recursively build (or reuse) the instance for `(substrate, idx)`,
/// wiring dependency edges, `MAKE_LINEAR` false-deps, `SINGLE_THREADED`
/// flags, and indulgence, then posting to work if it's immediately ready.
///
/// `missed` threads the "already detected a recomputation on this path"
/// flag through the recursion so a single upstream cache-miss doesn't get
/// double-counted for every transitive dependent (mirrors the original's
/// `construct(..., missed)` parameter).
#[allow(clippy::too_many_arguments)]
fn construct(
    shared: &Shared,
    state: &mut SchedulerState,
    substrates: &SlotMap<SubstrateId, Substrate>,
    substrate: SubstrateId,
    idx: u32,
    callback: Option<Callback>,
    mut missed: bool,
) -> Result<InstanceKey, EngineError> {
    let key_pair = (substrate, idx);

    if let Some(&existing) = state.index.get(&key_pair) {
        if let Some(cb) = callback {
            let product = state.arena.get(existing).and_then(|i| i.product.clone());
            if let Some(frame) = product {
                cb(Some(frame), None);
            } else if let Some(inst) = state.arena.get_mut(existing) {
                inst.callback = Some(cb);
            }
        }
        return Ok(existing);
    }

    if state.history.contains(&key_pair) && !missed {
        shared
            .logger
            .debug(format!("need to recalculate frame {idx} of substrate {substrate:?}"));
        missed = true;
        *state.miss.entry(substrate).or_insert(0) += 1;
    } else {
        state.history.insert(key_pair);
    }

    let substrate_ref = &substrates[substrate];
    substrate_ref.ensure_worker_clones(shared.worker_count());
    let frame_data = match substrate_ref.frame_data(idx) {
        Ok(fd) => fd,
        Err(e) => {
            if let Some(cb) = callback {
                cb(None, Some(e.clone()));
            }
            return Err(e);
        }
    };

    let tick = state.next_tick();
    let key = state
        .arena
        .insert(FrameInstance::new(substrate, idx, frame_data.clone(), tick));

    for dep in frame_data.dependencies.clone() {
        match construct(shared, state, substrates, dep.substrate, dep.frame_idx, None, missed) {
            Ok(dep_key) => {
                state.arena[key].inputs.push(dep_key);
                if let Some(dep_inst) = state.arena.get_mut(dep_key) {
                    dep_inst.outputs.push(key);
                }
            }
            Err(e) => {
                state.arena.remove(key);
                substrate_ref.drop_frame_data(frame_data);
                if let Some(cb) = callback {
                    cb(None, Some(e.clone()));
                }
                return Err(e);
            }
        }
    }

    state.arena[key].real_dep_count = state.arena[key].inputs.len();

    let flags = substrate_ref.filter_flags();
    if flags.contains(FilterFlags::MAKE_LINEAR) && idx > 0 {
        if let Some(&prev_key) = state.index.get(&(substrate, idx - 1)) {
            state.arena[key].inputs.push(prev_key);
            state.arena[key].false_dep = true;
            if let Some(prev_inst) = state.arena.get_mut(prev_key) {
                prev_inst.outputs.push(key);
            }
        }
    }
    if flags.contains(FilterFlags::SINGLE_THREADED) {
        state.arena[key].single_threaded = true;
    }
    let indulgence = state.miss.get(&substrate).copied().unwrap_or(0) / 8;
    state.arena[key].indulgence = indulgence;
    state.arena[key].callback = callback;

    debug_assert_i1_unique_instance!(state.index.contains_key(&key_pair));
    state.index.insert(key_pair, key);
    state.alive.insert(key);

    if is_ready(state, key) {
        post_work(state, &shared.work_queue, key);
    }

    Ok(key)
}

fn is_ready(state: &SchedulerState, key: InstanceKey) -> bool {
    state.arena.get(key).is_some_and(|inst| inst.is_ready(&state.arena))
}

fn post_work(state: &mut SchedulerState, work_queue: &PriorityQueue<WorkItem>, key: InstanceKey) {
    let Some(inst) = state.arena.get(key) else { return };
    if !inst.single_threaded {
        work_queue.push(WorkItem { tick: inst.tick, key });
    } else {
        let substrate = inst.substrate;
        state.neck.entry(substrate).or_default().queued.push_back(key);
    }
}

/// After a maintain-task batch drains, promote one queued instance per idle
/// (`busy == false`) single-threaded substrate onto the work queue.
fn drain_neck(state: &mut SchedulerState, work_queue: &PriorityQueue<WorkItem>) {
    let mut to_post = Vec::new();
    for neck in state.neck.values_mut() {
        if !neck.busy {
            if let Some(key) = neck.queued.pop_front() {
                debug_assert_i4_neck_exclusive!(neck.busy);
                neck.busy = true;
                to_post.push(key);
            }
        }
    }
    for key in to_post {
        if let Some(inst) = state.arena.get(key) {
            work_queue.push(WorkItem { tick: inst.tick, key });
        }
    }
}

/// Recursively mark `key` and every live downstream instance as dead,
/// firing each one's callback (if any) with `error`. Returns whether any
/// callback absorbed the failure.
fn kill_tree(state: &mut SchedulerState, key: InstanceKey, error: &EngineError) -> bool {
    let mut handled = false;
    let callback = state.arena.get_mut(key).and_then(|inst| inst.callback.take());
    if let Some(cb) = callback {
        cb(None, Some(error.clone()));
        handled = true;
    }
    let outputs = state.arena.get(key).map(|i| i.outputs.clone()).unwrap_or_default();
    for out in outputs {
        if state.alive.contains(&out) && kill_tree(state, out, error) {
            handled = true;
        }
    }
    state.alive.remove(&key);
    handled
}

/// Remove every arena entry no longer in `alive`, calling each evicted
/// instance's filter `drop_frame_data` hook first (§6: "called when the
/// instance is destroyed").
fn sweep_dead(state: &mut SchedulerState, substrates: &SlotMap<SubstrateId, Substrate>) {
    let alive = state.alive.clone();
    state.index.retain(|_, key| alive.contains(key));
    state.arena.retain(|key, inst| {
        let keep = alive.contains(&key);
        if !keep {
            if let Some(sub) = substrates.get(inst.substrate) {
                sub.drop_frame_data(inst.frame_data.clone());
            }
        }
        keep
    });
}

fn handle_notify(
    shared: &Shared,
    state: &mut SchedulerState,
    substrates: &SlotMap<SubstrateId, Substrate>,
    instance: InstanceKey,
    error: Option<EngineError>,
) {
    if !state.alive.contains(&instance) {
        return;
    }
    let substrate = match state.arena.get(instance) {
        Some(i) => i.substrate,
        None => return,
    };
    if state.arena.get(instance).is_some_and(|i| i.single_threaded) {
        if let Some(neck) = state.neck.get_mut(&substrate) {
            neck.busy = false;
        }
    }

    match error {
        None => {
            let outputs = state.arena.get(instance).map(|i| i.outputs.clone()).unwrap_or_default();
            for out_key in outputs {
                if !state.alive.contains(&out_key) {
                    continue;
                }
                let already_done = state.arena.get(out_key).is_some_and(|i| i.product.is_some());
                if already_done {
                    continue;
                }
                if is_ready(state, out_key) {
                    post_work(state, &shared.work_queue, out_key);
                }
            }
            let callback = state.arena.get_mut(instance).and_then(|i| i.callback.take());
            if let Some(cb) = callback {
                let frame = state.arena.get(instance).and_then(|i| i.product.clone());
                cb(frame, None);
            }
        }
        Some(err) => {
            let handled = kill_tree(state, instance, &err);
            if !handled {
                shared.logger.warning(format!(
                    "unhandled failure cascade from instance of substrate {substrate:?}: {err}"
                ));
                fatal(&shared.logger, format!("uncaught filter failure: {err}"));
            }
            sweep_dead(state, substrates);
        }
    }
}

/// Run the periodic GC sweep (§4.G): evict Done instances whose indulgence
/// has run out and who have no live waiting output.
fn run_gc(state: &mut SchedulerState, substrates: &SlotMap<SubstrateId, Substrate>, logger: &Logger) {
    let mut to_evict = Vec::new();
    for (key, inst) in state.arena.iter_mut() {
        if inst.product.is_none() {
            continue;
        }
        if inst.callback.is_some() {
            continue;
        }
        if inst.single_threaded {
            if let Some(neck) = state.neck.get(&inst.substrate) {
                if neck.busy {
                    continue;
                }
            }
        }
        let has_waiting_output = inst
            .outputs
            .iter()
            .any(|o| state.alive.contains(o));
        if has_waiting_output {
            continue;
        }
        if inst.indulgence == 0 {
            to_evict.push(key);
        } else {
            inst.indulgence -= 1;
        }
    }
    for key in to_evict {
        state.alive.remove(&key);
    }
    sweep_dead(state, substrates);

    if state.history.len() > HISTORY_CAP {
        logger.debug("history set exceeded cap, clearing");
        state.history.clear();
    }
}

/// Terminate the process after writing the fatal diagnostic directly to
/// stderr (§7: "the engine writes a stack trace to the error stream and
/// terminates", matching `terminate_with_stacktrace()`'s synchronous
/// `write_err()` in the original's `threading.cpp`).
///
/// Also enqueues onto `logger` for sinks that care, but that queue drains on
/// a separate thread `abort()` doesn't wait for — the direct `eprintln!` is
/// what actually guarantees the message survives the abort.
fn fatal(logger: &Logger, message: String) -> ! {
    eprintln!("[FATAL] {message}");
    logger.warning(format!("FATAL: {message}"));
    std::process::abort();
}

/// Spawn the maintainer thread. Runs until `maintain_queue` yields
/// `Recv::Stop`.
pub fn spawn(shared: Arc<Shared>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("fg-maintainer".into())
        .spawn(move || {
            let mut batches_since_gc: u64 = 0;
            loop {
                let first = shared.maintain_queue.pop();
                let stop_first = matches!(first, Recv::Stop);
                if !stop_first {
                    if let Recv::Value(task) = first {
                        dispatch(&shared, task);
                    }
                }

                let stop_rest = shared.maintain_queue.consume_all(|task| dispatch(&shared, task));

                {
                    let mut state = shared.state.lock().unwrap();
                    drain_neck(&mut state, &shared.work_queue);
                }

                batches_since_gc += 1;
                if batches_since_gc >= GC_INTERVAL {
                    batches_since_gc = 0;
                    let substrates = shared.substrates.read().unwrap();
                    let mut state = shared.state.lock().unwrap();
                    run_gc(&mut state, &substrates, &shared.logger);
                    let bubble_nanos = shared.bubble.take();
                    shared
                        .logger
                        .debug(format!("maintainer GC pass: bubble={bubble_nanos}ns instances={}", state.arena.len()));
                }

                if stop_first || stop_rest {
                    break;
                }
            }
        })
        .expect("failed to spawn maintainer thread")
}

fn dispatch(shared: &Shared, task: MaintainTask) {
    let substrates = shared.substrates.read().unwrap();
    let mut state = shared.state.lock().unwrap();
    match task {
        MaintainTask::Construct { substrate, idx, callback } => {
            let _ = construct(shared, &mut state, &substrates, substrate, idx, callback, false);
        }
        MaintainTask::Notify { instance, error } => {
            handle_notify(shared, &mut state, &substrates, instance, error);
        }
    }
}

/// Measures a wait duration and records it into the bubble meter.
pub fn timed<T>(bubble: &BubbleMeter, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    bubble.record(start.elapsed().as_nanos() as u64);
    result
}
