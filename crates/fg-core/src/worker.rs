use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use fg_queue::Recv;
use fg_value::CowHandle;

use crate::invariants::{debug_assert_i2_not_already_taken, debug_assert_i3_inputs_ready};
use crate::maintainer::{MaintainTask, Shared};

/// One worker thread's loop (§4.H): park on the work queue, claim an
/// instance, run its filter, report back to the maintainer.
///
/// `stop` is a separate flag (rather than relying solely on the work
/// queue's own stop sentinel) because a worker parked mid-claim-dance
/// needs to notice shutdown even if it woke for a spurious reason; in
/// practice the work queue's `Recv::Stop` is what actually unblocks it.
pub fn spawn(worker_id: usize, shared: Arc<Shared>, stop: Arc<AtomicBool>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("fg-worker-{worker_id}"))
        .spawn(move || loop {
            let wait_start = Instant::now();
            let item = shared.work_queue.pop();
            shared.bubble.record(wait_start.elapsed().as_nanos() as u64);

            let key = match item {
                Recv::Stop => break,
                Recv::Value(item) => item.key,
            };
            if stop.load(Ordering::Acquire) {
                break;
            }

            run_one(worker_id, &shared, key);
        })
        .expect("failed to spawn worker thread")
}

fn run_one(worker_id: usize, shared: &Shared, key: crate::instance::InstanceKey) {
    let (substrate, frame_data, input_keys) = {
        let mut state = shared.state.lock().unwrap();
        let Some(inst) = state.arena.get_mut(key) else {
            return;
        };
        if inst.taken {
            return;
        }
        debug_assert_i2_not_already_taken!(inst.taken);
        inst.taken = true;
        // Only the real dependencies (not the MAKE_LINEAR false dep, if any)
        // are handed to the filter as data.
        let real_inputs = inst.inputs[..inst.real_dep_count].to_vec();
        (inst.substrate, inst.frame_data.clone(), real_inputs)
    };

    let inputs: Vec<CowHandle<fg_value::Frame>> = {
        let state = shared.state.lock().unwrap();
        input_keys
            .iter()
            .filter_map(|k| state.arena.get(*k).and_then(|i| i.product.clone()))
            .collect()
    };
    debug_assert_i3_inputs_ready!(inputs.len(), input_keys.len());

    let result = {
        let substrates = shared.substrates.read().unwrap();
        substrates[substrate].process_frame(worker_id, &inputs, &frame_data)
    };

    match result {
        Ok(frame) => {
            {
                let mut state = shared.state.lock().unwrap();
                if let Some(inst) = state.arena.get_mut(key) {
                    inst.product = Some(CowHandle::new(frame));
                }
            }
            shared
                .maintain_queue
                .push(MaintainTask::Notify { instance: key, error: None });
        }
        Err(e) => {
            shared.maintain_queue.push(MaintainTask::Notify {
                instance: key,
                error: Some(e),
            });
        }
    }
}
