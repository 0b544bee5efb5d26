use std::sync::Arc;
use std::thread::JoinHandle;

use fg_queue::{Recv, ScQueue};
use fg_value::{CowHandle, Frame};

use crate::error::EngineError;
use crate::instance::Callback;

/// A delivery posted to the callback queue once the maintainer has decided
/// an instance's final outcome.
pub struct CallbackTask {
    pub callback: Callback,
    pub frame: Option<CowHandle<Frame>>,
    pub error: Option<EngineError>,
}

/// The dedicated dispatcher thread (§4.I): drains the callback queue in
/// FIFO order, isolating user code from worker and maintainer threads so a
/// slow or panicking callback can never stall scheduling.
pub fn spawn(queue: Arc<ScQueue<CallbackTask>>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("fg-callback-dispatcher".into())
        .spawn(move || loop {
            match queue.pop() {
                Recv::Value(task) => (task.callback)(task.frame, task.error),
                Recv::Stop => break,
            }
        })
        .expect("failed to spawn callback dispatcher thread")
}
