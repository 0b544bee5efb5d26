use std::sync::Arc;

use fg_queue::ScQueue;
use fg_value::{CowHandle, Frame, VideoInfo};

use crate::callback::CallbackTask;
use crate::error::EngineError;
use crate::maintainer::{MaintainTask, Shared};
use crate::substrate::SubstrateId;

/// A per-substrate façade handed to engine clients (§4.J).
///
/// `get_frame` is asynchronous and one-shot: the supplied callback fires
/// exactly once, with either a frame or an error, never both.
pub struct Output {
    substrate: SubstrateId,
    shared: Arc<Shared>,
    callback_queue: Arc<ScQueue<CallbackTask>>,
}

impl Output {
    pub(crate) fn new(substrate: SubstrateId, shared: Arc<Shared>, callback_queue: Arc<ScQueue<CallbackTask>>) -> Self {
        Self {
            substrate,
            shared,
            callback_queue,
        }
    }

    pub fn video_info(&self) -> VideoInfo {
        self.shared.substrates.read().unwrap()[self.substrate].video_info()
    }

    /// Request frame `idx`. `callback` is boxed and wrapped so the
    /// maintainer's synchronous invocation (on success, on failure, or
    /// immediately if the frame is already cached) only ever reposts the
    /// real delivery onto the callback queue — user code never runs on the
    /// maintainer or worker threads.
    pub fn get_frame<F>(&self, idx: u32, callback: F)
    where
        F: FnOnce(Option<CowHandle<Frame>>, Option<EngineError>) + Send + 'static,
    {
        let callback_queue = Arc::clone(&self.callback_queue);
        let wrapped: crate::instance::Callback = Box::new(move |frame, error| {
            callback_queue.push(CallbackTask {
                callback: Box::new(callback),
                frame,
                error,
            });
        });
        self.shared.maintain_queue.push(MaintainTask::Construct {
            substrate: self.substrate,
            idx,
            callback: Some(wrapped),
        });
    }
}
