// This is free and unencumbered software released into the public domain.

//! Dedicated worker thread owning the native camera handle.
//!
//! The device API forbids touching an open handle from more than one
//! thread, so every native call is marshaled onto one background thread per
//! open camera. Lifecycle calls block the caller on a oneshot completion
//! channel; streaming-control calls are fire-and-forget, with completion
//! observed through later hardware events.

use crate::shared::{
    CameraCaps, CameraError, CameraProvider, HandleEvent, HandleEventSink, NativeCameraHandle,
    ParameterBatch, PreviewTarget,
};
use scopeguard::guard;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, SyncSender, channel, sync_channel};
use std::thread::JoinHandle;
use std::time::Duration;

/// Upper bound on waiting for the worker to wind down at teardown. The
/// native release is queued ahead of the exit command, so hitting this
/// bound means a native call is wedged; the thread is left detached rather
/// than hanging the process.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

type Reply<T> = SyncSender<T>;

enum Command {
    Open {
        id: String,
        sink: HandleEventSink,
        reply: Reply<Result<CameraCaps, CameraError>>,
    },
    Lock {
        reply: Reply<Result<(), CameraError>>,
    },
    Unlock {
        reply: Reply<Result<(), CameraError>>,
    },
    Reconnect {
        reply: Reply<Result<(), CameraError>>,
    },
    SetPreviewTarget {
        target: Option<PreviewTarget>,
        reply: Reply<Result<(), CameraError>>,
    },
    TakePicture {
        reply: Reply<Result<(), CameraError>>,
    },
    Release {
        reply: Reply<()>,
    },
    ApplyParameters(ParameterBatch),
    SetFrameNotification(bool),
    StartPreview,
    StopPreview,
    Exit {
        done: Reply<()>,
    },
}

/// Handle to the worker thread serializing all native calls for one camera.
pub struct CameraWorker {
    tx: Sender<Command>,
    join: Option<JoinHandle<()>>,
}

impl CameraWorker {
    pub fn spawn(provider: Arc<dyn CameraProvider>) -> Self {
        let (tx, rx) = channel();
        let join = std::thread::spawn(move || worker_main(provider, rx));
        Self {
            tx,
            join: Some(join),
        }
    }

    fn call<T: Send + 'static>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, CameraError> {
        let (reply, rx) = sync_channel(1);
        self.tx
            .send(build(reply))
            .map_err(|_| CameraError::Closed)?;
        rx.recv().map_err(|_| CameraError::Closed)
    }

    /// Allocate the native handle on the worker; blocks until the device
    /// answers. Returns the hardware-advertised capabilities.
    pub fn open(&self, id: &str, sink: HandleEventSink) -> Result<CameraCaps, CameraError> {
        self.call(|reply| Command::Open {
            id: id.to_string(),
            sink,
            reply,
        })?
    }

    pub fn lock(&self) -> Result<(), CameraError> {
        self.call(|reply| Command::Lock { reply })?
    }

    pub fn unlock(&self) -> Result<(), CameraError> {
        self.call(|reply| Command::Unlock { reply })?
    }

    pub fn reconnect(&self) -> Result<(), CameraError> {
        self.call(|reply| Command::Reconnect { reply })?
    }

    pub fn set_preview_target(&self, target: Option<PreviewTarget>) -> Result<(), CameraError> {
        self.call(|reply| Command::SetPreviewTarget { target, reply })?
    }

    pub fn take_picture(&self) -> Result<(), CameraError> {
        self.call(|reply| Command::TakePicture { reply })?
    }

    /// Release the native handle; blocks until it is gone. Idempotent.
    pub fn release(&self) {
        let _ = self.call(|reply| Command::Release { reply });
    }

    pub fn apply_parameters(&self, batch: ParameterBatch) {
        if batch.is_empty() {
            return;
        }
        let _ = self.tx.send(Command::ApplyParameters(batch));
    }

    pub fn set_frame_notification(&self, enabled: bool) {
        let _ = self.tx.send(Command::SetFrameNotification(enabled));
    }

    pub fn start_preview(&self) {
        let _ = self.tx.send(Command::StartPreview);
    }

    pub fn stop_preview(&self) {
        let _ = self.tx.send(Command::StopPreview);
    }
}

impl Drop for CameraWorker {
    fn drop(&mut self) {
        let (done, done_rx) = sync_channel(1);
        if self.tx.send(Command::Exit { done }).is_ok() {
            // release-before-exit is guaranteed by command ordering; the
            // bounded wait keeps a wedged native call from hanging teardown
            if done_rx.recv_timeout(SHUTDOWN_TIMEOUT).is_err() {
                self.join.take();
                return;
            }
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

struct WorkerState {
    handle: Box<dyn NativeCameraHandle>,
    sink: HandleEventSink,
}

fn worker_main(provider: Arc<dyn CameraProvider>, rx: Receiver<Command>) {
    // The handle must be released on this thread no matter how the loop
    // exits; a handle surviving the worker would be touched from the wrong
    // thread when dropped.
    let mut state = guard(None::<WorkerState>, |state| {
        if let Some(mut state) = state {
            state.handle.release();
        }
    });

    while let Ok(command) = rx.recv() {
        match command {
            Command::Open { id, sink, reply } => {
                let result = if state.is_some() {
                    Err(CameraError::other("camera already open on this worker"))
                } else {
                    provider.open(&id, sink.clone()).map(|handle| {
                        let caps = handle.capabilities();
                        *state = Some(WorkerState { handle, sink });
                        caps
                    })
                };
                let _ = reply.send(result);
            },
            Command::Lock { reply } => {
                let _ = reply.send(with_handle(&mut *state, |h| h.lock()));
            },
            Command::Unlock { reply } => {
                let _ = reply.send(with_handle(&mut *state, |h| h.unlock()));
            },
            Command::Reconnect { reply } => {
                let _ = reply.send(with_handle(&mut *state, |h| h.reconnect()));
            },
            Command::SetPreviewTarget { target, reply } => {
                let _ = reply.send(with_handle(&mut *state, |h| h.set_preview_target(target)));
            },
            Command::TakePicture { reply } => {
                let _ = reply.send(with_handle(&mut *state, |h| h.take_picture()));
            },
            Command::Release { reply } => {
                if let Some(mut state) = state.take() {
                    state.handle.release();
                }
                let _ = reply.send(());
            },
            Command::ApplyParameters(batch) => {
                if let Some(state) = state.as_mut() {
                    if let Err(_err) = state.handle.apply_parameters(&batch) {
                        #[cfg(feature = "tracing")]
                        asimov_module::tracing::warn!(
                            target: "asimov_camera_session",
                            error = %_err,
                            "parameter write rejected"
                        );
                    }
                }
            },
            Command::SetFrameNotification(enabled) => {
                if let Some(state) = state.as_mut() {
                    state.handle.set_frame_notification(enabled);
                }
            },
            Command::StartPreview => {
                if let Some(state) = state.as_mut() {
                    // a fire-and-forget failure still has to reach the
                    // session; surface it as the asynchronous event it
                    // would otherwise have produced
                    if let Err(err) = state.handle.start_preview() {
                        state.sink.post(HandleEvent::PreviewFailed {
                            reason: err.to_string(),
                        });
                    }
                }
            },
            Command::StopPreview => {
                if let Some(state) = state.as_mut() {
                    state.handle.stop_preview();
                }
            },
            Command::Exit { done } => {
                if let Some(mut state) = state.take() {
                    state.handle.release();
                }
                let _ = done.send(());
                break;
            },
        }
    }
}

fn with_handle<T>(
    state: &mut Option<WorkerState>,
    f: impl FnOnce(&mut dyn NativeCameraHandle) -> Result<T, CameraError>,
) -> Result<T, CameraError> {
    match state.as_mut() {
        Some(state) => f(state.handle.as_mut()),
        None => Err(CameraError::NotOpen),
    }
}
