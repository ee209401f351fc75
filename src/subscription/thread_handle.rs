use std::sync::mpsc::{Receiver, Sender};
use std::thread::{JoinHandle, ThreadId};

use super::{Result, WorkerError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ThreadStatus {
    Running,
    Finished(Result<()>),
}

/// Owns a thread and the sending half of the channel used to talk to it.
///
/// Dropping the handle drops the sender, the thread is expected to notice
/// the disconnection and finish on its own.
pub(crate) struct ThreadHandle<M> {
    sender: Sender<M>,
    thread_handle: Option<JoinHandle<Result<()>>>,
    finished_thread_status_cached: Option<ThreadStatus>,
}

impl<M: Send + 'static> ThreadHandle<M> {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: FnOnce(Receiver<M>) -> Result<()>,
        F: Send + 'static,
    {
        let (sender, receiver) = std::sync::mpsc::channel();

        let t: JoinHandle<Result<()>> = std::thread::spawn(move || f(receiver));

        Self {
            sender,
            thread_handle: Some(t),
            finished_thread_status_cached: None,
        }
    }

    pub(crate) fn sender(&self) -> &Sender<M> {
        &self.sender
    }

    /// Id of the thread while it has not been joined.
    pub(crate) fn thread_id(&self) -> Option<ThreadId> {
        self.thread_handle.as_ref().map(|t| t.thread().id())
    }

    pub(crate) fn get_thread_status(&mut self) -> ThreadStatus {
        match self.thread_handle.take() {
            Some(t) => {
                if t.is_finished() {
                    let status = Self::finished_status(t);
                    self.finished_thread_status_cached = Some(status.clone());
                    status
                } else {
                    self.thread_handle = Some(t);
                    ThreadStatus::Running
                }
            }
            None => self.cached_status(),
        }
    }

    /// Blocks until the thread finishes.
    pub(crate) fn join(mut self) -> ThreadStatus {
        match self.thread_handle.take() {
            Some(t) => Self::finished_status(t),
            None => self.cached_status(),
        }
    }

    fn cached_status(&self) -> ThreadStatus {
        match &self.finished_thread_status_cached {
            Some(s) => s.clone(),
            None => ThreadStatus::Finished(Err(WorkerError::ThreadInternalError(
                "Thread status is not available".to_string(),
            ))),
        }
    }

    fn finished_status(t: JoinHandle<Result<()>>) -> ThreadStatus {
        match t.join() {
            Ok(r) => ThreadStatus::Finished(r),
            Err(e) => {
                let message = if let Some(panic_msg) = e.downcast_ref::<String>() {
                    format!("Thread panicked: {}", panic_msg)
                } else if let Some(panic_msg) = e.downcast_ref::<&str>() {
                    format!("Thread panicked: {}", panic_msg)
                } else {
                    "Thread panicked".to_string()
                };
                ThreadStatus::Finished(Err(WorkerError::ThreadInternalError(message)))
            }
        }
    }
}

impl<M> std::fmt::Debug for ThreadHandle<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("thread_handle", &self.thread_handle)
            .field(
                "finished_thread_status_cached",
                &self.finished_thread_status_cached,
            )
            .finish()
    }
}
