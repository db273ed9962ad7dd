use std::sync::mpsc;
use std::thread;

/// Handle to control and join a background worker thread.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub(crate) fn new(shutdown: mpsc::Sender<()>, join: thread::JoinHandle<()>) -> Self {
        Self {
            shutdown,
            join: Some(join),
        }
    }

    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }
}
