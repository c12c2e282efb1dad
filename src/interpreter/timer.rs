//! One-Shot Timer
//!
//! Runs a callback on a dedicated thread after a delay unless stopped
//! first. The timeout supervisor delegates to this instead of owning a
//! thread itself.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub struct OneShotTimer {
    cancel: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl OneShotTimer {
    /// Start the timer. The callback runs on the timer thread when `delay`
    /// elapses without a `stop`.
    pub fn start<F>(delay: Duration, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (cancel, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = rx.recv_timeout(delay) {
                callback();
            }
        });
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Stop the timer. The callback does not run unless it already fired.
    pub fn stop(&mut self) {
        let _ = self.cancel.send(());
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        let _ = self.cancel.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
