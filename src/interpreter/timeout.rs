//! Timeout Supervisor
//!
//! Tracks every process spawned while evaluating one command tree and
//! terminates the whole set (including descendants) when the per-test
//! timeout expires. Cancellation is unrecoverable: once the flag is set,
//! every evaluator entry short-circuits to the timeout sentinel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::warn;

use super::timer::OneShotTimer;

/// PID registry shared between the evaluating thread and the timer thread.
#[derive(Default)]
struct Registry {
    procs: Vec<u32>,
    /// Set once the timer's kill pass has run; late registrations must then
    /// be killed by the registering thread.
    done_kill_pass: bool,
}

pub struct TimeoutSupervisor {
    timeout_ms: u64,
    registry: Arc<Mutex<Registry>>,
    timeout_reached: Arc<AtomicBool>,
    timer: Option<OneShotTimer>,
}

impl TimeoutSupervisor {
    /// A zero timeout disables supervision.
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            registry: Arc::new(Mutex::new(Registry::default())),
            timeout_reached: Arc::new(AtomicBool::new(false)),
            timer: None,
        }
    }

    pub fn active(&self) -> bool {
        self.timeout_ms > 0
    }

    /// Schedule the single-shot expiry.
    pub fn start_timer(&mut self) {
        if !self.active() {
            return;
        }
        let registry = Arc::clone(&self.registry);
        let flag = Arc::clone(&self.timeout_reached);
        let timeout_ms = self.timeout_ms;
        self.timer = Some(OneShotTimer::start(
            Duration::from_millis(timeout_ms),
            move || {
                flag.store(true, Ordering::SeqCst);
                warn!(timeout_ms, "test timeout expired, killing process trees");
                run_kill_pass(&registry);
            },
        ));
    }

    /// Stop the timer; no effect on an already-fired kill pass.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.as_mut() {
            timer.stop();
        }
    }

    pub fn timeout_reached(&self) -> bool {
        self.timeout_reached.load(Ordering::SeqCst)
    }

    /// Register a spawned child. If the kill pass already ran, the child is
    /// killed immediately, outside the registry lock, so the timer callback
    /// cannot deadlock against this thread.
    pub fn add_process(&self, pid: u32) {
        if !self.active() {
            return;
        }
        let need_kill = {
            let mut registry = lock_registry(&self.registry);
            registry.procs.push(pid);
            registry.done_kill_pass
        };
        if need_kill {
            debug_assert!(self.timeout_reached());
            kill_process_tree(pid);
        }
    }
}

fn lock_registry(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn run_kill_pass(registry: &Mutex<Registry>) {
    let mut registry = lock_registry(registry);
    for pid in registry.procs.drain(..) {
        kill_process_tree(pid);
    }
    registry.done_kill_pass = true;
}

/// Kill a process and its descendants. Children are spawned into their own
/// process group, so the negative-pid form reaches the whole tree.
#[cfg(unix)]
pub fn kill_process_tree(pid: u32) {
    // SAFETY: plain syscall; an already-reaped pid yields ESRCH, ignored.
    unsafe {
        libc::kill(-(pid as i32), libc::SIGKILL);
    }
}

#[cfg(windows)]
pub fn kill_process_tree(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .output();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_inactive_supervisor_never_reaches_timeout() {
        let mut supervisor = TimeoutSupervisor::new(0);
        supervisor.start_timer();
        assert!(!supervisor.active());
        thread::sleep(Duration::from_millis(20));
        assert!(!supervisor.timeout_reached());
    }

    #[test]
    fn test_timeout_flag_set_on_expiry() {
        let mut supervisor = TimeoutSupervisor::new(10);
        supervisor.start_timer();
        thread::sleep(Duration::from_millis(150));
        assert!(supervisor.timeout_reached());
        supervisor.cancel();
    }

    #[test]
    fn test_cancel_before_expiry() {
        let mut supervisor = TimeoutSupervisor::new(60_000);
        supervisor.start_timer();
        supervisor.cancel();
        assert!(!supervisor.timeout_reached());
    }

    #[cfg(unix)]
    #[test]
    fn test_expiry_kills_registered_process() {
        use std::os::unix::process::CommandExt;
        use std::process::Command;

        let mut child = Command::new("/bin/sh")
            .args(["-c", "sleep 30"])
            .process_group(0)
            .spawn()
            .unwrap();
        let mut supervisor = TimeoutSupervisor::new(20);
        supervisor.start_timer();
        supervisor.add_process(child.id());
        let status = child.wait().unwrap();
        supervisor.cancel();
        assert!(supervisor.timeout_reached());
        assert!(!status.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_late_registration_killed_immediately() {
        use std::os::unix::process::CommandExt;
        use std::process::Command;

        let mut supervisor = TimeoutSupervisor::new(5);
        supervisor.start_timer();
        thread::sleep(Duration::from_millis(100));
        assert!(supervisor.timeout_reached());

        let mut child = Command::new("/bin/sh")
            .args(["-c", "sleep 30"])
            .process_group(0)
            .spawn()
            .unwrap();
        supervisor.add_process(child.id());
        let status = child.wait().unwrap();
        supervisor.cancel();
        assert!(!status.success());
    }
}
