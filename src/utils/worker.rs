//! Long-running worker threads with cooperative shutdown.
//!
//! Every background component (output loop, cursor writer, ack reader) runs
//! as one thread behind a [`Worker`]. `stop()` raises the stopping flag,
//! gives the task a chance to issue non-blocking wakeups (`on_stopping`),
//! joins the thread, then runs `on_stop` cleanup. A worker can be started
//! again after a stop; the output restarts its cursor writer on every
//! reconnect.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::error;
use parking_lot::{Condvar, Mutex};

/// A task hosted by a [`Worker`] thread.
pub trait Runnable: Send + Sync + 'static {
    /// Thread body. Must return promptly once `ctl.is_stopping()` is set.
    fn run(&self, ctl: &WorkerCtl);

    /// Runs on the stopping thread before the join. Non-blocking wakeups only.
    fn on_stopping(&self) {}

    /// Runs on the stopping thread after the join.
    fn on_stop(&self) {}
}

/// Stop flag plus a cancellable sleep, shared with the hosted task.
pub struct WorkerCtl {
    stopping: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl WorkerCtl {
    fn new() -> Self {
        WorkerCtl {
            stopping: AtomicBool::new(false),
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Sleep up to `millis`, returning `true` when cut short by a stop request.
    pub fn sleep(&self, millis: u64) -> bool {
        let deadline = Instant::now() + Duration::from_millis(millis);
        let mut guard = self.lock.lock();
        while !self.is_stopping() {
            if self.cond.wait_until(&mut guard, deadline).timed_out() {
                return self.is_stopping();
            }
        }
        true
    }

    fn wake(&self) {
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }
}

/// Owns one background thread and its lifecycle.
pub struct Worker {
    task: Arc<dyn Runnable>,
    ctl: Arc<WorkerCtl>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub fn new(task: Arc<dyn Runnable>) -> Worker {
        Worker {
            task,
            ctl: Arc::new(WorkerCtl::new()),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the thread. No-op while already running.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }
        self.ctl.stopping.store(false, Ordering::SeqCst);
        let task = self.task.clone();
        let ctl = self.ctl.clone();
        *handle = Some(thread::spawn(move || task.run(&ctl)));
    }

    /// Request a stop, join the thread, then run `on_stop`. No-op when not
    /// running.
    pub fn stop(&self) {
        let handle = self.handle.lock().take();
        let Some(handle) = handle else {
            return;
        };
        self.ctl.stopping.store(true, Ordering::SeqCst);
        self.task.on_stopping();
        self.ctl.wake();
        if handle.join().is_err() {
            error!("worker thread panicked");
        }
        self.task.on_stop();
    }

    pub fn is_stopping(&self) -> bool {
        self.ctl.is_stopping()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    struct TickTask {
        ticks: AtomicU64,
        stops: AtomicU64,
    }

    impl Runnable for TickTask {
        fn run(&self, ctl: &WorkerCtl) {
            while !ctl.sleep(5) {
                self.ticks.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn start_stop_runs_task_and_hooks() {
        let task = Arc::new(TickTask {
            ticks: AtomicU64::new(0),
            stops: AtomicU64::new(0),
        });
        let worker = Worker::new(task.clone());
        worker.start();
        thread::sleep(Duration::from_millis(50));
        worker.stop();
        assert!(task.ticks.load(Ordering::SeqCst) > 0);
        assert_eq!(task.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_without_start_is_noop() {
        let task = Arc::new(TickTask {
            ticks: AtomicU64::new(0),
            stops: AtomicU64::new(0),
        });
        let worker = Worker::new(task.clone());
        worker.stop();
        assert_eq!(task.stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn worker_restarts_after_stop() {
        let task = Arc::new(TickTask {
            ticks: AtomicU64::new(0),
            stops: AtomicU64::new(0),
        });
        let worker = Worker::new(task.clone());
        worker.start();
        worker.stop();
        let after_first = task.ticks.load(Ordering::SeqCst);
        worker.start();
        thread::sleep(Duration::from_millis(30));
        worker.stop();
        assert!(task.ticks.load(Ordering::SeqCst) >= after_first);
        assert_eq!(task.stops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn sleep_is_cancelled_by_stop() {
        struct SleepTask;
        impl Runnable for SleepTask {
            fn run(&self, ctl: &WorkerCtl) {
                assert!(ctl.sleep(60_000));
            }
        }
        let worker = Worker::new(Arc::new(SleepTask));
        worker.start();
        let start = Instant::now();
        thread::sleep(Duration::from_millis(20));
        worker.stop();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
