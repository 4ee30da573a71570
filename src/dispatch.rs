use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use crate::domain::{DispatchMode, IdRange, ProfileId};

/// Cooperative stop signal. Checked between windows, or before each id is
/// taken in pool mode; in-flight tasks always run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    parents: Vec<Arc<AtomicBool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is cancelled when either it or `self` is cancelled.
    /// Cancelling the child leaves `self` untouched.
    pub fn child(&self) -> Self {
        let mut parents = self.parents.clone();
        parents.push(Arc::clone(&self.cancelled));
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            parents,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self
                .parents
                .iter()
                .any(|parent| parent.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub dispatched: u64,
    pub cancelled: bool,
}

/// Runs one task per id with at most `width` tasks in flight.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    width: usize,
    mode: DispatchMode,
}

impl Dispatcher {
    pub fn new(width: usize, mode: DispatchMode) -> Self {
        Self {
            width: width.max(1),
            mode,
        }
    }

    /// Blocks until every id in `range` went through `task`, or until `cancel`
    /// fires and the tasks already started have finished.
    pub fn run<F>(&self, range: IdRange, cancel: &CancelToken, task: F) -> DispatchReport
    where
        F: Fn(ProfileId) + Sync,
    {
        let dispatched = AtomicU64::new(0);
        match self.mode {
            DispatchMode::Window => self.run_windows(range, cancel, &task, &dispatched),
            DispatchMode::Pool => self.run_pool(range, cancel, &task, &dispatched),
        }
        let dispatched = dispatched.into_inner();
        DispatchReport {
            dispatched,
            cancelled: dispatched < range.id_count(),
        }
    }

    fn run_windows<F>(&self, range: IdRange, cancel: &CancelToken, task: &F, dispatched: &AtomicU64)
    where
        F: Fn(ProfileId) + Sync,
    {
        for window in range.windows(self.width) {
            if cancel.is_cancelled() {
                tracing::info!(next = ?window.first(), "dispatch cancelled at window boundary");
                break;
            }
            // Every task in the window is started before the scope waits on any.
            thread::scope(|scope| {
                for id in window {
                    dispatched.fetch_add(1, Ordering::Relaxed);
                    scope.spawn(move || task(id));
                }
            });
        }
    }

    fn run_pool<F>(&self, range: IdRange, cancel: &CancelToken, task: &F, dispatched: &AtomicU64)
    where
        F: Fn(ProfileId) + Sync,
    {
        let cursor = AtomicU64::new(0);
        let workers = (self.width as u64).min(range.id_count()) as usize;
        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let offset = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(id) = range.nth_id(offset) else {
                            break;
                        };
                        dispatched.fetch_add(1, Ordering::Relaxed);
                        task(id);
                    }
                });
            }
        });
    }
}
