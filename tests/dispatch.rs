use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use rankscan::dispatch::{CancelToken, Dispatcher};
use rankscan::domain::{DispatchMode, IdRange, ProfileId};

struct InFlight {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    seen: Mutex<Vec<u64>>,
}

impl InFlight {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn visit(&self, id: ProfileId) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(2 + id.get() % 3));
        self.seen.lock().unwrap().push(id.get());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn seen_sorted(&self) -> Vec<u64> {
        let mut seen = self.seen.lock().unwrap().clone();
        seen.sort_unstable();
        seen
    }
}

fn assert_bounded_and_complete(mode: DispatchMode) {
    let range = IdRange::new(1, 23).unwrap();
    let tracker = InFlight::new();
    let report = Dispatcher::new(4, mode).run(range, &CancelToken::new(), |id| tracker.visit(id));

    assert_eq!(report.dispatched, 23);
    assert!(!report.cancelled);
    assert!(tracker.peak.load(Ordering::SeqCst) <= 4);
    assert_eq!(tracker.seen_sorted(), (1..=23).collect::<Vec<_>>());
}

#[test]
fn window_mode_bounds_in_flight_and_visits_each_id_once() {
    assert_bounded_and_complete(DispatchMode::Window);
}

#[test]
fn pool_mode_bounds_in_flight_and_visits_each_id_once() {
    assert_bounded_and_complete(DispatchMode::Pool);
}

#[test]
fn window_mode_waits_for_whole_window() {
    let width = 3u64;
    let range = IdRange::new(1, 12).unwrap();
    let completed = AtomicUsize::new(0);
    let violated = AtomicBool::new(false);

    Dispatcher::new(width as usize, DispatchMode::Window).run(range, &CancelToken::new(), |id| {
        let window = (id.get() - 1) / width;
        if (completed.load(Ordering::SeqCst) as u64) < window * width {
            violated.store(true, Ordering::SeqCst);
        }
        // The last id of each window is the slowest.
        let delay = if id.get() % width == 0 { 15 } else { 1 };
        thread::sleep(Duration::from_millis(delay));
        completed.fetch_add(1, Ordering::SeqCst);
    });

    assert!(!violated.load(Ordering::SeqCst));
    assert_eq!(completed.load(Ordering::SeqCst), 12);
}

#[test]
fn window_mode_stops_at_window_boundary() {
    let range = IdRange::new(1, 10).unwrap();
    let cancel = CancelToken::new();
    let seen = Mutex::new(Vec::new());
    let report = Dispatcher::new(2, DispatchMode::Window).run(range, &cancel, |id| {
        seen.lock().unwrap().push(id.get());
        if id.get() == 3 {
            cancel.cancel();
        }
    });

    assert!(report.cancelled);
    assert_eq!(report.dispatched, 4);
    let mut seen = seen.into_inner().unwrap();
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2, 3, 4]);
}

#[test]
fn pool_mode_stops_taking_new_ids() {
    let range = IdRange::new(1, 100).unwrap();
    let cancel = CancelToken::new();
    let report = Dispatcher::new(2, DispatchMode::Pool).run(range, &cancel, |_| {
        cancel.cancel();
    });
    assert!(report.cancelled);
    assert!(report.dispatched <= 2);
}

#[test]
fn pre_cancelled_token_dispatches_nothing() {
    let cancel = CancelToken::new();
    cancel.cancel();
    for mode in [DispatchMode::Window, DispatchMode::Pool] {
        let report = Dispatcher::new(3, mode).run(IdRange::new(1, 5).unwrap(), &cancel, |_| {
            panic!("no task should run");
        });
        assert_eq!(report.dispatched, 0);
        assert!(report.cancelled);
    }
}

#[test]
fn child_token_follows_parent_only() {
    let parent = CancelToken::new();
    let child = parent.child();
    child.cancel();
    assert!(child.is_cancelled());
    assert!(!parent.is_cancelled());

    let other = parent.child();
    parent.cancel();
    assert!(other.is_cancelled());
}
