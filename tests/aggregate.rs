use std::sync::Mutex;
use std::thread;

use rankscan::aggregate::Aggregator;
use rankscan::domain::RankRecord;
use rankscan::error::RankscanError;
use rankscan::persist::Persister;
use rankscan::sort::is_sorted_by_rank;

#[derive(Default)]
struct RecordingPersister {
    flushes: Mutex<Vec<Vec<RankRecord>>>,
    appended: Mutex<Vec<RankRecord>>,
}

impl Persister for RecordingPersister {
    fn flush(&self, records: &[RankRecord]) -> Result<(), RankscanError> {
        self.flushes.lock().unwrap().push(records.to_vec());
        Ok(())
    }

    fn append(&self, record: &RankRecord) -> Result<(), RankscanError> {
        self.appended.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[test]
fn concurrent_inserts_are_all_kept() {
    let aggregator = Aggregator::new();
    let producers = 64;
    thread::scope(|scope| {
        for id in 0..producers {
            let aggregator = &aggregator;
            scope.spawn(move || {
                aggregator.insert(RankRecord::new(format!("ref-{id}"), (id * 7 % 13) as i64));
            });
        }
    });

    let snapshot = aggregator.snapshot();
    assert_eq!(snapshot.len(), producers);
    let mut references: Vec<String> = snapshot.into_iter().map(|r| r.reference).collect();
    references.sort();
    references.dedup();
    assert_eq!(references.len(), producers);
}

#[test]
fn insert_reports_running_count() {
    let aggregator = Aggregator::new();
    assert!(aggregator.is_empty());
    assert_eq!(aggregator.insert(RankRecord::new("a", 3)), 1);
    assert_eq!(aggregator.insert(RankRecord::new("b", 1)), 2);
    assert_eq!(aggregator.len(), 2);
}

#[test]
fn flush_writes_sorted_records() {
    let aggregator = Aggregator::new();
    for (reference, rank) in [("a", 30), ("b", 10), ("c", 20)] {
        aggregator.insert(RankRecord::new(reference, rank));
    }
    let persister = RecordingPersister::default();
    assert_eq!(aggregator.sort_and_flush(&persister).unwrap(), 3);

    let flushes = persister.flushes.lock().unwrap();
    let ranks: Vec<i64> = flushes[0].iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![10, 20, 30]);
    assert_eq!(aggregator.sorted_snapshot(), flushes[0]);
}

#[test]
fn flushes_interleaved_with_inserts_are_always_sorted() {
    let aggregator = Aggregator::new();
    let persister = RecordingPersister::default();
    thread::scope(|scope| {
        for worker in 0..8i64 {
            let aggregator = &aggregator;
            let persister = &persister;
            scope.spawn(move || {
                for step in 0..25i64 {
                    let rank = (worker * 31 + step * 17) % 101;
                    let held = aggregator.insert(RankRecord::new(format!("{worker}-{step}"), rank));
                    if held % 10 == 0 {
                        aggregator.sort_and_flush(persister).unwrap();
                    }
                }
            });
        }
    });

    let flushes = persister.flushes.lock().unwrap();
    assert_eq!(flushes.len(), 20);
    assert!(flushes.iter().all(|records| is_sorted_by_rank(records)));
    assert_eq!(aggregator.len(), 200);
}

#[test]
fn insert_and_append_forwards_record() {
    let aggregator = Aggregator::new();
    let persister = RecordingPersister::default();
    let held = aggregator
        .insert_and_append(RankRecord::new("a", 5), &persister)
        .unwrap();
    assert_eq!(held, 1);
    assert_eq!(persister.appended.lock().unwrap().len(), 1);
    assert!(persister.flushes.lock().unwrap().is_empty());
}
