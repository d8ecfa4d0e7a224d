use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Condvar, Mutex};
use std::thread;

use apitrail::data_capture::serializer::serialize;
use apitrail::session_management::{
    segment_name, split_at_marker, RotationEngine, RotationSettings,
};
use apitrail::storage::{
    FileSegmentStore, FileSessionIndex, MemorySegmentStore, MemorySessionIndex, SegmentStore,
    SessionIndex, SessionState,
};
use apitrail::{StorageError, TransactionRecord};
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use tempfile::TempDir;

const AGENT: &str = "agent1";
const SESSION: &str = "sess1";

/// 10:00 at UTC-8 on 2024-05-10; the default cutoff is 2024-05-10T08:00Z.
fn today() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 18, 0, 0).unwrap()
}

fn yesterday() -> DateTime<Utc> {
    today() - Duration::days(1)
}

/// Segment name under the default settings.
fn name_at(ts: DateTime<Utc>) -> String {
    segment_name(ts, SESSION, &RotationSettings::default())
}

fn rec(uri: &str, status: Option<i32>) -> TransactionRecord {
    TransactionRecord {
        request_uri: uri.to_string(),
        status_code: status,
        http_date: Some("Fri, 10 May 2024 18:00:00 GMT".into()),
        local_time: Some("2024-05-10T10:00:00-08:00".into()),
        request_body: Some("{}".into()),
        response_body: Some("ok".into()),
    }
}

fn lines(records: &[TransactionRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{}\n", serialize(AGENT, SESSION, r)))
        .collect()
}

fn memory_engine() -> (Arc<MemorySessionIndex>, Arc<MemorySegmentStore>, RotationEngine) {
    let index = Arc::new(MemorySessionIndex::new());
    let store = Arc::new(MemorySegmentStore::new());
    let engine = RotationEngine::new(index.clone(), store.clone(), RotationSettings::default());
    (index, store, engine)
}

/// Seeds `SESSION` with a segment started yesterday holding one line.
fn seed_stale(index: &dyn SessionIndex, store: &dyn SegmentStore) -> SessionState {
    let state = SessionState::new(SESSION, name_at(yesterday()), yesterday());
    store.create(&state.segment_name).unwrap();
    store.append_text(&state.segment_name, "seed\n").unwrap();
    index.put(&state).unwrap();
    state
}

#[test]
fn scenario_a_first_write_starts_a_segment() {
    let (index, store, engine) = memory_engine();
    let r1 = rec("/api/orders", Some(200));

    let report = engine.write_at(AGENT, SESSION, &[r1.clone()], today()).unwrap();

    let expected_name = name_at(today());
    assert_eq!(expected_name, "2024-05-10_sess1.tsv");
    assert!(report.started_segment);
    assert_eq!(report.writes.len(), 1);
    assert_eq!(report.writes[0].segment_name, expected_name);
    assert_eq!(report.writes[0].lines, 1);

    let state = index.get(SESSION).unwrap().unwrap();
    assert_eq!(state, SessionState::new(SESSION, expected_name.clone(), today()));
    assert_eq!(store.contents(&expected_name).unwrap(), lines(&[r1]));
    assert_eq!(store.create_count(&expected_name), 1);
}

#[test]
fn scenario_b_marker_splits_a_stale_batch() {
    let (index, store, engine) = memory_engine();
    let old = seed_stale(index.as_ref(), store.as_ref());
    let batch = vec![
        rec("/api/orders", Some(200)),
        rec("/agent/reconnect", None),
        rec("/api/items", Some(404)),
    ];

    let report = engine.write_at(AGENT, SESSION, &batch, today()).unwrap();

    let new_name = name_at(today());
    assert!(report.started_segment);
    assert_eq!(report.writes.len(), 2);
    assert_eq!(report.writes[0].segment_name, old.segment_name);
    assert_eq!(report.writes[0].lines, 2);
    assert_eq!(report.writes[1].segment_name, new_name);
    assert_eq!(report.writes[1].lines, 2);

    assert_eq!(
        store.contents(&old.segment_name).unwrap(),
        format!("seed\n{}", lines(&batch[..2]))
    );
    assert_eq!(store.contents(&new_name).unwrap(), lines(&batch[1..]));

    let state = index.get(SESSION).unwrap().unwrap();
    assert_eq!(state.segment_name, new_name);
    assert_eq!(state.segment_created, today());
}

#[test]
fn scenario_c_no_marker_defers_rotation() {
    let (index, store, engine) = memory_engine();
    let old = seed_stale(index.as_ref(), store.as_ref());
    let batch = vec![rec("/api/orders", Some(200)), rec("/api/items", Some(200))];

    let report = engine.write_at(AGENT, SESSION, &batch, today()).unwrap();

    assert!(!report.started_segment);
    assert_eq!(report.writes.len(), 1);
    assert_eq!(report.writes[0].segment_name, old.segment_name);
    assert_eq!(index.get(SESSION).unwrap(), Some(old.clone()));
    assert_eq!(store.names(), vec![old.segment_name.clone()]);
    assert_eq!(
        store.contents(&old.segment_name).unwrap(),
        format!("seed\n{}", lines(&batch))
    );
}

#[test]
fn marker_as_first_record_still_lands_on_both_segments() {
    let (index, store, engine) = memory_engine();
    let old = seed_stale(index.as_ref(), store.as_ref());
    let batch = vec![rec("/reconnect", None), rec("/api/items", Some(200))];

    engine.write_at(AGENT, SESSION, &batch, today()).unwrap();

    assert_eq!(
        store.contents(&old.segment_name).unwrap(),
        format!("seed\n{}", lines(&batch[..1]))
    );
    assert_eq!(
        store.contents(&name_at(today())).unwrap(),
        lines(&batch)
    );
}

#[test]
fn rotation_later_the_same_utc_day_starts_a_new_segment() {
    let (index, store, engine) = memory_engine();
    // 18:00 on May 9 at UTC-8, so stale by 18:00Z on May 10
    let early = Utc.with_ymd_and_hms(2024, 5, 10, 2, 0, 0).unwrap();
    let first = vec![rec("/x", Some(200))];
    engine.write_at(AGENT, SESSION, &first, early).unwrap();
    let old_name = name_at(early);

    let batch = vec![rec("/y", Some(200)), rec("/reconnect", None)];
    let report = engine.write_at(AGENT, SESSION, &batch, today()).unwrap();

    let new_name = index.get(SESSION).unwrap().unwrap().segment_name;
    assert_eq!(old_name, "2024-05-09_sess1.tsv");
    assert_eq!(new_name, "2024-05-10_sess1.tsv");
    assert_ne!(old_name, new_name);
    assert!(report.started_segment);
    assert_eq!(report.writes[0].segment_name, old_name);
    assert_eq!(report.writes[1].segment_name, new_name);

    let mut old_expected = lines(&first);
    old_expected.push_str(&lines(&batch));
    assert_eq!(store.contents(&old_name).unwrap(), old_expected);
    assert_eq!(store.contents(&new_name).unwrap(), lines(&batch[1..]));
    assert_eq!(store.create_count(&old_name), 1);
    assert_eq!(store.create_count(&new_name), 1);
}

#[test]
fn rotation_time_shifts_the_day_boundary() {
    let index = Arc::new(MemorySessionIndex::new());
    let store = Arc::new(MemorySegmentStore::new());
    let settings = RotationSettings {
        rotation_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        ..RotationSettings::default()
    };
    let engine = RotationEngine::new(index.clone(), store.clone(), settings.clone());

    // 04:00, 05:00 and 07:00 local on May 10; the boundary is 06:00 local
    let at_four = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
    let at_five = at_four + Duration::hours(1);
    let at_seven = at_four + Duration::hours(3);

    engine
        .write_at(AGENT, SESSION, &[rec("/a", Some(200))], at_four)
        .unwrap();
    let old_name = segment_name(at_four, SESSION, &settings);
    assert_eq!(old_name, "2024-05-09_sess1.tsv");

    let report = engine
        .write_at(AGENT, SESSION, &[rec("/b", None), rec("/reconnect", None)], at_five)
        .unwrap();
    assert!(!report.started_segment);
    assert_eq!(store.names(), vec![old_name.clone()]);

    let batch = vec![rec("/c", None), rec("/reconnect", None)];
    let report = engine.write_at(AGENT, SESSION, &batch, at_seven).unwrap();
    let state = index.get(SESSION).unwrap().unwrap();
    assert!(report.started_segment);
    assert_eq!(state.segment_name, "2024-05-10_sess1.tsv");
    assert_eq!(state.segment_created, at_seven);
    assert_eq!(store.names(), vec![old_name, state.segment_name.clone()]);
    assert_eq!(store.contents(&state.segment_name).unwrap(), lines(&batch[1..]));
}

/// Session index whose first two `get` calls wait for each other, so both
/// writers observe the same stale state before either replaces it.
///
/// With `hold_second_put`, the second `put` blocks until one writer has
/// called `finish`, so one whole write lands before the other's tail.
struct RendezvousIndex {
    inner: MemorySessionIndex,
    barrier: Barrier,
    gets: AtomicUsize,
    puts: AtomicUsize,
    hold_second_put: bool,
    finished: Mutex<usize>,
    finished_cv: Condvar,
}

impl RendezvousIndex {
    fn new(hold_second_put: bool) -> Self {
        Self {
            inner: MemorySessionIndex::new(),
            barrier: Barrier::new(2),
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            hold_second_put,
            finished: Mutex::new(0),
            finished_cv: Condvar::new(),
        }
    }

    fn finish(&self) {
        *self.finished.lock().unwrap() += 1;
        self.finished_cv.notify_all();
    }
}

impl SessionIndex for RendezvousIndex {
    fn ensure_exists(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn get(&self, session_id: &str) -> Result<Option<SessionState>, StorageError> {
        let state = self.inner.get(session_id);
        if self.gets.fetch_add(1, Ordering::SeqCst) < 2 {
            self.barrier.wait();
        }
        state
    }

    fn put(&self, state: &SessionState) -> Result<(), StorageError> {
        let ticket = self.puts.fetch_add(1, Ordering::SeqCst);
        if self.hold_second_put && ticket == 1 {
            let mut done = self.finished.lock().unwrap();
            while *done == 0 {
                done = self.finished_cv.wait(done).unwrap();
            }
        }
        self.inner.put(state)
    }
}

#[test]
fn scenario_d_same_day_rotations_share_the_new_segment() {
    let index = Arc::new(RendezvousIndex::new(true));
    let store = Arc::new(MemorySegmentStore::new());
    let stale_at = today() - Duration::days(3);
    let stale = SessionState::new(SESSION, name_at(stale_at), stale_at);
    index.inner.put(&stale).unwrap();
    store.create(&stale.segment_name).unwrap();

    let engine = RotationEngine::new(index.clone(), store.clone(), RotationSettings::default());
    let first_now = today();
    let second_now = today() + Duration::hours(1);
    let one = vec![rec("/one", None), rec("/reconnect", None)];
    let two = vec![rec("/two", None), rec("/reconnect", None)];

    thread::scope(|s| {
        for (batch, now) in [(&one, first_now), (&two, second_now)] {
            let engine = &engine;
            let index = &index;
            s.spawn(move || {
                let result = engine.write_at(AGENT, SESSION, batch, now);
                index.finish();
                result.unwrap()
            });
        }
    });

    // both writers derive the same name, so nothing is orphaned
    let new_name = name_at(first_now);
    assert_eq!(new_name, name_at(second_now));
    assert_eq!(index.puts.load(Ordering::SeqCst), 2);
    assert_eq!(store.names().len(), 2);
    assert_eq!(store.create_count(&new_name), 1);

    // each marker line lands once in the shared segment and once in the stale one
    let marker_lines = lines(&one[1..]).repeat(2);
    assert_eq!(store.contents(&new_name).unwrap(), marker_lines);
    let stale_content = store.contents(&stale.segment_name).unwrap();
    assert_eq!(stale_content.lines().count(), 4);
    assert!(stale_content.contains(&lines(&one[..1])));
    assert!(stale_content.contains(&lines(&two[..1])));

    // last replace wins
    let current = index.get(SESSION).unwrap().unwrap();
    assert_eq!(current.segment_name, new_name);
    assert!(current.segment_created == first_now || current.segment_created == second_now);
}

#[test]
fn concurrent_rotations_across_a_day_boundary_orphan_a_segment() {
    let index = Arc::new(RendezvousIndex::new(false));
    let store = Arc::new(MemorySegmentStore::new());
    let stale_at = today() - Duration::days(3);
    let stale = SessionState::new(SESSION, name_at(stale_at), stale_at);
    index.inner.put(&stale).unwrap();
    store.create(&stale.segment_name).unwrap();

    let engine = RotationEngine::new(index.clone(), store.clone(), RotationSettings::default());
    let first_now = today();
    let second_now = today() + Duration::days(1);

    thread::scope(|s| {
        let engine = &engine;
        s.spawn(move || {
            engine
                .write_at(AGENT, SESSION, &[rec("/reconnect", None)], first_now)
                .unwrap()
        });
        s.spawn(move || {
            engine
                .write_at(AGENT, SESSION, &[rec("/reconnect", None)], second_now)
                .unwrap()
        });
    });

    let first_name = name_at(first_now);
    let second_name = name_at(second_now);
    assert_eq!(index.puts.load(Ordering::SeqCst), 2);
    assert!(store.contents(&first_name).is_some());
    assert!(store.contents(&second_name).is_some());

    // last replace wins; the other new segment is left unreferenced
    let current = index.get(SESSION).unwrap().unwrap();
    assert!(current.segment_name == first_name || current.segment_name == second_name);
    assert_ne!(first_name, second_name);
    assert_eq!(store.names().len(), 3);
    let stale_content = store.contents(&stale.segment_name).unwrap();
    assert_eq!(stale_content.lines().count(), 2);
}

/// Counts replaces without any synchronization of its own.
struct CountingIndex {
    inner: MemorySessionIndex,
    puts: AtomicUsize,
}

impl SessionIndex for CountingIndex {
    fn ensure_exists(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn get(&self, session_id: &str) -> Result<Option<SessionState>, StorageError> {
        self.inner.get(session_id)
    }

    fn put(&self, state: &SessionState) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(state)
    }
}

#[test]
fn session_locks_serialize_concurrent_rotations() {
    let index = Arc::new(CountingIndex {
        inner: MemorySessionIndex::new(),
        puts: AtomicUsize::new(0),
    });
    let store = Arc::new(MemorySegmentStore::new());
    seed_stale(index.as_ref(), store.as_ref());
    index.puts.store(0, Ordering::SeqCst);

    let engine = RotationEngine::new(index.clone(), store.clone(), RotationSettings::default())
        .with_session_locks();

    thread::scope(|s| {
        for _ in 0..8 {
            let engine = &engine;
            s.spawn(move || {
                engine
                    .write_at(AGENT, SESSION, &[rec("/reconnect", None)], today())
                    .unwrap()
            });
        }
    });

    assert_eq!(index.puts.load(Ordering::SeqCst), 1);
    let new_name = name_at(today());
    // one split (stale + new) then seven plain appends to the new segment
    assert_eq!(store.contents(&new_name).unwrap().lines().count(), 8);
    assert_eq!(store.create_count(&new_name), 1);
}

#[test]
fn split_preserves_order_in_both_parts() {
    let records: Vec<TransactionRecord> = (0..6)
        .map(|i| rec(&format!("/r{}", i), Some(200)))
        .collect();
    for marker_at in 0..records.len() {
        let mut batch = records.clone();
        batch[marker_at].request_uri = "/reconnect".into();
        let (before, from) = split_at_marker(&batch, "reconnect");
        assert_eq!(before, &batch[..=marker_at]);
        assert_eq!(from, &batch[marker_at..]);
        assert_eq!(before.last(), from.first());
        let rejoined: Vec<_> = before.iter().chain(from.iter().skip(1)).cloned().collect();
        assert_eq!(rejoined, batch);
    }
    let (before, from) = split_at_marker(&records, "reconnect");
    assert_eq!(before, &records[..]);
    assert!(from.is_empty());
}

#[test]
fn fresh_session_with_marker_does_not_split() {
    let (index, store, engine) = memory_engine();
    engine
        .write_at(AGENT, SESSION, &[rec("/a", Some(200))], today())
        .unwrap();
    let batch = vec![rec("/b", None), rec("/reconnect", None), rec("/c", None)];
    let report = engine
        .write_at(AGENT, SESSION, &batch, today() + Duration::hours(2))
        .unwrap();
    assert!(!report.started_segment);
    assert_eq!(store.names().len(), 1);
    assert_eq!(index.get(SESSION).unwrap().unwrap().segment_created, today());
}

#[test]
fn rotation_on_file_backends() {
    let dir = TempDir::new().unwrap();
    let index = Arc::new(FileSessionIndex::new(dir.path().join("index")));
    let store = Arc::new(FileSegmentStore::new(dir.path().join("segments")));
    let engine = RotationEngine::new(index.clone(), store.clone(), RotationSettings::default());

    let day_one = vec![rec("/a", Some(200)), rec("/b", Some(500))];
    engine.write_at(AGENT, SESSION, &day_one, yesterday()).unwrap();
    let old_name = name_at(yesterday());

    let day_two = vec![rec("/c", None), rec("/reconnect", None), rec("/d", Some(200))];
    engine.write_at(AGENT, SESSION, &day_two, today()).unwrap();
    let new_name = name_at(today());

    let mut old_expected = lines(&day_one);
    old_expected.push_str(&lines(&day_two[..2]));
    assert_eq!(store.read_segment(&old_name).unwrap(), old_expected);
    assert_eq!(store.read_segment(&new_name).unwrap(), lines(&day_two[1..]));
    assert_eq!(
        index.get(SESSION).unwrap(),
        Some(SessionState::new(SESSION, new_name, today()))
    );
}
