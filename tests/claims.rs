mod support;

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use postbox::{
    BackoffTrigger, Dispatcher, InMemoryMailStore, MailId, MailRecord, MailState, MailStore,
    StoreError,
};
use support::scripted_transport::ScriptedTransport;
use support::{create, init_tracing};

#[test]
fn exactly_one_concurrent_claim_wins() {
    init_tracing();
    let store = InMemoryMailStore::new();
    let id = create(&store, "contested");

    let callers = 16;
    let barrier = Arc::new(Barrier::new(callers));
    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let store = store.clone();
            let barrier = barrier.clone();
            let id = id.clone();
            thread::spawn(move || {
                barrier.wait();
                store.claim(&id).unwrap()
            })
        })
        .collect();

    let results: Vec<Option<MailRecord>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
    assert_eq!(results.iter().filter(|r| r.is_none()).count(), callers - 1);

    let record = store.get(&id).unwrap().unwrap();
    assert_eq!(record.state(), MailState::Claimed);
    assert_eq!(record.attempts(), 1);
}

#[test]
fn dispatchers_sharing_a_store_send_each_mail_once() {
    init_tracing();
    let store = InMemoryMailStore::new();
    let transport = ScriptedTransport::new().with_delay(Duration::from_millis(2));
    let subjects: Vec<String> = (0..40).map(|n| format!("mail-{}", n)).collect();
    for subject in &subjects {
        create(&store, subject);
    }

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dispatcher = Dispatcher::new(store.clone(), transport.clone());
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                dispatcher.run_once(&mut BackoffTrigger::default()).unwrap()
            })
        })
        .collect();

    let reports: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(reports.iter().map(|r| r.sent).sum::<usize>(), subjects.len());
    for subject in &subjects {
        assert_eq!(transport.attempts_for(subject), 1, "{} sent more than once", subject);
    }
    assert!(store.list_pending_ids().unwrap().is_empty());
}

/// Store whose pending list goes stale: every listed id is claimed by
/// somebody else before the dispatcher gets to it.
struct RacingStore {
    inner: InMemoryMailStore,
}

impl MailStore for RacingStore {
    fn create(&self, payload: Vec<u8>) -> Result<MailRecord, StoreError> {
        self.inner.create(payload)
    }

    fn list_pending_ids(&self) -> Result<Vec<MailId>, StoreError> {
        let ids = self.inner.list_pending_ids()?;
        for id in &ids {
            self.inner.claim(id)?;
        }
        Ok(ids)
    }

    fn claim(&self, id: &MailId) -> Result<Option<MailRecord>, StoreError> {
        self.inner.claim(id)
    }

    fn update(&self, record: &MailRecord) -> Result<(), StoreError> {
        self.inner.update(record)
    }

    fn delete(&self, id: &MailId) -> Result<bool, StoreError> {
        self.inner.delete(id)
    }

    fn get(&self, id: &MailId) -> Result<Option<MailRecord>, StoreError> {
        self.inner.get(id)
    }

    fn reclaim_stale(&self, older_than: Duration) -> Result<Vec<MailId>, StoreError> {
        self.inner.reclaim_stale(older_than)
    }
}

#[test]
fn lost_claims_are_skipped() {
    init_tracing();
    let inner = InMemoryMailStore::new();
    create(&inner, "A");
    create(&inner, "B");
    let transport = ScriptedTransport::new();
    let dispatcher = Dispatcher::new(RacingStore { inner }, transport.clone());

    let mut trigger = BackoffTrigger::default();
    let report = dispatcher.run_once(&mut trigger).unwrap();

    assert_eq!(report.pending, 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.claimed, 0);
    assert!(transport.attempts().is_empty());
    assert_eq!(trigger.current_delay(), trigger.base());
}

#[test]
fn deleted_mail_is_skipped() {
    init_tracing();
    let store = InMemoryMailStore::new();
    let id = create(&store, "gone");
    store.delete(&id).unwrap();

    assert_eq!(store.claim(&id).unwrap(), None);
}

#[test]
fn outcome_of_a_reclaimed_mail_is_not_overwritten() {
    init_tracing();
    let store = InMemoryMailStore::new();
    let id = create(&store, "slow");

    let mut first = store.claim(&id).unwrap().unwrap();
    store.reclaim_stale(Duration::ZERO).unwrap();
    let second = store.claim(&id).unwrap().unwrap();
    assert_eq!(second.attempts(), 2);

    first.mark_sent();
    assert!(matches!(
        store.update(&first),
        Err(StoreError::ConcurrentWrite { expected: 1, actual: 2, .. })
    ));
    assert_eq!(store.get(&id).unwrap().unwrap().state(), MailState::Claimed);
}
