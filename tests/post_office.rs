mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use postbox::{
    BackoffTrigger, BoundedTransport, Dispatcher, InMemoryMailStore, LogTransport, MailBody,
    MailState, MailStore, PostOffice, PostboxConfig,
};
use support::init_tracing;

#[test]
fn posted_mail_reaches_the_transport() {
    init_tracing();
    let config = PostboxConfig::from_json_str(r#"{"send_timeout_secs": 2}"#).unwrap();
    let store = InMemoryMailStore::new().with_retention(config.retention());
    let post_office = PostOffice::new(store.clone());

    let record = post_office
        .post_mail(
            "Your receipt",
            "Shop <shop@example.com>",
            &["Jane Doe <jane@example.com>", "accounts@example.com"],
            MailBody::HtmlWithText {
                html: "<p>Thanks!</p>".into(),
                text: "Thanks!".into(),
            },
        )
        .unwrap();
    let id = record.id().cloned().unwrap();

    let buffer = Arc::new(Mutex::new(Vec::new()));
    let transport = BoundedTransport::new(LogTransport::with_buffer(buffer.clone()));
    let dispatcher = Dispatcher::new(store.clone(), transport).with_send_timeout(config.send_timeout());

    let mut trigger = config.backoff_trigger();
    let report = dispatcher.run_once(&mut trigger).unwrap();

    assert_eq!(report.sent, 1);
    assert_eq!(store.get(&id).unwrap().unwrap().state(), MailState::Sent);

    let sent = buffer.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("[MAIL] shop@example.com -> jane@example.com, accounts@example.com"));
    assert!(sent[0].contains("Content-Type: multipart/alternative"));
}

#[test]
fn raw_payload_without_headers_fails_permanently() {
    init_tracing();
    let store = InMemoryMailStore::new();
    let post_office = PostOffice::new(store.clone());
    let id = post_office
        .post_encoded(b"Email Content".to_vec())
        .unwrap()
        .id()
        .cloned()
        .unwrap();

    let dispatcher = Dispatcher::new(store.clone(), LogTransport::new());
    let mut trigger = BackoffTrigger::default();
    let report = dispatcher.run_once(&mut trigger).unwrap();

    assert_eq!(report.failed, 1);
    let record = store.get(&id).unwrap().unwrap();
    assert_eq!(record.state(), MailState::Failed);
    assert!(record.last_error().is_some());
    assert!(!trigger.is_backing_off());
}

#[test]
fn snapshot_keeps_pending_mails_across_restarts() {
    init_tracing();
    let path = std::env::temp_dir().join(format!("postbox-it-{}.bin", std::process::id()));
    let store = InMemoryMailStore::new();
    let post_office = PostOffice::new(store.clone());
    let id = post_office
        .post_mail("Later", "a@example.com", &["b@example.com"], MailBody::Text("hi".into()))
        .unwrap()
        .id()
        .cloned()
        .unwrap();
    store.save_snapshot(&path).unwrap();

    let restored = InMemoryMailStore::load_snapshot(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(restored.list_pending_ids().unwrap(), vec![id.clone()]);

    let dispatcher = Dispatcher::new(restored.clone(), LogTransport::new())
        .with_send_timeout(Duration::from_secs(1));
    dispatcher.run_once(&mut BackoffTrigger::default()).unwrap();
    assert!(restored.get(&id).unwrap().unwrap().is_sent());
}
