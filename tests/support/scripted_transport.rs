//! Transport whose answers are scripted per subject.
//!
//! Every send is recorded, so tests can assert which mails were attempted
//! and in what order.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use postbox::{Envelope, Transport, TransportError};

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    scripts: Arc<Mutex<HashMap<String, VecDeque<Result<(), TransportError>>>>>,
    attempts: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every send.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue the next answer for mails with `subject`. Unscripted sends succeed.
    pub fn script(&self, subject: &str, result: Result<(), TransportError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(subject.to_string())
            .or_default()
            .push_back(result);
    }

    /// Subjects of every attempted send, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, subject: &str) -> usize {
        self.attempts().iter().filter(|s| *s == subject).count()
    }
}

impl Transport for ScriptedTransport {
    fn send(
        &self,
        _envelope: &Envelope,
        message: &[u8],
        _timeout: Duration,
    ) -> Result<(), TransportError> {
        let subject = subject_of(message);
        self.attempts.lock().unwrap().push(subject.clone());

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        self.scripts
            .lock()
            .unwrap()
            .get_mut(&subject)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(()))
    }
}

fn subject_of(message: &[u8]) -> String {
    String::from_utf8_lossy(message)
        .lines()
        .find_map(|line| line.strip_prefix("Subject: "))
        .unwrap_or_default()
        .trim()
        .to_string()
}
