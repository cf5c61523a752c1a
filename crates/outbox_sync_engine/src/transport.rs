//! Transport layer abstraction for delivery.

use crate::error::TransportFailure;
use async_trait::async_trait;
use outbox_core::{ChangeRecord, RecordId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// What the endpoint answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, possibly empty.
    pub body: String,
}

impl DeliveryResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A bare `200 OK`.
    pub fn ok() -> Self {
        Self::new(200, "")
    }

    /// Returns true for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// Sends one staged record to the remote endpoint.
///
/// `Ok` means the endpoint answered, whatever the status; `Err` means no
/// answer was obtained at all.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Delivers one record.
    async fn deliver(&self, record: &ChangeRecord) -> Result<DeliveryResponse, TransportFailure>;
}

#[async_trait]
impl<T: DeliveryTransport + ?Sized> DeliveryTransport for std::sync::Arc<T> {
    async fn deliver(&self, record: &ChangeRecord) -> Result<DeliveryResponse, TransportFailure> {
        (**self).deliver(record).await
    }
}

/// Scripted answer for [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    /// Answer `200 OK`.
    Accept,
    /// Answer with the given status and body.
    Reject {
        /// Status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Produce no answer.
    Fail(TransportFailure),
}

impl Scripted {
    /// Shorthand for a rejection with an empty body.
    pub fn status(status: u16) -> Self {
        Scripted::Reject {
            status,
            body: String::new(),
        }
    }
}

/// A transport with per-record answers, for tests and demos.
///
/// Records every attempt in order so callers can check ordering and
/// duplicate delivery.
#[derive(Debug)]
pub struct ScriptedTransport {
    connected: AtomicBool,
    default: Mutex<Scripted>,
    script: Mutex<HashMap<RecordId, Scripted>>,
    attempts: Mutex<Vec<RecordId>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedTransport {
    /// Creates a transport that accepts everything.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            default: Mutex::new(Scripted::Accept),
            script: Mutex::new(HashMap::new()),
            attempts: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
        }
    }

    /// Sets the answer for one record.
    pub fn respond_to(&self, id: RecordId, answer: Scripted) {
        self.script.lock().insert(id, answer);
    }

    /// Sets the answer for records without a scripted one.
    pub fn set_default(&self, answer: Scripted) {
        *self.default.lock() = answer;
    }

    /// Delays every answer.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Sets the connected state. A disconnected transport fails every attempt.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Every attempted record id, in attempt order.
    pub fn attempts(&self) -> Vec<RecordId> {
        self.attempts.lock().clone()
    }

    /// Number of attempts for one record.
    pub fn attempts_for(&self, id: RecordId) -> usize {
        self.attempts.lock().iter().filter(|a| **a == id).count()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryTransport for ScriptedTransport {
    async fn deliver(&self, record: &ChangeRecord) -> Result<DeliveryResponse, TransportFailure> {
        self.attempts.lock().push(record.id);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportFailure::Unreachable("network is offline".into()));
        }

        let answer = self
            .script
            .lock()
            .get(&record.id)
            .cloned()
            .unwrap_or_else(|| self.default.lock().clone());

        match answer {
            Scripted::Accept => Ok(DeliveryResponse::ok()),
            Scripted::Reject { status, body } => Ok(DeliveryResponse::new(status, body)),
            Scripted::Fail(failure) => Err(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbox_core::{PayloadMap, RecordStore};

    async fn record() -> ChangeRecord {
        let store = RecordStore::in_memory();
        store.initialize().await.unwrap();
        store.append(PayloadMap::new()).await.unwrap()
    }

    #[test]
    fn success_range() {
        assert!(DeliveryResponse::new(200, "").is_success());
        assert!(DeliveryResponse::new(204, "").is_success());
        assert!(DeliveryResponse::new(299, "").is_success());
        assert!(!DeliveryResponse::new(199, "").is_success());
        assert!(!DeliveryResponse::new(300, "").is_success());
        assert!(!DeliveryResponse::new(500, "").is_success());
    }

    #[tokio::test]
    async fn scripted_answers() {
        let record = record().await;
        let transport = ScriptedTransport::new();

        assert!(transport.deliver(&record).await.unwrap().is_success());

        transport.respond_to(record.id, Scripted::status(500));
        assert_eq!(transport.deliver(&record).await.unwrap().status, 500);

        transport.set_connected(false);
        assert!(matches!(
            transport.deliver(&record).await,
            Err(TransportFailure::Unreachable(_))
        ));

        assert_eq!(transport.attempts_for(record.id), 3);
    }

    #[tokio::test]
    async fn default_answer_applies_to_unscripted_records() {
        let record = record().await;
        let transport = ScriptedTransport::new();
        transport.set_default(Scripted::Fail(TransportFailure::Unreachable("down".into())));
        assert!(transport.deliver(&record).await.is_err());
    }
}
