//! Endpoint stubs.
//!
//! [`CountingEndpoint`] stands in for the remote server behind a
//! `LoopbackClient` and counts deliveries per record id.
//! [`GatedTransport`] holds every delivery until the test releases it, and
//! tracks how many deliveries were in flight at once.

use async_trait::async_trait;
use outbox_core::{ChangeRecord, RecordId};
use outbox_sync_engine::{
    DeliveryResponse, DeliveryTransport, HttpRequest, LoopbackEndpoint, Scripted,
    TransportFailure,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Default)]
struct Counts {
    attempts: Vec<RecordId>,
    bodies: Vec<Value>,
    script: HashMap<RecordId, Scripted>,
}

/// In-process endpoint that counts deliveries per record.
///
/// Clones share state. Answers `201 Created` unless scripted otherwise.
#[derive(Debug, Clone, Default)]
pub struct CountingEndpoint {
    counts: Arc<Mutex<Counts>>,
    offline: Arc<AtomicBool>,
}

impl CountingEndpoint {
    /// Creates an endpoint that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the answer for one record.
    pub fn respond_to(&self, id: RecordId, answer: Scripted) {
        self.counts.lock().script.insert(id, answer);
    }

    /// Simulates a lost network: every request fails without an answer.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Record ids in the order they reached the endpoint.
    pub fn attempts(&self) -> Vec<RecordId> {
        self.counts.lock().attempts.clone()
    }

    /// Deliveries of one record.
    pub fn attempts_for(&self, id: RecordId) -> usize {
        self.counts
            .lock()
            .attempts
            .iter()
            .filter(|a| **a == id)
            .count()
    }

    /// Highest number of deliveries seen for any single record.
    pub fn max_attempts_per_record(&self) -> usize {
        let mut per_id: HashMap<RecordId, usize> = HashMap::new();
        for id in &self.counts.lock().attempts {
            *per_id.entry(*id).or_default() += 1;
        }
        per_id.values().copied().max().unwrap_or(0)
    }

    /// Parsed request bodies, in arrival order.
    pub fn bodies(&self) -> Vec<Value> {
        self.counts.lock().bodies.clone()
    }
}

impl LoopbackEndpoint for CountingEndpoint {
    fn handle_post(&self, request: &HttpRequest) -> Result<DeliveryResponse, TransportFailure> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportFailure::Unreachable("connection refused".into()));
        }

        let body: Value = serde_json::from_slice(&request.body)
            .map_err(|e| TransportFailure::Encode(e.to_string()))?;
        let Some(id) = body.get("id").and_then(Value::as_u64).map(RecordId::new) else {
            return Ok(DeliveryResponse::new(400, "missing id"));
        };

        let mut counts = self.counts.lock();
        counts.attempts.push(id);
        counts.bodies.push(body);

        match counts.script.get(&id).cloned().unwrap_or(Scripted::Accept) {
            Scripted::Accept => Ok(DeliveryResponse::new(201, "")),
            Scripted::Reject { status, body } => Ok(DeliveryResponse::new(status, body)),
            Scripted::Fail(failure) => Err(failure),
        }
    }
}

/// Wraps a transport and holds every delivery until released.
///
/// Clones share the gate.
#[derive(Debug)]
pub struct GatedTransport<T> {
    inner: Arc<T>,
    gate: Arc<Semaphore>,
    opened: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    waiting: Arc<AtomicUsize>,
}

impl<T> Clone for GatedTransport<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            gate: Arc::clone(&self.gate),
            opened: Arc::clone(&self.opened),
            in_flight: Arc::clone(&self.in_flight),
            max_in_flight: Arc::clone(&self.max_in_flight),
            waiting: Arc::clone(&self.waiting),
        }
    }
}

impl<T: DeliveryTransport> GatedTransport<T> {
    /// Wraps `inner` with a closed gate.
    pub fn new(inner: T) -> Self {
        Self {
            inner: Arc::new(inner),
            gate: Arc::new(Semaphore::new(0)),
            opened: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Lets `n` more deliveries through.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Opens the gate for good.
    pub fn open(&self) {
        self.opened.store(true, Ordering::SeqCst);
        self.gate.add_permits(self.waiting());
    }

    /// Deliveries currently held at the gate.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Highest number of deliveries that were in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Waits until at least `n` deliveries are held at the gate.
    pub async fn wait_for_waiting(&self, n: usize) {
        while self.waiting() < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl<T: DeliveryTransport> DeliveryTransport for GatedTransport<T> {
    async fn deliver(&self, record: &ChangeRecord) -> Result<DeliveryResponse, TransportFailure> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = if self.opened.load(Ordering::SeqCst) {
            self.inner.deliver(record).await
        } else {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            let permit = self.gate.acquire().await;
            self.waiting.fetch_sub(1, Ordering::SeqCst);
            match permit {
                Ok(permit) => {
                    permit.forget();
                    self.inner.deliver(record).await
                }
                Err(_) => Err(TransportFailure::Unreachable("gate closed".into())),
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
