//! Batch aggregation across processes through a shared store.
//!
//! Short-lived processes, e.g. one worker per request, produce tiny span
//! batches that would each cost a collector round trip. The
//! [`AggregatingReporter`] instead appends batches to a key in a shared
//! [`AggregationStore`] using a compare-and-swap loop, so concurrent
//! workers fold their spans into one pending batch that a periodic
//! [`flush`](AggregatingReporter::flush) drains through the delegate
//! reporter in a single shot.
//!
//! The reporter stays fail-open: when the store is unreachable, an
//! operation fails, or the swap loses too many races, the batch falls
//! back to the delegate directly and nothing is lost.

use crate::report::{Reporter, SpanData};
use crate::trace::lock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;

const DEFAULT_PENDING_KEY: &str = "zipkin.pending-spans";
const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// An operation against the aggregation store failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("aggregation store error: {0}")]
pub struct StoreError(pub String);

/// A shared key/value store with compare-and-swap, the contract a
/// memcached-style backend fulfills.
///
/// Values are opaque strings; every read returns a token that the next
/// [`compare_and_swap`](AggregationStore::compare_and_swap) must present,
/// so concurrent appends cannot lose each other's spans.
pub trait AggregationStore: fmt::Debug + Send {
    /// Returns `true` if the store is reachable. Called once per batch
    /// before any other operation.
    fn ping(&mut self) -> bool;

    /// Reads `key`, returning the value and its swap token.
    fn get(&mut self, key: &str) -> Result<Option<(String, u64)>, StoreError>;

    /// Creates `key` only if it does not exist yet. Returns `false` when
    /// another writer created it first.
    fn add(&mut self, key: &str, value: &str) -> Result<bool, StoreError>;

    /// Replaces `key` only if it was not modified since the read that
    /// produced `token`. Returns `false` when the swap lost a race.
    fn compare_and_swap(&mut self, key: &str, token: u64, value: &str) -> Result<bool, StoreError>;

    /// Releases the connection after a batch of operations.
    fn quit(&mut self);
}

/// An in-process [`AggregationStore`], used in tests and as a reference
/// for the token semantics backends must provide.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: HashMap<String, (String, u64)>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        InMemoryStore::default()
    }
}

impl AggregationStore for InMemoryStore {
    fn ping(&mut self) -> bool {
        true
    }

    fn get(&mut self, key: &str) -> Result<Option<(String, u64)>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn add(&mut self, key: &str, value: &str) -> Result<bool, StoreError> {
        if self.entries.contains_key(key) {
            return Ok(false);
        }
        self.entries.insert(key.to_owned(), (value.to_owned(), 1));
        Ok(true)
    }

    fn compare_and_swap(&mut self, key: &str, token: u64, value: &str) -> Result<bool, StoreError> {
        match self.entries.get_mut(key) {
            Some((current, current_token)) if *current_token == token => {
                *current = value.to_owned();
                *current_token += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn quit(&mut self) {}
}

/// Folds span batches into an [`AggregationStore`] and drains them through
/// a delegate reporter on [`flush`](AggregatingReporter::flush).
#[derive(Debug)]
pub struct AggregatingReporter {
    store: Mutex<Box<dyn AggregationStore>>,
    delegate: Box<dyn Reporter>,
    key: String,
    max_attempts: usize,
}

impl AggregatingReporter {
    /// Creates a reporter aggregating into `store`, falling back to and
    /// flushing through `delegate`.
    pub fn new(store: Box<dyn AggregationStore>, delegate: Box<dyn Reporter>) -> Self {
        AggregatingReporter {
            store: Mutex::new(store),
            delegate,
            key: DEFAULT_PENDING_KEY.to_owned(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Sets the store key pending spans aggregate under.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Sets how many swap races to tolerate before falling back to the
    /// delegate.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Drains the pending batch and reports it through the delegate.
    pub fn flush(&self) {
        let mut store = lock(&self.store);
        if !store.ping() {
            tracing::warn!("aggregation store unreachable, nothing flushed");
            return;
        }
        let outcome = self.try_drain(store.as_mut());
        store.quit();
        drop(store);

        match outcome {
            Ok(Some(batch)) if !batch.is_empty() => self.delegate.report(batch),
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "failed to drain pending spans"),
        }
    }

    fn try_drain(
        &self,
        store: &mut dyn AggregationStore,
    ) -> Result<Option<Vec<SpanData>>, StoreError> {
        for _ in 0..self.max_attempts {
            let Some((value, token)) = store.get(&self.key)? else {
                return Ok(None);
            };
            if store.compare_and_swap(&self.key, token, "[]")? {
                return Ok(Some(decode(&value)));
            }
        }
        Ok(None)
    }

    fn try_append(
        &self,
        store: &mut dyn AggregationStore,
        spans: &[SpanData],
    ) -> Result<bool, StoreError> {
        for _ in 0..self.max_attempts {
            match store.get(&self.key)? {
                None => {
                    if store.add(&self.key, &encode(spans)?)? {
                        return Ok(true);
                    }
                }
                Some((value, token)) => {
                    let mut batch = decode(&value);
                    batch.extend_from_slice(spans);
                    if store.compare_and_swap(&self.key, token, &encode(&batch)?)? {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }
}

impl Reporter for AggregatingReporter {
    fn report(&self, spans: Vec<SpanData>) {
        if spans.is_empty() {
            return;
        }
        let mut store = lock(&self.store);
        if !store.ping() {
            drop(store);
            tracing::warn!("aggregation store unreachable, reporting directly");
            self.delegate.report(spans);
            return;
        }
        let outcome = self.try_append(store.as_mut(), &spans);
        store.quit();
        drop(store);

        match outcome {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    attempts = self.max_attempts,
                    "aggregation contended, reporting directly"
                );
                self.delegate.report(spans);
            }
            Err(err) => {
                tracing::warn!(error = %err, "aggregation failed, reporting directly");
                self.delegate.report(spans);
            }
        }
    }
}

fn encode(spans: &[SpanData]) -> Result<String, StoreError> {
    serde_json::to_string(spans).map_err(|err| StoreError(err.to_string()))
}

fn decode(value: &str) -> Vec<SpanData> {
    serde_json::from_str(value).unwrap_or_else(|err| {
        tracing::debug!(error = %err, "discarding unreadable pending batch");
        Vec::new()
    })
}
