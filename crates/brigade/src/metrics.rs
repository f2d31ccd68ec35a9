use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by one consumer or producer instance.
///
/// Externally visible as a serializable snapshot; the core only ever
/// increments.
#[derive(Default, Debug, Serialize)]
pub struct ClientMetrics {
    consumer: ConsumeCounter,
    producer: RecordCounter,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn consumer(&self) -> &ConsumeCounter {
        &self.consumer
    }

    #[inline]
    pub fn producer(&self) -> &RecordCounter {
        &self.producer
    }
}

#[derive(Default, Debug, Serialize)]
pub struct RecordCounter {
    records: AtomicU64,
    bytes: AtomicU64,
}

impl RecordCounter {
    #[inline]
    pub(crate) fn add_records(&self, value: u64) {
        self.records.fetch_add(value, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn add_bytes(&self, value: u64) {
        self.bytes.fetch_add(value, Ordering::SeqCst);
    }

    pub fn records(&self) -> u64 {
        self.records.load(Ordering::SeqCst)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }
}

/// Consume-side counters: received volume plus the two outcomes the loop
/// distinguishes, committed and skipped.
#[derive(Default, Debug, Serialize)]
pub struct ConsumeCounter {
    records: AtomicU64,
    bytes: AtomicU64,
    committed: AtomicU64,
    skipped: AtomicU64,
}

impl ConsumeCounter {
    #[inline]
    pub(crate) fn add_records(&self, value: u64) {
        self.records.fetch_add(value, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn add_bytes(&self, value: u64) {
        self.bytes.fetch_add(value, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn add_committed(&self, value: u64) {
        self.committed.fetch_add(value, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn add_skipped(&self, value: u64) {
        self.skipped.fetch_add(value, Ordering::SeqCst);
    }

    pub fn records(&self) -> u64 {
        self.records.load(Ordering::SeqCst)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }

    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::SeqCst)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }
}
