use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use uuid::Uuid;

use super::{models::ReadingRow, ReadingStore, StoreError};
use crate::readings::Reading;

/// In-memory [`ReadingStore`] with scripted failures, for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<ReadingRow>>,
    failures: Mutex<VecDeque<StoreError>>,
    insert_attempts: AtomicUsize,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call (insert or recent) fail with `err`. Queued
    /// failures are consumed in order.
    pub fn fail_next(&self, err: StoreError) {
        self.failures.lock().unwrap().push_back(err);
    }

    /// Insert a row as-is, e.g. one with a legacy text timestamp.
    pub fn push_row(&self, row: ReadingRow) {
        self.rows.lock().unwrap().push(row);
    }

    pub fn rows(&self) -> Vec<ReadingRow> {
        self.rows.lock().unwrap().clone()
    }

    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert(&self, reading: &Reading) -> Result<Uuid, StoreError> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|r| r.id == reading.id) {
            return Err(StoreError::Fatal {
                op: "insert",
                message: format!("duplicate id {}", reading.id),
            });
        }
        rows.push(ReadingRow::from(reading));
        Ok(reading.id)
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ReadingRow>, StoreError> {
        self.check()?;
        let mut rows = self.rows();
        // Same order as the SQL: native timestamps descending, nulls last, then id.
        rows.sort_by(|a, b| {
            b.recorded_at
                .is_some()
                .cmp(&a.recorded_at.is_some())
                .then(b.recorded_at.cmp(&a.recorded_at))
                .then(a.id.cmp(&b.id))
        });
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
