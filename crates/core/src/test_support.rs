//! In-memory doubles for the core ports.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use relaybox_domain::{NewRequest, QueuedRequest, RelayError, Result};
use tokio::sync::Mutex as TokioMutex;

use crate::dispatch::{DispatchError, PayloadDispatcher, TokenSource};
use crate::queue::RequestStore;

pub fn at(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default() + Duration::seconds(offset_secs)
}

#[derive(Default)]
pub struct MemoryStore {
    rows: TokioMutex<Vec<QueuedRequest>>,
    next_id: TokioMutex<i64>,
    pub fail_load: AtomicBool,
    pub fail_insert: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn seed(&self, payloads: &[&str]) {
        for (offset, payload) in payloads.iter().enumerate() {
            let request = NewRequest {
                payload: (*payload).to_string(),
                created_on: at(i64::try_from(offset).unwrap_or(0)),
            };
            self.insert(&request).await.unwrap();
        }
    }

    pub async fn payloads(&self) -> Vec<String> {
        self.load_pending().await.unwrap().into_iter().map(|r| r.payload).collect()
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn insert(&self, request: &NewRequest) -> Result<QueuedRequest> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(RelayError::Database("insert failed".into()));
        }
        let mut next_id = self.next_id.lock().await;
        *next_id += 1;
        let stored = QueuedRequest {
            id: *next_id,
            payload: request.payload.clone(),
            created_on: request.created_on,
        };
        self.rows.lock().await.push(stored.clone());
        Ok(stored)
    }

    async fn load_pending(&self) -> Result<Vec<QueuedRequest>> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(RelayError::Database("load failed".into()));
        }
        let mut rows = self.rows.lock().await.clone();
        rows.sort_by_key(|r| (r.created_on, r.id));
        Ok(rows)
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(RelayError::Database("delete failed".into()));
        }
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() != before)
    }

    async fn pending_count(&self) -> Result<u64> {
        Ok(self.rows.lock().await.len() as u64)
    }
}

/// Records every delivery and fails the payloads it is told to fail.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub delivered: Mutex<Vec<(String, String)>>,
    failing: Mutex<HashSet<String>>,
    fail_all: AtomicBool,
    scripted: Mutex<VecDeque<std::result::Result<(), DispatchError>>>,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_payload(&self, payload: &str) {
        self.failing.lock().unwrap().insert(payload.to_string());
    }

    pub fn fail_all(&self, enabled: bool) {
        self.fail_all.store(enabled, Ordering::SeqCst);
    }

    pub fn script(&self, outcome: std::result::Result<(), DispatchError>) {
        self.scripted.lock().unwrap().push_back(outcome);
    }

    pub fn attempts(&self) -> Vec<String> {
        self.delivered.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.delivered.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl PayloadDispatcher for RecordingDispatcher {
    async fn dispatch(
        &self,
        request: &QueuedRequest,
        token: &str,
    ) -> std::result::Result<(), DispatchError> {
        self.delivered.lock().unwrap().push((request.payload.clone(), token.to_string()));
        if let Some(outcome) = self.scripted.lock().unwrap().pop_front() {
            return outcome;
        }
        if self.fail_all.load(Ordering::SeqCst)
            || self.failing.lock().unwrap().contains(&request.payload)
        {
            return Err(DispatchError::Rejected { status: 500, body: "boom".into() });
        }
        Ok(())
    }
}

/// Token source whose value can be swapped from the test.
pub struct StaticToken(Mutex<String>);

impl StaticToken {
    pub fn new(value: &str) -> Arc<Self> {
        Arc::new(Self(Mutex::new(value.to_string())))
    }

    pub fn set(&self, value: &str) {
        *self.0.lock().unwrap() = value.to_string();
    }
}

impl TokenSource for StaticToken {
    fn current_token(&self) -> String {
        self.0.lock().unwrap().clone()
    }
}
