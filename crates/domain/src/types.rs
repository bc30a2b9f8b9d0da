//! Queue record types
//!
//! A payload is accepted as a [`NewRequest`] stamped by the enqueuing side
//! and becomes a [`QueuedRequest`] once the store has assigned it an id.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// A payload that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
    pub payload: String,
    pub created_on: DateTime<Utc>,
}

impl NewRequest {
    /// Stamp `payload` with the current time at microsecond precision, the
    /// resolution the store keeps.
    pub fn now(payload: impl Into<String>) -> Self {
        Self { payload: payload.into(), created_on: Utc::now().trunc_subsecs(6) }
    }

    /// True when the payload carries nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.payload.trim().is_empty()
    }
}

/// One payload awaiting delivery.
///
/// `id` is assigned by the store and only used for deletion; `created_on`
/// is the ordering key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: i64,
    pub payload: String,
    pub created_on: DateTime<Utc>,
}
