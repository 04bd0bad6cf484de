//! # Payment Record Store
//!
//! The read/write contract the gateways and reconciliation depend on.
//! Implementations must make each create and each outcome update a single
//! atomic step keyed by reference, so concurrent duplicate notifications
//! never leave a half-applied record.

use crate::error::{PaymentError, PaymentResult};
use crate::record::{PaymentOutcome, PaymentRecord, Transition};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Storage contract for payment records
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persist a new record. Fails with `DuplicateReference` if the reference exists.
    async fn insert(&self, record: PaymentRecord) -> PaymentResult<()>;

    /// Look up a record by reference.
    async fn get(&self, reference: &str) -> PaymentResult<Option<PaymentRecord>>;

    /// Atomically apply a gateway outcome.
    ///
    /// Returns `None` when no record exists for the reference.
    async fn apply_outcome(
        &self,
        reference: &str,
        outcome: PaymentOutcome,
        payment_id: Option<&str>,
    ) -> PaymentResult<Option<Transition>>;
}

/// Type alias for a shared store (dynamic dispatch)
pub type SharedPaymentStore = Arc<dyn PaymentStore>;

/// Process-local store backed by a map under a single lock
#[derive(Debug, Default)]
pub struct InMemoryPaymentStore {
    records: RwLock<HashMap<String, PaymentRecord>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap in an `Arc` for sharing across handlers
    pub fn shared() -> SharedPaymentStore {
        Arc::new(Self::new())
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, record: PaymentRecord) -> PaymentResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.reference) {
            return Err(PaymentError::DuplicateReference {
                reference: record.reference,
            });
        }
        debug!(reference = %record.reference, "payment record created");
        records.insert(record.reference.clone(), record);
        Ok(())
    }

    async fn get(&self, reference: &str) -> PaymentResult<Option<PaymentRecord>> {
        Ok(self.records.read().await.get(reference).cloned())
    }

    async fn apply_outcome(
        &self,
        reference: &str,
        outcome: PaymentOutcome,
        payment_id: Option<&str>,
    ) -> PaymentResult<Option<Transition>> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(reference) else {
            return Ok(None);
        };
        Ok(Some(record.apply_outcome(outcome, payment_id, Utc::now())))
    }
}
