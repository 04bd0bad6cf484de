//! # Payment Records
//!
//! The payment row owned by the record store, and the status state machine
//! applied by reconciliation.
//!
//! ```text
//!             ┌──────────► paid
//!   pending ──┼──────────► failed
//!             └──────────► cancelled
//! ```
//!
//! Terminal states are sticky: re-delivery of the same outcome is a no-op and
//! a different outcome is refused.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Created at initiation, awaiting a gateway outcome
    Pending,
    /// Gateway reported a completed payment
    Paid,
    /// Gateway reported a failed payment
    Failed,
    /// Payer cancelled at the gateway
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal outcome reported by a gateway.
///
/// Kept separate from [`PaymentStatus`] so a notification can never move a
/// record back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Paid,
    Failed,
    Cancelled,
}

impl PaymentOutcome {
    pub fn status(&self) -> PaymentStatus {
        match self {
            PaymentOutcome::Paid => PaymentStatus::Paid,
            PaymentOutcome::Failed => PaymentStatus::Failed,
            PaymentOutcome::Cancelled => PaymentStatus::Cancelled,
        }
    }
}

/// Result of applying an outcome to a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// `pending` moved to a terminal status
    Applied { to: PaymentStatus },
    /// Same terminal outcome delivered again
    AlreadyApplied { status: PaymentStatus },
    /// Record is already terminal with a different outcome; left untouched
    Conflict {
        current: PaymentStatus,
        requested: PaymentStatus,
    },
}

impl Transition {
    /// Whether the record was mutated
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

/// A persisted payment for one visa application fee attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// System-generated unique reference (`UAE-PAY-<ms>`)
    pub reference: String,

    /// Caller's application identifier (not unique)
    pub application_id: String,

    /// Fee amount, fixed at creation
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    /// Currency code (e.g. "ZAR")
    pub currency: String,

    /// Applicant email at initiation time
    pub email: String,

    /// Applicant name at initiation time
    pub name: String,

    /// Applicant country, if supplied
    pub country: Option<String>,

    /// Lifecycle status
    #[serde(default)]
    pub status: PaymentStatus,

    /// Gateway transaction id, set by the first applied notification
    pub payment_id: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Changes only on a status transition
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Create a new pending record
    pub fn pending(
        reference: impl Into<String>,
        application_id: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            reference: reference.into(),
            application_id: application_id.into(),
            amount,
            currency: currency.into(),
            email: String::new(),
            name: String::new(),
            country: None,
            status: PaymentStatus::Pending,
            payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: set applicant snapshot
    pub fn with_applicant(
        mut self,
        name: impl Into<String>,
        email: impl Into<String>,
        country: Option<String>,
    ) -> Self {
        self.name = name.into();
        self.email = email.into();
        self.country = country;
        self
    }

    /// Apply a gateway outcome.
    ///
    /// Only `pending` records change. `payment_id` is filled once and never
    /// overwritten; `updated_at` moves only when the status does.
    pub fn apply_outcome(
        &mut self,
        outcome: PaymentOutcome,
        payment_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Transition {
        let requested = outcome.status();

        if self.status == requested {
            return Transition::AlreadyApplied { status: requested };
        }
        if self.status.is_terminal() {
            return Transition::Conflict {
                current: self.status,
                requested,
            };
        }

        self.status = requested;
        if self.payment_id.is_none() {
            self.payment_id = payment_id
                .filter(|id| !id.trim().is_empty())
                .map(String::from);
        }
        self.updated_at = now;

        Transition::Applied { to: requested }
    }
}
