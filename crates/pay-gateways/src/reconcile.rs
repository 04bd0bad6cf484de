//! # Reconciliation
//!
//! Applies verified gateway notifications to payment records.
//!
//! ```text
//! raw body ──► decode ──► verify signature ──► map outcome ──► store.apply_outcome
//!                              │ mismatch                          │
//!                              ▼                                   ▼
//!                     SignatureMismatch (400)            ack token (always, once verified)
//! ```
//!
//! A notification for a reference that was never created is acknowledged
//! without creating a record, so the gateway stops retrying it.

use pay_core::{
    GatewayKind, GatewayRegistry, NotificationFields, PaymentError, PaymentResult,
    PaymentStatus, SharedPaymentStore, Transition,
};
use tracing::{debug, info, instrument, warn};

/// What reconciliation did with a verified notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Record moved from pending to this status
    Applied(PaymentStatus),
    /// Record already had this status
    AlreadyApplied(PaymentStatus),
    /// Record is terminal with a different status and was left untouched
    Conflict {
        current: PaymentStatus,
        requested: PaymentStatus,
    },
    /// Gateway code is not a final outcome
    NoOutcome,
    /// No record exists for the reference
    UnknownReference,
}

/// Acknowledgment for a verified notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub gateway: GatewayKind,
    pub reference: String,
    /// Response body the gateway expects
    pub token: &'static str,
    pub disposition: Disposition,
}

/// Verifies notifications and applies their outcomes
#[derive(Clone)]
pub struct Reconciler {
    registry: GatewayRegistry,
    store: SharedPaymentStore,
}

impl Reconciler {
    pub fn new(registry: GatewayRegistry, store: SharedPaymentStore) -> Self {
        Self { registry, store }
    }

    /// Decode, verify and apply a form-encoded notification body.
    ///
    /// Errors mean nothing was written: `SignatureMismatch` for a failed
    /// authenticity check, `MalformedNotification` for an undecodable body.
    #[instrument(skip(self, body), fields(gateway = %kind))]
    pub async fn reconcile(&self, kind: GatewayKind, body: &[u8]) -> PaymentResult<Ack> {
        let gateway = self.registry.get(kind).ok_or_else(|| {
            PaymentError::Configuration(format!("gateway '{}' is not registered", kind))
        })?;

        let fields = NotificationFields::from_form_body(body)?;
        let verified = gateway.verify_notification(&fields)?;
        let reference = verified.reference.clone();

        let disposition = match verified.outcome {
            None => {
                info!(
                    reference = %reference,
                    gateway_status = %verified.gateway_status,
                    "notification carries no final outcome, record left as is"
                );
                Disposition::NoOutcome
            }
            Some(outcome) => {
                let transition = self
                    .store
                    .apply_outcome(&reference, outcome, verified.payment_id.as_deref())
                    .await?;

                match transition {
                    None => {
                        warn!(reference = %reference, "notification for unknown reference");
                        Disposition::UnknownReference
                    }
                    Some(Transition::Applied { to }) => {
                        info!(
                            reference = %reference,
                            status = %to,
                            payment_id = ?verified.payment_id,
                            "payment status updated"
                        );
                        Disposition::Applied(to)
                    }
                    Some(Transition::AlreadyApplied { status }) => {
                        debug!(reference = %reference, status = %status, "duplicate notification");
                        Disposition::AlreadyApplied(status)
                    }
                    Some(Transition::Conflict { current, requested }) => {
                        warn!(
                            reference = %reference,
                            current = %current,
                            requested = %requested,
                            "conflicting outcome for terminal payment ignored"
                        );
                        Disposition::Conflict { current, requested }
                    }
                }
            }
        };

        Ok(Ack {
            gateway: kind,
            reference,
            token: gateway.ack_token(),
            disposition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GatewaySettings, SignatureEncoding};
    use crate::context::GatewayContext;
    use crate::payfast::PayFastGateway;
    use crate::signature::itn_signature;
    use pay_core::{InMemoryPaymentStore, PaymentRecord, PaymentStore};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn setup() -> (Reconciler, Arc<InMemoryPaymentStore>) {
        let store = Arc::new(InMemoryPaymentStore::new());
        let ctx = GatewayContext::new(GatewaySettings::default(), store.clone());
        let registry = GatewayRegistry::new().with_gateway(Arc::new(PayFastGateway::new(ctx)));
        (Reconciler::new(registry, store.clone()), store)
    }

    async fn seed(store: &InMemoryPaymentStore, reference: &str) {
        store
            .insert(
                PaymentRecord::pending(reference, "APP-1", dec!(350), "ZAR")
                    .with_applicant("John Smith", "john@example.com", None),
            )
            .await
            .unwrap();
    }

    fn itn_body(reference: &str, status: &str) -> String {
        let pairs = vec![
            ("m_payment_id", reference),
            ("pf_payment_id", "1089250"),
            ("payment_status", status),
            ("item_name", "UAE Visa Application Fee"),
            ("amount", "350.00"),
        ];
        let signature = itn_signature(
            &pairs,
            Some("jt7NOE43FZPn"),
            SignatureEncoding::Encoded,
        );
        let mut all = pairs;
        all.push(("signature", signature.as_str()));
        serde_urlencoded::to_string(&all).unwrap()
    }

    #[tokio::test]
    async fn test_complete_marks_paid() {
        let (reconciler, store) = setup();
        seed(&store, "UAE-PAY-1").await;

        let ack = reconciler
            .reconcile(GatewayKind::PayFast, itn_body("UAE-PAY-1", "COMPLETE").as_bytes())
            .await
            .unwrap();

        assert_eq!(ack.token, "OK");
        assert_eq!(ack.disposition, Disposition::Applied(PaymentStatus::Paid));
        let record = store.get("UAE-PAY-1").await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Paid);
        assert_eq!(record.payment_id.as_deref(), Some("1089250"));
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let (reconciler, store) = setup();
        seed(&store, "UAE-PAY-2").await;
        let body = itn_body("UAE-PAY-2", "COMPLETE");

        let first = reconciler
            .reconcile(GatewayKind::PayFast, body.as_bytes())
            .await
            .unwrap();
        let after_first = store.get("UAE-PAY-2").await.unwrap().unwrap();
        let second = reconciler
            .reconcile(GatewayKind::PayFast, body.as_bytes())
            .await
            .unwrap();

        assert_eq!(first.disposition, Disposition::Applied(PaymentStatus::Paid));
        assert_eq!(
            second.disposition,
            Disposition::AlreadyApplied(PaymentStatus::Paid)
        );
        assert_eq!(store.get("UAE-PAY-2").await.unwrap().unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_tampered_signature_rejected_without_mutation() {
        let (reconciler, store) = setup();
        seed(&store, "UAE-PAY-3").await;
        let before = store.get("UAE-PAY-3").await.unwrap().unwrap();

        let body = itn_body("UAE-PAY-3", "COMPLETE");
        let (head, signature) = body.rsplit_once("signature=").unwrap();

        for i in 0..signature.len() {
            let mut tampered: Vec<u8> = signature.as_bytes().to_vec();
            tampered[i] = if tampered[i] == b'a' { b'b' } else { b'a' };
            let tampered = format!("{}signature={}", head, String::from_utf8(tampered).unwrap());

            let err = reconciler
                .reconcile(GatewayKind::PayFast, tampered.as_bytes())
                .await
                .unwrap_err();
            assert!(matches!(err, PaymentError::SignatureMismatch { .. }));
        }

        assert_eq!(store.get("UAE-PAY-3").await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_unknown_reference_acknowledged() {
        let (reconciler, store) = setup();

        let ack = reconciler
            .reconcile(GatewayKind::PayFast, itn_body("UAE-PAY-404", "COMPLETE").as_bytes())
            .await
            .unwrap();

        assert_eq!(ack.token, "OK");
        assert_eq!(ack.disposition, Disposition::UnknownReference);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unrecognized_status_is_noop() {
        let (reconciler, store) = setup();
        seed(&store, "UAE-PAY-4").await;

        let ack = reconciler
            .reconcile(GatewayKind::PayFast, itn_body("UAE-PAY-4", "PENDING").as_bytes())
            .await
            .unwrap();

        assert_eq!(ack.disposition, Disposition::NoOutcome);
        let record = store.get("UAE-PAY-4").await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_terminal_status_is_sticky() {
        let (reconciler, store) = setup();
        seed(&store, "UAE-PAY-5").await;

        reconciler
            .reconcile(GatewayKind::PayFast, itn_body("UAE-PAY-5", "FAILED").as_bytes())
            .await
            .unwrap();
        let ack = reconciler
            .reconcile(GatewayKind::PayFast, itn_body("UAE-PAY-5", "COMPLETE").as_bytes())
            .await
            .unwrap();

        assert_eq!(
            ack.disposition,
            Disposition::Conflict {
                current: PaymentStatus::Failed,
                requested: PaymentStatus::Paid
            }
        );
        let record = store.get("UAE-PAY-5").await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_unregistered_gateway() {
        let (reconciler, _) = setup();
        let err = reconciler
            .reconcile(GatewayKind::Peach, b"signature=x")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_apply_once() {
        let (reconciler, store) = setup();
        seed(&store, "UAE-PAY-6").await;
        let body = itn_body("UAE-PAY-6", "COMPLETE");

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let reconciler = reconciler.clone();
                let body = body.clone();
                tokio::spawn(async move {
                    reconciler
                        .reconcile(GatewayKind::PayFast, body.as_bytes())
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut applied = 0;
        for task in tasks {
            if task.await.unwrap().disposition == Disposition::Applied(PaymentStatus::Paid) {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
    }
}
