//! Shared dependencies of the gateway adapters.

use crate::config::GatewaySettings;
use pay_core::{
    Applicant, PaymentRecord, PaymentResult, ReferenceGenerator, SharedPaymentStore,
};
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

/// Settings, record store and reference generator, shared by every adapter
#[derive(Clone)]
pub struct GatewayContext {
    pub settings: Arc<GatewaySettings>,
    pub store: SharedPaymentStore,
    pub references: Arc<ReferenceGenerator>,
}

impl GatewayContext {
    pub fn new(settings: GatewaySettings, store: SharedPaymentStore) -> Self {
        Self {
            settings: Arc::new(settings),
            store,
            references: Arc::new(ReferenceGenerator::new()),
        }
    }

    /// Persist a pending record for a freshly generated reference
    pub(crate) async fn persist_pending(
        &self,
        reference: &str,
        applicant: &Applicant,
    ) -> PaymentResult<()> {
        let record = PaymentRecord::pending(
            reference,
            &applicant.application_id,
            applicant.amount,
            &self.settings.currency,
        )
        .with_applicant(&applicant.name, &applicant.email, applicant.country.clone());

        self.store.insert(record).await?;
        debug!(reference, "pending payment persisted");
        Ok(())
    }

    /// HTTP client bounded by the configured gateway timeout
    pub(crate) fn http_client(&self) -> PaymentResult<Client> {
        Client::builder()
            .timeout(self.settings.timeout)
            .build()
            .map_err(|e| {
                pay_core::PaymentError::Configuration(format!("failed to create HTTP client: {}", e))
            })
    }
}
