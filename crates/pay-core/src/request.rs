//! # Initiation Requests
//!
//! Caller-supplied payment details and their validation.

use crate::error::{PaymentError, PaymentResult};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Description used when the caller does not provide one
pub const DEFAULT_DESCRIPTION: &str = "UAE Visa Application Fee";

/// Largest accepted fee, in whole currency units
pub const MAX_AMOUNT: i64 = 1_000_000;

/// Gateways settle in cents
const AMOUNT_SCALE: u32 = 2;

/// Raw initiation request as received from the client.
///
/// Every field is optional here so that missing values surface as a
/// [`PaymentError::Validation`] rather than a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitiationRequest {
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(default)]
    pub applicant_name: Option<String>,
    #[serde(default)]
    pub applicant_email: Option<String>,
    /// Accepts a JSON number or a numeric string
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl InitiationRequest {
    pub fn new(
        application_id: impl Into<String>,
        applicant_name: impl Into<String>,
        applicant_email: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            application_id: Some(application_id.into()),
            applicant_name: Some(applicant_name.into()),
            applicant_email: Some(applicant_email.into()),
            amount: Some(amount),
            country: None,
            description: None,
        }
    }

    /// Builder: set country
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Builder: set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check required fields and normalize the applicant details.
    pub fn validate(&self) -> PaymentResult<Applicant> {
        let mut missing = Vec::new();

        let application_id = required(&self.application_id, "application_id", &mut missing);
        let name = required(&self.applicant_name, "applicant_name", &mut missing);
        let email = required(&self.applicant_email, "applicant_email", &mut missing);
        if self.amount.is_none() {
            missing.push("amount");
        }

        if !missing.is_empty() {
            return Err(PaymentError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let amount = self.amount.unwrap_or_default();
        if amount <= Decimal::ZERO {
            return Err(PaymentError::Validation(
                "amount must be greater than zero".to_string(),
            ));
        }
        if amount > Decimal::from(MAX_AMOUNT) {
            return Err(PaymentError::Validation(format!(
                "amount must not exceed {}",
                MAX_AMOUNT
            )));
        }
        if amount.normalize().scale() > AMOUNT_SCALE {
            return Err(PaymentError::Validation(
                "amount must have at most two decimal places".to_string(),
            ));
        }

        Ok(Applicant {
            application_id: application_id.unwrap_or_default(),
            name: collapse_whitespace(&name.unwrap_or_default()),
            email: email.unwrap_or_default(),
            amount,
            country: self
                .country
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from),
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or(DEFAULT_DESCRIPTION)
                .to_string(),
        })
    }
}

fn required(value: &Option<String>, field: &'static str, missing: &mut Vec<&'static str>) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Some(v.to_string()),
        _ => {
            missing.push(field);
            None
        }
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Validated, trimmed applicant details
#[derive(Debug, Clone, PartialEq)]
pub struct Applicant {
    pub application_id: String,
    /// Trimmed, inner whitespace collapsed
    pub name: String,
    pub email: String,
    pub amount: Decimal,
    pub country: Option<String>,
    pub description: String,
}

impl Applicant {
    /// Given name and surname for gateways that take them separately
    pub fn split_name(&self) -> (String, String) {
        split_name(&self.name)
    }

    /// Amount rounded to cents, halves away from zero
    pub fn amount_rounded(&self) -> Decimal {
        round_to_cents(self.amount)
    }

    /// Amount with exactly two decimal places (e.g. "350.00")
    pub fn amount_2dp(&self) -> String {
        format!("{:.2}", self.amount_rounded())
    }
}

/// Round to two decimal places, halves away from zero
pub fn round_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Split a full name into (given name, surname).
///
/// A single-token name is used for both parts.
pub fn split_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let given = parts.next().unwrap_or_default().to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");

    if rest.is_empty() {
        (given.clone(), given)
    } else {
        (given, rest)
    }
}
