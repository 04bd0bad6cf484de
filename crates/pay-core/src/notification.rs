//! # Notification Fields
//!
//! Decoded form body of a gateway notification. Field order is preserved
//! because some signature schemes depend on it.

use crate::error::{PaymentError, PaymentResult};
use std::collections::HashSet;

/// Ordered, decoded notification fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationFields {
    pairs: Vec<(String, String)>,
}

impl NotificationFields {
    /// Decode an `application/x-www-form-urlencoded` body.
    ///
    /// Repeated field names are rejected; a notification that names the same
    /// field twice cannot be verified unambiguously.
    pub fn from_form_body(body: &[u8]) -> PaymentResult<Self> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
            .map_err(|e| PaymentError::MalformedNotification(e.to_string()))?;
        Self::from_pairs(pairs)
    }

    pub fn from_pairs(pairs: Vec<(String, String)>) -> PaymentResult<Self> {
        let mut seen = HashSet::new();
        for (name, _) in &pairs {
            if !seen.insert(name.as_str()) {
                return Err(PaymentError::MalformedNotification(format!(
                    "field '{}' appears more than once",
                    name
                )));
            }
        }
        Ok(Self { pairs })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Field value, trimmed, or `None` when absent or blank
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == name)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// All fields except `name`, in received order
    pub fn without(&self, name: &str) -> Vec<(String, String)> {
        self.pairs
            .iter()
            .filter(|(k, _)| k != name)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
