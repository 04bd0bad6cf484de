//! # Payment References
//!
//! References are `UAE-PAY-<unix millis>`. Within one process the millisecond
//! part is strictly increasing, so two initiations in the same millisecond
//! still get distinct references.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Prefix shared by every generated reference
pub const REFERENCE_PREFIX: &str = "UAE-PAY-";

/// Monotonic reference generator
#[derive(Debug, Default)]
pub struct ReferenceGenerator {
    last_millis: AtomicI64,
}

impl ReferenceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the next reference
    pub fn next(&self) -> String {
        format!("{}{}", REFERENCE_PREFIX, self.next_millis())
    }

    fn next_millis(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_millis.load(Ordering::Relaxed);
        loop {
            let candidate = if now > last { now } else { last + 1 };
            match self.last_millis.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}
