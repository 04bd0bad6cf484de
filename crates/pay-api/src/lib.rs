//! # pay-api
//!
//! HTTP API layer for the visa-fee payment service.
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/api/payments/start` | PayFast signed checkout form |
//! | POST | `/api/payments/verify` | PayFast ITN |
//! | GET | `/api/payments/status/{reference}` | Payment record |
//! | POST | `/api/paygate/initiate` | PayGate PayWeb3 redirect |
//! | POST | `/api/paygate/notify` | PayGate notification |
//! | POST | `/api/peach/initiate` | Peach Payments checkout |
//! | POST | `/api/peach/webhook` | Peach Payments notification |
//!
//! Notification endpoints answer `200 OK` once the signature verifies, and
//! `400 Invalid signature` otherwise.

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
