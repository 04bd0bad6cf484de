//! # visa-pay
//!
//! Visa application fee payments through PayFast, PayGate and Peach Payments.
//!
//! ## Usage
//!
//! ```bash
//! # Gateway credentials (sandbox defaults apply when unset)
//! export PAYFAST_MERCHANT_ID=10000100
//! export PAYFAST_PASSPHRASE=...
//! export PEACH_ENTITY_ID=...
//! export PEACH_ACCESS_TOKEN=...
//!
//! # Public URL the gateways call back on
//! export APP_BASE_URL=https://pay.example.com
//!
//! # Run the server
//! LOG_FORMAT=json visa-pay
//! ```

use pay_api::{routes, state::AppState};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    print_banner();

    let state = AppState::from_env()?;
    let addr = state.config.socket_addr()?;
    let settings = state.settings.clone();

    info!("Callback base URL: {}", settings.callbacks.base_url);
    info!("Currency: {}", settings.currency);
    for kind in state.registry.kinds() {
        match settings.resolve(kind) {
            Ok(config) => info!(gateway = %kind, sandbox = config.is_sandbox(), "gateway ready"),
            Err(e) => warn!(gateway = %kind, "gateway not configured: {}", e),
        }
    }
    if settings.callbacks.is_local() {
        warn!("Callback URLs point at localhost; gateways cannot deliver notifications");
    }

    let app = routes::create_router(state);

    info!("visa-pay starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

fn print_banner() {
    println!(
        r#"
  visa-pay
  ━━━━━━━━━━━━━━━━━━━━━━━
  PayFast · PayGate · Peach
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
