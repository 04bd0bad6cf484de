//! # Application State
//!
//! Shared state for the Axum application: the gateway registry, the payment
//! record store and the reconciler that ties them together.

use anyhow::Context;
use pay_core::{GatewayRegistry, InMemoryPaymentStore, SharedPaymentStore};
use pay_gateways::{build_registry, GatewayContext, GatewaySettings, Reconciler};
use std::net::SocketAddr;
use std::sync::Arc;

/// Server bind configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(3000),
        }
    }

    /// Socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: GatewayRegistry,
    pub store: SharedPaymentStore,
    pub reconciler: Reconciler,
    pub settings: Arc<GatewaySettings>,
    pub config: AppConfig,
}

impl AppState {
    /// Build state from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();
        let settings = GatewaySettings::from_env().context("failed to load gateway settings")?;
        Self::from_parts(settings, InMemoryPaymentStore::shared(), config)
    }

    /// Build state from explicit settings and store
    pub fn from_parts(
        settings: GatewaySettings,
        store: SharedPaymentStore,
        config: AppConfig,
    ) -> anyhow::Result<Self> {
        let ctx = GatewayContext::new(settings, store.clone());
        let registry = build_registry(&ctx).context("failed to register payment gateways")?;
        let reconciler = Reconciler::new(registry.clone(), store.clone());

        Ok(Self {
            registry,
            store,
            reconciler,
            settings: ctx.settings,
            config,
        })
    }
}
