//! locksmith-gateway server entry point.
//!
//! Wires configuration, stores, the Stripe client and the pricer, then
//! starts the Axum HTTP server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use locksmith_gateway::api;
use locksmith_gateway::app_state::AppState;
use locksmith_gateway::config::GatewayConfig;
use locksmith_gateway::persistence::{
    ChargeStore, CustomerStore, InMemoryPersistence, IntentStore, MetadataStore,
    PostgresPersistence,
};
use locksmith_gateway::pricing::{KeyPricer, PriceSource, Pricer, RpcPriceSource};
use locksmith_gateway::processor::{PaymentProcessor, StripeClient};
use locksmith_gateway::service::{CheckoutService, MetadataService};

/// Handles to every store trait, backed by one implementation.
struct Stores {
    metadata: Arc<dyn MetadataStore>,
    intents: Arc<dyn IntentStore>,
    charges: Arc<dyn ChargeStore>,
    customers: Arc<dyn CustomerStore>,
}

impl Stores {
    fn shared<T>(store: &Arc<T>) -> Self
    where
        T: MetadataStore + IntentStore + ChargeStore + CustomerStore + 'static,
    {
        Self {
            metadata: Arc::clone(store) as Arc<dyn MetadataStore>,
            intents: Arc::clone(store) as Arc<dyn IntentStore>,
            charges: Arc::clone(store) as Arc<dyn ChargeStore>,
            customers: Arc::clone(store) as Arc<dyn CustomerStore>,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting locksmith-gateway");

    // Build persistence layer
    let stores = if config.persistence_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .context("connecting to PostgreSQL")?;
        let postgres = Arc::new(PostgresPersistence::new(pool));
        postgres.migrate().await?;
        tracing::info!("persistence: postgres");
        Stores::shared(&postgres)
    } else {
        tracing::warn!("persistence disabled, records are kept in memory only");
        Stores::shared(&Arc::new(InMemoryPersistence::new()))
    };

    // Build outbound clients
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .context("building HTTP client")?;
    let secret_key = config
        .stripe_secret_key
        .clone()
        .context("STRIPE_SECRET_KEY is required")?;
    let processor: Arc<dyn PaymentProcessor> = Arc::new(StripeClient::new(
        http.clone(),
        &config.stripe_api_base,
        secret_key,
    ));
    let source: Arc<dyn PriceSource> = Arc::new(
        RpcPriceSource::new(
            http,
            &config.provider_urls,
            config.native_currencies.clone(),
            &config.price_api_base,
        )
        .context("PROVIDER_URLS")?,
    );
    let pricer: Arc<dyn Pricer> = Arc::new(KeyPricer::new(source, config.fees.clone()));

    // Build service layer
    let checkout_service = Arc::new(CheckoutService::new(
        Arc::clone(&pricer),
        processor,
        stores.intents,
        stores.charges,
        stores.customers,
    ));
    let metadata_service = Arc::new(MetadataService::new(stores.metadata));

    // Build application state
    let app_state = AppState {
        checkout_service,
        metadata_service,
        pricer,
    };

    // Build router
    let app = Router::new().merge(api::build_router());
    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };
    let app = app
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
