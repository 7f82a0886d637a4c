use clinic_desk::{
    config::{DeskConfig, SeedClinic},
    cors_layer, desk_route,
    models::{Clinic, ClinicSettings},
    state::{DeskState, DeskStateBuilder},
    store::StoreError,
};
use std::{error::Error, net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "mongo_db")]
use clinic_desk::store::MongoDbConfig;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

async fn seed_clinic(state: &DeskState, seed: SeedClinic) -> Result<(), StoreError> {
    if state.store.get_clinic(&seed.id).await?.is_some() {
        return Ok(());
    }
    let clinic = Clinic {
        id: seed.id,
        name: seed.name,
        email: seed.email,
        avatar_url: None,
        certificate_url: None,
        api_key: seed.api_key,
        settings: ClinicSettings::default(),
    };
    state.store.insert_clinic(&clinic).await?;
    tracing::info!(clinic_id = %clinic.id, "seeded clinic");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down clinic desk");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match DeskConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    let builder = DeskStateBuilder::new(config.intake_api_key.clone())
        .with_session_ttl(config.session_ttl);

    #[cfg(feature = "mongo_db")]
    let builder = match &config.mongo_url {
        Some(url) => builder.with_mongo_config(
            MongoDbConfig::new(url).with_database_name(config.mongo_database.clone()),
        ),
        None => builder,
    };

    let state = match builder.build().await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!("Failed to build DeskState: {:?}", e);
            return Err(e.into());
        }
    };

    if let Some(seed) = config.seed_clinic.clone() {
        seed_clinic(&state, seed).await?;
    }

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sessions.purge_expired().await;
            if removed > 0 {
                tracing::debug!(removed, "expired sessions purged");
            }
        }
    });

    let mut app = desk_route(state);
    if let Some(origin) = &config.cors_origin {
        match cors_layer(origin) {
            Some(cors) => app = app.layer(cors),
            None => tracing::warn!(origin = %origin, "ignoring invalid CORS_ORIGIN"),
        }
    }

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("Clinic desk listening on {}", config.listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
