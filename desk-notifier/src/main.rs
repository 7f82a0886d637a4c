use desk_notifier::{
    AppointmentFeed, ChatFeed, DeskClient, LogSink, NotificationSink, Poller,
    config::NotifierConfig,
};
use std::{error::Error, sync::Arc};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match NotifierConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    info!("Starting notifier for clinic {} at {}", config.clinic_id, config.desk_url);

    let client = Arc::new(DeskClient::new(
        &config.desk_url,
        config.clinic_id.clone(),
        config.api_key.clone(),
    )?);
    match client.login().await {
        Ok(()) => match client.settings().await {
            Ok(settings) => config.apply_clinic_settings(&settings),
            Err(e) => warn!("Could not load clinic settings, using defaults: {}", e),
        },
        Err(e) => warn!("Initial login failed, pollers will retry: {}", e),
    }

    let sink: Arc<dyn NotificationSink> = Arc::new(LogSink);
    let chat = Poller::new(
        Box::new(ChatFeed::new(client.clone())),
        sink.clone(),
        config.chat_interval,
        config.window,
        config.play_sound,
    );
    let appointments = Poller::new(
        Box::new(AppointmentFeed::new(client.clone())),
        sink,
        config.appointment_interval,
        config.window,
        config.play_sound,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let chat_task = tokio::spawn(chat.run(shutdown_rx.clone()));
    let appointment_task = tokio::spawn(appointments.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down notifier");
    // Receivers only disappear once both pollers have already stopped.
    let _ = shutdown_tx.send(true);

    let (chat_result, appointment_result) = tokio::join!(chat_task, appointment_task);
    chat_result?;
    appointment_result?;

    if let Err(e) = client.logout().await {
        warn!("Logout failed: {}", e);
    }
    Ok(())
}
