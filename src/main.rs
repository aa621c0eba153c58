use std::sync::Arc;

use anyhow::{Error, Result};
use fedmsg_notify::{
    api::{self, AppState},
    clients::{amqp::AmqpClient, desktop::DesktopRenderer},
    config::Config,
    daemon::Daemon,
    models::settings::ControlCommand,
    pidfile::PidFile,
};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const PROCESS_NAME: &str = "fedmsg-notify-d";

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;
    let verbose = std::env::args().any(|arg| arg == "-v");
    init_tracing(&config, verbose);

    if !config.enabled {
        info!("Disabled via configuration, exiting...");
        return Ok(());
    }

    let Some(pidfile) = PidFile::acquire(&config.pidfile(), PROCESS_NAME) else {
        info!("Daemon already running. Exiting...");
        return Ok(());
    };

    let result = serve(&config).await;
    if let Err(e) = &result {
        error!(error = %e, "Daemon failed");
    }

    pidfile.release();
    result
}

async fn serve(config: &Config) -> Result<(), Error> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let (message_tx, message_rx) = mpsc::channel(64);
    let (settings_tx, settings_rx) = mpsc::unbounded_channel();
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    let mut daemon = Daemon::from_config(config, Box::new(DesktopRenderer::new("fedmsg")), signal_tx)?;

    let amqp = Arc::new(AmqpClient::connect(config).await?);
    let consumer = amqp.create_consumer().await?;

    let bus = Arc::clone(&amqp);
    tokio::spawn(async move { bus.forward_messages(consumer, message_tx).await });

    let bus = Arc::clone(&amqp);
    tokio::spawn(async move { bus.forward_signals(signal_rx).await });

    let interrupt = control_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt.send(ControlCommand::Disable);
        }
    });

    let state = AppState::new(control_tx, settings_tx);
    let port = config.server_port;
    tokio::spawn(async move {
        if let Err(e) = api::run_api_server(port, state).await {
            error!(error = %e, "Control server stopped");
        }
    });

    daemon.announce();
    daemon.run(message_rx, settings_rx, control_rx).await;

    Ok(())
}

fn init_tracing(config: &Config, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
