use fgtracker_runner::{TrackerConfig, launch};
use log::{error, info};
use tokio::sync::watch;

fn print_help() {
    eprintln!(
        r#"fgtracker - flight tracker for FlightGear multiplayer servers

USAGE:
    fgtracker [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    FGTRACKER_HOST      Listen host (default: 0.0.0.0)
    FGTRACKER_PORT      Listen port (default: 8000)
    FGTRACKER_DB        SQLite database path (default: fgtracker.sqlite);
                        :memory: is for testing, it empties on every reconnect
    RUST_LOG            Log level filter (default: info)

EXAMPLES:
    # Run with defaults
    fgtracker

    # Run with config file
    fgtracker --config fgtracker.json

    # Run with custom port
    FGTRACKER_PORT=9000 fgtracker
"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            TrackerConfig::from_file(&path)?
        }
        None => {
            info!("Using default configuration");
            TrackerConfig::default()
        }
    };
    config.apply_env()?;
    config.validate()?;
    info!(
        "Listen: {}:{}, store: {}, protocols: {}, trusted servers: {}",
        config.server.host,
        config.server.port,
        config.store_target(),
        config.protocols.len(),
        config.trusted_servers.len()
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Keep the sender alive; a dropped sender reads as shutdown
                error!("Cannot listen for interrupts: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    launch(config, shutdown_rx).await?;
    info!("fgtracker stopped");
    Ok(())
}
