use std::{env, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use back::{app, AppState};
use clap::Parser;
use tokio::time;

/// Remote todo collection for Tidy clients.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[arg(long, env = "TIDY_PORT", default_value_t = 3001)]
    port: u16,

    #[arg(long, env = "TIDY_DATA_FILE", default_value = "data.ron")]
    data_file: PathBuf,

    /// Seconds between saves of the collection to disk.
    #[arg(long, default_value_t = 300)]
    save_interval: u64,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let state = Arc::new(AppState::load(&args.data_file)?);

    tokio::spawn({
        let state = state.clone();
        let interval = Duration::from_secs(args.save_interval);
        async move {
            loop {
                time::sleep(interval).await;
                if let Err(err) = state.store().await {
                    tracing::error!("Failed to store data: {:?}", err);
                }
            }
        }
    });

    let handle = Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutting down");
                handle.graceful_shutdown(Some(Duration::from_secs(10)));
            }
        }
    });

    let addr = SocketAddr::from(([0; 4], args.port));
    let service = app(state.clone()).into_make_service();

    match (env::var("SSL_CERT"), env::var("SSL_KEY")) {
        (Ok(cert), Ok(key)) => {
            let config = RustlsConfig::from_pem_file(cert, key).await?;
            tracing::info!(%addr, "listening with TLS");
            axum_server::bind_rustls(addr, config)
                .handle(handle)
                .serve(service)
                .await?;
        }
        _ => {
            tracing::info!(%addr, "listening");
            axum_server::bind(addr).handle(handle).serve(service).await?;
        }
    }

    state.store().await?;

    Ok(())
}
