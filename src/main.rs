use std::net::SocketAddr;

use axum::Router;
use axum::extract::RawQuery;
use axum::response::Html;
use axum::routing::get;
use oauth_recovery::middleware::{RecoveryConfig, auth_routes};
use oauth_recovery::{Locale, login_message};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RecoveryConfig::from_env()?;
    let login_path = config.paths().login.clone();
    info!(callback = %config.callback_path(), login = %login_path, "Loaded auth config");

    let app = Router::new()
        .route(&login_path, get(login_page))
        .merge(auth_routes(config));

    let address: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".into())
        .parse()?;
    let listener = TcpListener::bind(address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

/// Minimal login page showing the message for the `error` parameter.
async fn login_page(RawQuery(query): RawQuery) -> Html<String> {
    let locale = match query.as_deref() {
        Some(q) if q.split('&').any(|pair| pair == "lang=ja") => Locale::Ja,
        _ => Locale::En,
    };
    let notice = login_message(query.as_deref(), locale)
        .map(|message| format!("<p role=\"alert\">{message}</p>"))
        .unwrap_or_default();
    Html(format!(
        "<!DOCTYPE html><html><body>{notice}<a href=\"/auth/authorize\">Sign in</a></body></html>"
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
