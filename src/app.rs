use crate::config::Config;
use crate::db::{PgSessionProvider, SessionProvider};
use crate::signals::shutdown_signal;
use crate::state::AppState;
use crate::utils::fmt_duration;
use crate::web::connectivity::{self, ConnectivityReport};
use crate::web::create_router;
use anyhow::Context;
use std::future::IntoFuture;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Main application struct: configuration plus the database session provider.
pub struct App {
    config: Config,
    sessions: PgSessionProvider,
}

impl App {
    /// Build the application. Never touches the network: the pool is lazy.
    pub fn new(config: Config) -> Self {
        let sessions = PgSessionProvider::from_config(&config);
        App { config, sessions }
    }

    /// Check connectivity once at startup. Non-fatal: the server starts either way
    /// so the failure stays observable through `GET /`.
    pub async fn startup_probe(&self) -> bool {
        startup_probe(&self.sessions, self.config.check_timeout).await
    }

    /// Run a single connectivity check, print the report to stdout and exit.
    pub async fn run_once(self) -> ExitCode {
        let result = {
            let mut stdout = std::io::stdout().lock();
            report_once(&self.sessions, self.config.check_timeout, &mut stdout).await
        };
        self.sessions.close().await;

        match result {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(e) => {
                error!(error = ?e, "failed to write connectivity report");
                ExitCode::FAILURE
            }
        }
    }

    /// Serve HTTP until a shutdown signal arrives, then drain in-flight
    /// requests for at most `shutdown_timeout`.
    pub async fn serve(self) -> ExitCode {
        match self.serve_inner().await {
            Ok(code) => code,
            Err(e) => {
                error!(error = ?e, "web server failed");
                ExitCode::FAILURE
            }
        }
    }

    async fn serve_inner(self) -> anyhow::Result<ExitCode> {
        let addr = self.config.bind_addr();
        let shutdown_timeout = self.config.shutdown_timeout;

        let state = AppState::new(Arc::new(self.sessions.clone()), self.config.check_timeout);
        let router = create_router(state, self.config.request_timeout);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(address = %addr, "web server listening");

        let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = signalled_tx.send(());
            })
            .into_future();

        // Starts counting only once the shutdown signal has been received.
        let drain_deadline = async move {
            match signalled_rx.await {
                Ok(()) => tokio::time::sleep(shutdown_timeout).await,
                Err(_) => std::future::pending::<()>().await,
            }
        };

        let code = tokio::select! {
            result = server => {
                result.context("server error")?;
                info!("web server stopped");
                self.sessions.close().await;
                ExitCode::SUCCESS
            }
            () = drain_deadline => {
                warn!(
                    timeout = fmt_duration(shutdown_timeout),
                    "graceful shutdown timed out, dropping in-flight requests"
                );
                ExitCode::FAILURE
            }
        };

        Ok(code)
    }
}

/// Log the outcome of one connectivity check; returns whether it connected.
async fn startup_probe(provider: &dyn SessionProvider, limit: Duration) -> bool {
    match connectivity::check(provider, limit).await {
        ConnectivityReport::Connected { .. } => {
            info!("database connected");
            true
        }
        ConnectivityReport::Failed { error } => {
            warn!(error = %error, "database connection failed (non-fatal)");
            false
        }
    }
}

/// Write one connectivity report as a single JSON line to `out`.
///
/// Returns whether the database was reachable.
async fn report_once(
    provider: &dyn SessionProvider,
    limit: Duration,
    out: &mut impl Write,
) -> anyhow::Result<bool> {
    let report = connectivity::check(provider, limit).await;
    serde_json::to_writer(&mut *out, &report).context("failed to serialize connectivity report")?;
    writeln!(out).context("failed to write connectivity report")?;
    out.flush().context("failed to flush connectivity report")?;
    Ok(report.is_connected())
}
