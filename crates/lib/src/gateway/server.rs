//! Gateway HTTP server.

use crate::config::{self, Config};
use crate::exec::{CommandExecutor, ShellExecutor};
use crate::gateway::auth::{self, AuthOutcome};
use crate::gateway::protocol::{messages, RunReply};
use crate::whitelist::Whitelist;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared, read-only state for every request (config, token, whitelist, executor).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Resolved bearer token. Empty disables `/run`.
    pub token: Arc<str>,
    pub whitelist: Arc<Whitelist>,
    pub executor: Arc<dyn CommandExecutor>,
}

impl GatewayState {
    pub fn new(
        config: Config,
        token: impl Into<Arc<str>>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        let whitelist = Whitelist::new(config.commands.iter().cloned());
        Self {
            config: Arc::new(config),
            token: token.into(),
            whitelist: Arc::new(whitelist),
            executor,
        }
    }

    /// Resolve the token (env or config) and run commands through `sh` with the configured timeout.
    pub fn from_config(config: Config) -> Self {
        let token = config::resolve_authstr(&config);
        let executor = ShellExecutor::new().with_timeout(config.exec_timeout());
        Self::new(config, token, Arc::new(executor))
    }
}

/// Routes plus the blanket auth layer.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/run", post(run_command))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, state: GatewayState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("gateway server exited")
}

/// Run the gateway; binds to config.bind:config.port and blocks until SIGINT/SIGTERM.
pub async fn run_gateway(config: Config) -> Result<()> {
    let bind_addr = format!("{}:{}", config.bind.trim(), config.port);
    let state = GatewayState::from_config(config);
    if state.token.is_empty() {
        log::warn!("authstr is empty; /run is disabled");
    }
    log::info!(
        "{} whitelist pattern(s) loaded, exec timeout {}",
        state.whitelist.len(),
        state
            .config
            .exec_timeout()
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "disabled".to_string())
    );

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    serve(listener, state, shutdown_signal()).await?;
    log::info!("gateway stopped");
    Ok(())
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET /ping — liveness probe.
async fn ping(addr: Option<ConnectInfo<SocketAddr>>) -> &'static str {
    log::debug!("ping from {}", auth::caller(addr.as_ref()));
    messages::PONG
}

fn text(status: StatusCode, body: impl Into<String>) -> Response {
    (status, body.into()).into_response()
}

/// POST /run — body is the command line. Refusals are 4xx; a command that ran and failed is 200
/// with the error in the body; success is `{"msg": <output>}`.
async fn run_command(
    State(state): State<GatewayState>,
    addr: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let caller = auth::caller(addr.as_ref());
    log::info!("Received POST request from {}: /run", caller);

    if state.token.is_empty() {
        log::info!("Not supported. authstr is empty for request from {}", caller);
        return text(StatusCode::OK, messages::NOT_SUPPORTED);
    }

    if body.is_empty() {
        log::info!("Bad request. Body is empty for request from {}", caller);
        return text(StatusCode::BAD_REQUEST, messages::BODY_IS_NIL);
    }

    match auth::check_authorization(auth::authorization_header(&headers), &state.token) {
        AuthOutcome::Authorized => {}
        AuthOutcome::Blank => {
            log::info!("Bad request. Authorization is blank for request from {}", caller);
            return text(StatusCode::BAD_REQUEST, messages::AUTHORIZATION_BLANK);
        }
        AuthOutcome::Invalid => {
            log::warn!("Forbidden. Authorization invalid for request from {}", caller);
            return text(StatusCode::FORBIDDEN, messages::AUTHORIZATION_INVALID);
        }
    }

    let command = match String::from_utf8(body.to_vec()) {
        Ok(command) => command,
        Err(_) => {
            log::info!("Bad request. Body is not UTF-8 for request from {}", caller);
            return text(StatusCode::BAD_REQUEST, messages::BODY_NOT_UTF8);
        }
    };

    match state.whitelist.find(&command) {
        Some(pattern) => log::debug!(
            "command {:?} allowed by pattern {:?}",
            command,
            pattern.as_str()
        ),
        None => {
            log::warn!("Command not allowed: {} from {}", command, caller);
            return text(
                StatusCode::FORBIDDEN,
                format!("Command `{}` is not allowed", command),
            );
        }
    }

    let output = match state.executor.execute(&command).await {
        Ok(output) => output,
        Err(failure) => {
            log::warn!(
                "Execution failed for request from {}: {}. Error: {}",
                caller,
                command,
                failure.error
            );
            let mut body = format!("exec `{}` fail: {}", command, failure.error);
            if !failure.output.is_empty() {
                body.push('\n');
                body.push_str(&String::from_utf8_lossy(&failure.output));
            }
            return text(StatusCode::OK, body);
        }
    };

    match serde_json::to_vec(&RunReply::from_output(&output)) {
        Ok(json) => {
            log::info!("Sent response to {}: {} byte(s)", caller, json.len());
            ([(header::CONTENT_TYPE, "application/json")], json).into_response()
        }
        Err(e) => {
            log::warn!("JSON encoding failed for request from {}: {}", caller, e);
            output.into_response()
        }
    }
}
