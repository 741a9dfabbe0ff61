//! Process lifecycle: build components, serve one transport, shut down.
//!
//! Shutdown itself is delegated to [`ShutdownCoordinator`]; the lifecycle
//! drops cached clients once it returns.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use vidcap_api::{ClientCache, ClientConfig, ScreenshotApi, VidcapApi, REQUEST_TIMEOUT};
use vidcap_core::errors::FatalStartupError;
use vidcap_tools::create_default_registry;

use crate::config::Settings;
use crate::gateway::{Gateway, GatewayConfig};
use crate::mcp::{McpServer, ServerInfo};
use crate::session::SessionRegistry;
use crate::shutdown::{ShutdownCoordinator, ShutdownReport};
use crate::transport::serve_stdio;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportMode {
    Stdio,
    Http,
}

impl FromStr for TransportMode {
    type Err = FatalStartupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            _ => Err(FatalStartupError::UnknownTransportMode(s.to_string())),
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => f.write_str("stdio"),
            Self::Http => f.write_str("http"),
        }
    }
}

pub struct Lifecycle {
    settings: Settings,
    cache: Arc<ClientCache>,
    gateway: Gateway,
    server: Arc<McpServer>,
    coordinator: ShutdownCoordinator,
}

impl Lifecycle {
    /// Build the client cache, tool registry and MCP server, and install the
    /// server into a fresh gateway.
    pub fn new(settings: Settings) -> Result<Self, FatalStartupError> {
        let cache = Arc::new(ClientCache::new(ClientConfig {
            base_url: settings.vidcap.base_url.clone(),
            ..ClientConfig::default()
        }));
        let screenshots = ScreenshotApi::new(
            settings.screenshot.base_url.clone(),
            settings.screenshot.access_key.clone(),
            REQUEST_TIMEOUT,
        )
        .map_err(|e| FatalStartupError::Client(e.to_string()))?;

        let tools = create_default_registry(VidcapApi::new(Arc::clone(&cache)), Arc::new(screenshots));
        tracing::info!(tool_count = tools.count(), "tools registered");
        let server = Arc::new(McpServer::new(ServerInfo::default(), Arc::new(tools)));

        let gateway = Gateway::new(
            Arc::new(SessionRegistry::new()),
            GatewayConfig {
                base_path: settings.server.path.clone(),
                event_capacity: settings.server.event_capacity,
                production: settings.production,
            },
        );
        gateway.install(Arc::clone(&server));
        let coordinator = ShutdownCoordinator::new(settings.server.shutdown_timeout());

        Ok(Self {
            settings,
            cache,
            gateway,
            server,
            coordinator,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn cache(&self) -> &Arc<ClientCache> {
        &self.cache
    }

    /// Serve `mode` until `shutdown_signal` resolves (or stdin closes).
    pub async fn run<S>(self, mode: TransportMode, shutdown_signal: S) -> Result<ShutdownReport, FatalStartupError>
    where
        S: Future<Output = ()> + Send,
    {
        tracing::info!(transport = %mode, "starting");
        match mode {
            TransportMode::Stdio => {
                self.run_stdio(tokio::io::stdin(), tokio::io::stdout(), shutdown_signal)
                    .await
            }
            TransportMode::Http => {
                let addr = self.settings.server.bind_addr();
                let listener = TcpListener::bind(&addr)
                    .await
                    .map_err(|source| FatalStartupError::Bind { addr, source })?;
                self.serve_http(listener, shutdown_signal).await
            }
        }
    }

    pub async fn run_stdio<R, W, S>(
        &self,
        reader: R,
        writer: W,
        shutdown_signal: S,
    ) -> Result<ShutdownReport, FatalStartupError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        S: Future<Output = ()>,
    {
        tokio::select! {
            result = serve_stdio(Arc::clone(&self.server), reader, writer) => {
                result.map_err(|e| FatalStartupError::StdioAttach(e.to_string()))?;
            }
            () = shutdown_signal => {
                tracing::info!("shutdown signal received");
            }
        }
        Ok(self.shutdown(Vec::new()).await)
    }

    pub async fn serve_http<S>(&self, listener: TcpListener, shutdown_signal: S) -> Result<ShutdownReport, FatalStartupError>
    where
        S: Future<Output = ()>,
    {
        let local = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| self.settings.server.bind_addr());
        tracing::info!(addr = %local, path = %self.settings.server.path, "HTTP transport listening");

        let router = self.gateway.router();
        let token = self.coordinator.token();
        let handle = tokio::spawn(async move {
            let stop = async move { token.cancelled().await };
            if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(stop).await {
                tracing::error!(error = %e, "HTTP listener failed");
            }
        });

        shutdown_signal.await;
        tracing::info!("shutdown signal received");
        Ok(self.shutdown(vec![handle]).await)
    }

    /// Close every session and stop `listeners` within the configured
    /// timeout, then drop cached API clients.
    pub async fn shutdown(&self, listeners: Vec<JoinHandle<()>>) -> ShutdownReport {
        let report = self.coordinator.shutdown(self.gateway.registry(), listeners).await;
        self.cache.clear();
        tracing::info!(sessions_closed = report.sessions_closed, drained = report.drained, "shutdown complete");
        report
    }
}
