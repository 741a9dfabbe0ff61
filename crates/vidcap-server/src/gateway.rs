//! HTTP entry points: streamable HTTP on the base path, legacy SSE on
//! `/sse` + `/messages`, and `/health`.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, OnceLock};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vidcap_core::errors::GatewayError;
use vidcap_core::tools::ToolContext;
use vidcap_core::{EventId, SessionId, TransportKind};

use crate::event_store::DEFAULT_EVENT_CAPACITY;
use crate::mcp::McpServer;
use crate::middleware::{credential_scope, CredentialPolicy};
use crate::rpc::{Payload, RpcResponse};
use crate::session::{Session, SessionRegistry};
use crate::transport::legacy::MESSAGES_PATH;
use crate::transport::{LegacySseTransport, RemoveOnDrop, StreamableTransport};

pub const SESSION_HEADER: &str = "mcp-session-id";
pub const LAST_EVENT_ID_HEADER: &str = "last-event-id";
pub const SSE_PATH: &str = "/sse";
pub const HEALTH_PATH: &str = "/health";

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base_path: String,
    pub event_capacity: usize,
    pub production: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_path: "/mcp".to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            production: false,
        }
    }
}

/// Shared state of every HTTP route.
///
/// The MCP server is installed after construction; until then, routes that
/// would dispatch answer 500 without registering a session.
#[derive(Clone)]
pub struct Gateway {
    server: Arc<OnceLock<Arc<McpServer>>>,
    registry: Arc<SessionRegistry>,
    config: Arc<GatewayConfig>,
}

impl Gateway {
    pub fn new(registry: Arc<SessionRegistry>, config: GatewayConfig) -> Self {
        Self {
            server: Arc::new(OnceLock::new()),
            registry,
            config: Arc::new(config),
        }
    }

    /// Install the server. Only the first call takes effect.
    pub fn install(&self, server: Arc<McpServer>) -> bool {
        let installed = self.server.set(server).is_ok();
        if !installed {
            tracing::warn!("MCP server already installed, ignoring");
        }
        installed
    }

    pub fn server(&self) -> Option<Arc<McpServer>> {
        self.server.get().cloned()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn router(&self) -> Router {
        let policy = CredentialPolicy {
            production: self.config.production,
        };
        Router::new()
            .route(
                &self.config.base_path,
                post(streamable_post).get(streamable_get).delete(streamable_delete),
            )
            .route(SSE_PATH, get(legacy_sse))
            .route(MESSAGES_PATH, post(legacy_message))
            .route(HEALTH_PATH, get(health))
            .with_state(self.clone())
            .layer(axum::middleware::from_fn_with_state(policy, credential_scope))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Strict multiplexed lookup by request header.
    fn session_from_headers(&self, headers: &HeaderMap) -> Result<Arc<Session>, GatewayError> {
        let id = header_session_id(headers).ok_or(GatewayError::MissingSessionId(TransportKind::Multiplexed))?;
        self.registry
            .get(&id, TransportKind::Multiplexed)
            .ok_or(GatewayError::UnknownSession {
                id,
                kind: TransportKind::Multiplexed,
            })
    }
}

fn header_session_id(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| SessionId::parse(v).ok())
}

fn session_header(id: &SessionId) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        headers.insert(SESSION_HEADER, value);
    }
    headers
}

/// Map a routing failure onto the wire shape each endpoint promises.
fn error_response(err: GatewayError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let response = match &err {
        GatewayError::UnknownSession {
            kind: TransportKind::Legacy,
            ..
        }
        | GatewayError::MissingSessionId(TransportKind::Legacy) => {
            (StatusCode::NOT_FOUND, Json(RpcResponse::session_not_found().to_value())).into_response()
        }
        GatewayError::UnknownSession { .. } | GatewayError::MissingSessionId(_) => {
            (StatusCode::BAD_REQUEST, "Invalid or missing session ID").into_response()
        }
        GatewayError::UninitializedServer => (
            status,
            Json(RpcResponse::internal_error(Value::Null, "MCP server not initialized").to_value()),
        )
            .into_response(),
        GatewayError::CredentialFormat(_) => {
            (status, Json(json!({ "error": "Invalid API key format" }))).into_response()
        }
    };
    tracing::warn!(error = %err, kind = err.error_kind(), status = response.status().as_u16(), "request rejected");
    response
}

async fn streamable_post(State(gw): State<Gateway>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(server) = gw.server() else {
        return error_response(GatewayError::UninitializedServer);
    };
    let payload = match Payload::parse(&body) {
        Ok(payload) => payload,
        Err(resp) => return (StatusCode::BAD_REQUEST, Json(resp.to_value())).into_response(),
    };

    // Only an initialize opens a session; anything else must name a live one.
    let requested = header_session_id(&headers);
    let existing = requested
        .as_ref()
        .and_then(|id| gw.registry.get(id, TransportKind::Multiplexed));
    let session = match existing {
        Some(session) => session,
        None if payload.has_initialize() => {
            let capacity = gw.config.event_capacity;
            gw.registry
                .resolve(requested.as_ref(), TransportKind::Multiplexed, |id| {
                    Arc::new(StreamableTransport::new(id.clone(), capacity))
                })
                .session
        }
        None => {
            tracing::warn!(
                session_id = requested.as_ref().map(SessionId::as_str),
                "POST without a live session or initialize"
            );
            return (StatusCode::BAD_REQUEST, Json(RpcResponse::no_valid_session().to_value())).into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    let initialized = session.activate(|id| {
        tracing::info!(session_id = %id, "session initialized");
        response_headers = session_header(id);
    });
    if !initialized {
        response_headers = session_header(session.id());
    }

    let ctx = ToolContext {
        session_id: Some(session.id().clone()),
        notifier: session.notifier(),
    };
    let reply = {
        let _turn = session.lock_dispatch().await;
        server.dispatch(payload, &ctx).await
    };

    match reply {
        Some(reply) => (StatusCode::OK, response_headers, Json(reply)).into_response(),
        None => (StatusCode::ACCEPTED, response_headers).into_response(),
    }
}

async fn streamable_get(State(gw): State<Gateway>, headers: HeaderMap) -> Response {
    let session = match gw.session_from_headers(&headers) {
        Ok(session) => session,
        Err(e) => return error_response(e),
    };
    let Some(transport) = session.transport().as_any().downcast_ref::<StreamableTransport>() else {
        return error_response(GatewayError::UnknownSession {
            id: session.id().clone(),
            kind: TransportKind::Multiplexed,
        });
    };

    let last_event_id = headers
        .get(LAST_EVENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| EventId::parse(v).ok());

    let stream = match transport.open_stream(last_event_id.as_ref()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(session_id = %session.id(), error = %e, "cannot open stream");
            return error_response(GatewayError::UnknownSession {
                id: session.id().clone(),
                kind: TransportKind::Multiplexed,
            });
        }
    };

    let events = stream.map(|(id, message)| {
        Ok::<_, Infallible>(Event::default().id(id.as_str()).event("message").data(message.to_string()))
    });
    (
        session_header(session.id()),
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

async fn streamable_delete(State(gw): State<Gateway>, headers: HeaderMap) -> Response {
    let session = match gw.session_from_headers(&headers) {
        Ok(session) => session,
        Err(e) => return error_response(e),
    };
    gw.registry.remove(session.id(), TransportKind::Multiplexed);
    if let Err(e) = session.transport().close().await {
        tracing::warn!(session_id = %session.id(), error = %e, "transport close failed");
    }
    StatusCode::OK.into_response()
}

async fn legacy_sse(State(gw): State<Gateway>) -> Response {
    if gw.server().is_none() {
        tracing::error!(kind = GatewayError::UninitializedServer.error_kind(), "cannot open SSE stream");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let mut receiver = None;
    let resolved = gw.registry.resolve(None, TransportKind::Legacy, |id| {
        let (transport, rx) = LegacySseTransport::open(id);
        receiver = Some(rx);
        Arc::new(transport)
    });
    let Some(mut rx) = receiver else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let session = resolved.session;
    session.activate(|id| tracing::info!(session_id = %id, "legacy stream opened"));
    let guard = RemoveOnDrop::new(Arc::clone(&gw.registry), session.id().clone(), TransportKind::Legacy);

    let events = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            yield Ok::<_, Infallible>(Event::default().event(event.event_name()).data(event.data()));
        }
    };
    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}

async fn legacy_message(
    State(gw): State<Gateway>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let Some(requested) = query.get("sessionId").and_then(|v| SessionId::parse(v).ok()) else {
        return error_response(GatewayError::MissingSessionId(TransportKind::Legacy));
    };
    let Some(session) = gw.registry.get(&requested, TransportKind::Legacy) else {
        return error_response(GatewayError::UnknownSession {
            id: requested,
            kind: TransportKind::Legacy,
        });
    };
    let Some(server) = gw.server() else {
        return error_response(GatewayError::UninitializedServer);
    };
    let payload = match Payload::parse(&body) {
        Ok(payload) => payload,
        Err(resp) => return (StatusCode::BAD_REQUEST, Json(resp.to_value())).into_response(),
    };

    let ctx = ToolContext {
        session_id: Some(session.id().clone()),
        notifier: session.notifier(),
    };
    let _turn = session.lock_dispatch().await;
    if let Some(reply) = server.dispatch(payload, &ctx).await {
        if let Err(e) = session.transport().send(reply) {
            tracing::warn!(session_id = %session.id(), error = %e, "failed to push response");
        }
    }
    (StatusCode::ACCEPTED, "Accepted").into_response()
}

async fn health(State(gw): State<Gateway>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "serverInstalled": gw.server().is_some(),
        "sessions": gw.registry.counts(),
        "sessionsCreated": gw.registry.created_total(),
    }))
}
