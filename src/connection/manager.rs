use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use rmcp::model::{CallToolResult, JsonObject};
use tokio::{sync::Mutex, time};
use tracing::{info, warn, Instrument};

use super::{
    backend::{BackendError, BackendSession, Connector},
    session::{Session, SessionHandle, SessionStatus, StatusCell},
};
use crate::{
    lib::{errors::RouterError, telemetry::CallSpan},
    registry::{ServerEntry, ServerRegistry},
};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bounds for session establishment and tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    pub connect: Duration,
    pub call: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            call: DEFAULT_CALL_TIMEOUT,
        }
    }
}

#[derive(Default)]
struct SlotState {
    session: Option<Session>,
    /// Error of the latest establishment attempt, handed to queued callers.
    failed_attempt: Option<RouterError>,
    /// Why the previous session stopped being usable.
    last_error: Option<String>,
    next_generation: u64,
}

/// Per-server latch. Holding `state` is what serializes establishment.
struct SessionSlot {
    state: Mutex<SlotState>,
    status: StatusCell,
    completed_attempts: AtomicU64,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::default()),
            status: StatusCell::new(),
            completed_attempts: AtomicU64::new(0),
        }
    }
}

/// Owns at most one session per registered server and proxies tool calls.
///
/// The slot table is fixed at construction; only the slot contents change, each
/// under its own lock, so one server's failures or latency never reach another.
pub struct ConnectionManager {
    registry: Arc<ServerRegistry>,
    connector: Arc<dyn Connector>,
    slots: HashMap<String, SessionSlot>,
    timeouts: SessionTimeouts,
}

impl ConnectionManager {
    pub fn new(
        registry: Arc<ServerRegistry>,
        connector: Arc<dyn Connector>,
        timeouts: SessionTimeouts,
    ) -> Self {
        let slots = registry
            .servers()
            .iter()
            .map(|server| (server.name.clone(), SessionSlot::new()))
            .collect();
        Self {
            registry,
            connector,
            slots,
            timeouts,
        }
    }

    pub fn timeouts(&self) -> SessionTimeouts {
        self.timeouts
    }

    /// Current state of `server_name`'s session, `None` for unknown servers.
    pub fn status(&self, server_name: &str) -> Option<SessionStatus> {
        self.slots.get(server_name).map(|slot| slot.status.get())
    }

    /// Install an already initialized session, e.g. one opened during discovery.
    pub async fn adopt(
        &self,
        server_name: &str,
        backend: Box<dyn BackendSession>,
    ) -> Result<(), RouterError> {
        let (_, slot) = self.lookup(server_name)?;
        let mut state = slot.state.lock().await;
        state.next_generation += 1;
        let generation = state.next_generation;
        let previous = state.session.replace(Session {
            backend: Arc::from(backend),
            generation,
            established_at: Instant::now(),
        });
        state.failed_attempt = None;
        state.last_error = None;
        slot.status.set(SessionStatus::Ready);
        drop(state);

        if let Some(previous) = previous {
            retire(previous);
        }
        Ok(())
    }

    /// Return the live session for `server_name`, establishing it if needed.
    pub async fn get_session(&self, server_name: &str) -> Result<SessionHandle, RouterError> {
        self.get_session_with_timeout(server_name, self.timeouts.connect)
            .await
    }

    /// Like [`get_session`](Self::get_session) with an explicit bound.
    ///
    /// `timeout` covers queueing behind another caller as well as the handshake.
    /// Callers that queue behind an in-flight attempt receive its outcome instead
    /// of starting a second one.
    pub async fn get_session_with_timeout(
        &self,
        server_name: &str,
        timeout: Duration,
    ) -> Result<SessionHandle, RouterError> {
        let (server, slot) = self.lookup(server_name)?;
        let started_at = Instant::now();
        let seen_attempts = slot.completed_attempts.load(Ordering::Acquire);
        let Ok(mut state) = time::timeout(timeout, slot.state.lock()).await else {
            return Err(connect_timeout(server_name, timeout));
        };

        if let Some(session) = state.session.as_ref() {
            if !session.backend.is_closed() {
                return Ok(SessionHandle::new(server_name, session));
            }
            warn!(
                target: "mcp_copilot::connection",
                server = server_name,
                generation = session.generation,
                "Backend transport closed; marking session failed"
            );
            if let Some(stale) = state.session.take() {
                retire(stale);
            }
            state.last_error = Some("backend transport closed".into());
            slot.status.set(SessionStatus::Failed);
        }

        if slot.completed_attempts.load(Ordering::Acquire) != seen_attempts {
            if let Some(err) = state.failed_attempt.clone() {
                return Err(err);
            }
            let cause = state
                .last_error
                .clone()
                .unwrap_or_else(|| "connection attempt failed".into());
            return Err(RouterError::ConnectFailed {
                server: server_name.to_string(),
                cause,
            });
        }

        let remaining = timeout.saturating_sub(started_at.elapsed());
        let result = self
            .establish(server, slot, &mut state, timeout, remaining)
            .await;
        state.failed_attempt = result.as_ref().err().cloned();
        slot.completed_attempts.fetch_add(1, Ordering::AcqRel);
        result
    }

    async fn establish(
        &self,
        server: &ServerEntry,
        slot: &SessionSlot,
        state: &mut SlotState,
        timeout: Duration,
        remaining: Duration,
    ) -> Result<SessionHandle, RouterError> {
        slot.status.set(SessionStatus::Connecting);
        info!(
            target: "mcp_copilot::connection",
            server = %server.name,
            transport = server.transport.kind(),
            endpoint = server.transport.endpoint(),
            "Connecting to backend server"
        );
        let started_at = Instant::now();

        match time::timeout(remaining, self.connector.connect(server)).await {
            Ok(Ok(backend)) => {
                state.next_generation += 1;
                let session = Session {
                    backend: Arc::from(backend),
                    generation: state.next_generation,
                    established_at: Instant::now(),
                };
                let handle = SessionHandle::new(&server.name, &session);
                state.session = Some(session);
                state.last_error = None;
                slot.status.set(SessionStatus::Ready);
                info!(
                    target: "mcp_copilot::connection",
                    server = %server.name,
                    generation = handle.generation(),
                    elapsed_ms = started_at.elapsed().as_millis(),
                    "Backend session ready"
                );
                Ok(handle)
            }
            Ok(Err(err)) => {
                let cause = err.to_string();
                state.last_error = Some(cause.clone());
                slot.status.set(SessionStatus::Failed);
                warn!(
                    target: "mcp_copilot::connection",
                    server = %server.name,
                    error = %cause,
                    "Failed to connect to backend server"
                );
                Err(RouterError::ConnectFailed {
                    server: server.name.clone(),
                    cause,
                })
            }
            Err(_) => {
                let timeout_ms = duration_ms(timeout);
                state.last_error = Some(format!("connection timed out after {timeout_ms} ms"));
                slot.status.set(SessionStatus::Failed);
                warn!(
                    target: "mcp_copilot::connection",
                    server = %server.name,
                    timeout_ms,
                    "Timed out connecting to backend server"
                );
                Err(connect_timeout(&server.name, timeout))
            }
        }
    }

    /// Call `tool_name` on `server_name`, forwarding `params` untouched.
    ///
    /// Establishment and the call get the default connect and call bounds.
    /// Unknown servers and undeclared tools fail before any backend I/O.
    pub async fn invoke(
        &self,
        server_name: &str,
        tool_name: &str,
        params: Option<JsonObject>,
    ) -> Result<CallToolResult, RouterError> {
        self.invoke_bounded(server_name, tool_name, params, None)
            .await
    }

    /// Like [`invoke`](Self::invoke), with `timeout` bounding the whole
    /// operation: waiting for or opening the session plus the call itself.
    pub async fn invoke_with_timeout(
        &self,
        server_name: &str,
        tool_name: &str,
        params: Option<JsonObject>,
        timeout: Duration,
    ) -> Result<CallToolResult, RouterError> {
        self.invoke_bounded(server_name, tool_name, params, Some(timeout))
            .await
    }

    async fn invoke_bounded(
        &self,
        server_name: &str,
        tool_name: &str,
        params: Option<JsonObject>,
        overall: Option<Duration>,
    ) -> Result<CallToolResult, RouterError> {
        let (server, _) = self.lookup(server_name)?;
        if server.tool(tool_name).is_none() {
            return Err(RouterError::UnknownTool {
                server: server_name.to_string(),
                tool: tool_name.to_string(),
            });
        }

        let started_at = Instant::now();
        let connect_bound =
            overall.map_or(self.timeouts.connect, |limit| limit.min(self.timeouts.connect));
        let handle = self
            .get_session_with_timeout(server_name, connect_bound)
            .await?;
        let (timeout, call_bound) = match overall {
            Some(limit) => (limit, limit.saturating_sub(started_at.elapsed())),
            None => (self.timeouts.call, self.timeouts.call),
        };

        let call = CallSpan::start(server_name, tool_name);
        let outcome = time::timeout(
            call_bound,
            handle
                .backend()
                .call_tool(tool_name, params.unwrap_or_default()),
        )
        .instrument(call.span().clone())
        .await;

        match outcome {
            Ok(Ok(result)) => {
                call.finish("ok");
                Ok(result)
            }
            Ok(Err(BackendError::Rejected(error))) => {
                call.finish("rejected");
                Err(RouterError::ExecutionFailed {
                    server: server_name.to_string(),
                    tool: tool_name.to_string(),
                    error,
                })
            }
            Ok(Err(err)) => {
                let cause = err.to_string();
                self.downgrade(&handle, &cause).await;
                call.finish("transport_error");
                Err(RouterError::TransportError {
                    server: server_name.to_string(),
                    tool: tool_name.to_string(),
                    cause,
                })
            }
            Err(_) => {
                let timeout_ms = duration_ms(timeout);
                self.downgrade(&handle, &format!("call timed out after {timeout_ms} ms"))
                    .await;
                call.finish("timeout");
                Err(RouterError::Timeout {
                    server: server_name.to_string(),
                    tool: Some(tool_name.to_string()),
                    operation: "call",
                    timeout_ms,
                })
            }
        }
    }

    /// Close every live session; the next call to a server reconnects it.
    pub async fn close_all(&self) {
        for server in self.registry.servers() {
            let Some(slot) = self.slots.get(&server.name) else {
                continue;
            };
            let mut state = slot.state.lock().await;
            let Some(session) = state.session.take() else {
                continue;
            };
            slot.status.set(SessionStatus::Closed);
            drop(state);

            if time::timeout(SHUTDOWN_TIMEOUT, session.backend.close())
                .await
                .is_err()
            {
                warn!(
                    target: "mcp_copilot::connection",
                    server = %server.name,
                    "Backend session did not close in time"
                );
            }
        }
    }

    /// Mark the session behind `handle` failed unless it was already replaced.
    async fn downgrade(&self, handle: &SessionHandle, cause: &str) {
        let Some(slot) = self.slots.get(handle.server_name()) else {
            return;
        };
        let mut state = slot.state.lock().await;
        let is_current = state
            .session
            .as_ref()
            .is_some_and(|session| session.generation == handle.generation());
        if !is_current {
            return;
        }
        let stale = state.session.take();
        state.last_error = Some(cause.to_string());
        slot.status.set(SessionStatus::Failed);
        drop(state);

        if let Some(stale) = stale {
            warn!(
                target: "mcp_copilot::connection",
                server = handle.server_name(),
                generation = stale.generation,
                session_age_ms = stale.established_at.elapsed().as_millis(),
                cause,
                "Backend session failed"
            );
            retire(stale);
        }
    }

    fn lookup(&self, server_name: &str) -> Result<(&ServerEntry, &SessionSlot), RouterError> {
        self.registry
            .server(server_name)
            .zip(self.slots.get(server_name))
            .ok_or_else(|| RouterError::UnknownServer {
                server: server_name.to_string(),
            })
    }
}

/// Close a replaced or failed session without holding up the caller.
fn retire(session: Session) {
    tokio::spawn(async move {
        let _ = time::timeout(SHUTDOWN_TIMEOUT, session.backend.close()).await;
    });
}

fn connect_timeout(server_name: &str, timeout: Duration) -> RouterError {
    RouterError::Timeout {
        server: server_name.to_string(),
        tool: None,
        operation: "connect",
        timeout_ms: duration_ms(timeout),
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
