//! Startup tool discovery for servers whose configuration lists no tools.
use std::{sync::Arc, time::Duration};

use tokio::{task::JoinSet, time};
use tracing::{info, warn};

use super::{DescriptionPolicy, ServerEntry, ServerRegistry};
use crate::{
    connection::{BackendSession, Connector},
    lib::errors::RouterError,
};

/// Registry completed by discovery plus the sessions opened along the way.
pub struct DiscoveredRegistry {
    pub registry: ServerRegistry,
    pub sessions: Vec<(String, Box<dyn BackendSession>)>,
}

impl std::fmt::Debug for DiscoveredRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sessions: Vec<_> = self.sessions.iter().map(|(name, _)| name).collect();
        f.debug_struct("DiscoveredRegistry")
            .field("registry", &self.registry)
            .field("sessions", &sessions)
            .finish()
    }
}

/// Fill in the tool list of every server configured without one.
///
/// Servers are queried concurrently, each bounded by `timeout`. A server that
/// cannot be reached or lists nothing is dropped with a warning so a single bad
/// backend never keeps the router from starting. Registration order is kept.
pub async fn discover(
    mut servers: Vec<ServerEntry>,
    connector: Arc<dyn Connector>,
    timeout: Duration,
    policy: DescriptionPolicy,
) -> Result<DiscoveredRegistry, RouterError> {
    let mut pending = JoinSet::new();
    for (position, server) in servers.iter().enumerate() {
        if !server.tools.is_empty() {
            continue;
        }
        let server = server.clone();
        let connector = Arc::clone(&connector);
        pending.spawn(async move {
            let outcome = list_server_tools(&server, connector.as_ref(), timeout).await;
            (position, outcome)
        });
    }

    let mut dropped = vec![false; servers.len()];
    let mut sessions = Vec::new();
    while let Some(joined) = pending.join_next().await {
        let (position, outcome) = match joined {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    target: "mcp_copilot::discovery",
                    error = %err,
                    "Discovery task aborted"
                );
                continue;
            }
        };
        let server = &mut servers[position];
        match outcome {
            Ok((tools, session)) if !tools.is_empty() => {
                info!(
                    target: "mcp_copilot::discovery",
                    server = %server.name,
                    tools = tools.len(),
                    "Discovered backend tools"
                );
                server.tools = tools;
                sessions.push((server.name.clone(), session));
            }
            Ok((_, session)) => {
                warn!(
                    target: "mcp_copilot::discovery",
                    server = %server.name,
                    "Backend server lists no tools; skipping it"
                );
                session.close().await;
                dropped[position] = true;
            }
            Err(cause) => {
                warn!(
                    target: "mcp_copilot::discovery",
                    server = %server.name,
                    error = %cause,
                    "Tool discovery failed; skipping server"
                );
                dropped[position] = true;
            }
        }
    }

    // Aborted tasks leave their server without tools; treat them as dropped too.
    let servers: Vec<_> = servers
        .into_iter()
        .zip(dropped)
        .filter(|(server, dropped)| !dropped && !server.tools.is_empty())
        .map(|(server, _)| server)
        .collect();

    let registry = ServerRegistry::new(servers, policy)?;
    Ok(DiscoveredRegistry { registry, sessions })
}

async fn list_server_tools(
    server: &ServerEntry,
    connector: &dyn Connector,
    timeout: Duration,
) -> Result<(Vec<super::ToolEntry>, Box<dyn BackendSession>), String> {
    let session = time::timeout(timeout, connector.connect(server))
        .await
        .map_err(|_| format!("connection timed out after {} ms", timeout.as_millis()))?
        .map_err(|err| err.to_string())?;

    match time::timeout(timeout, session.list_tools()).await {
        Ok(Ok(tools)) => Ok((tools, session)),
        Ok(Err(err)) => {
            session.close().await;
            Err(err.to_string())
        }
        Err(_) => {
            session.close().await;
            Err(format!("tools/list timed out after {} ms", timeout.as_millis()))
        }
    }
}
