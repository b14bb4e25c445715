//! In-memory model of the backend servers and the tools they offer.
pub mod discovery;
mod transport;

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use rmcp::model::JsonObject;
use serde_json::Value;

use crate::lib::errors::RouterError;

pub use discovery::{discover, DiscoveredRegistry};
pub use transport::TransportConfig;

/// What to index for a server whose configuration has no description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriptionPolicy {
    /// Join the descriptions of the server's tools.
    #[default]
    Synthesize,
    /// Index the server name only.
    Empty,
}

impl DescriptionPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "synthesize" => Some(Self::Synthesize),
            "empty" => Some(Self::Empty),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Synthesize => "synthesize",
            Self::Empty => "empty",
        }
    }
}

/// One tool offered by exactly one backend server.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolEntry {
    pub name: String,
    pub description: String,
    pub input_schema: Arc<JsonObject>,
    pub server_name: String,
}

/// Schema used when a tool declares none: an object accepting anything.
pub fn empty_object_schema() -> JsonObject {
    let mut schema = JsonObject::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema
}

/// One backend server and its tools in registration order.
#[derive(Debug, Clone)]
pub struct ServerEntry {
    pub name: String,
    /// Empty when the configuration gave none.
    pub description: String,
    pub transport: TransportConfig,
    pub tools: Vec<ToolEntry>,
}

impl ServerEntry {
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        transport: TransportConfig,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.unwrap_or_default(),
            transport,
            tools: Vec::new(),
        }
    }

    /// Append a tool owned by this server.
    pub fn with_tool(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: JsonObject,
    ) -> Self {
        let tool = ToolEntry {
            name: name.into(),
            description: description.into(),
            input_schema: Arc::new(input_schema),
            server_name: self.name.clone(),
        };
        self.tools.push(tool);
        self
    }

    pub fn tool(&self, name: &str) -> Option<&ToolEntry> {
        self.tools.iter().find(|tool| tool.name == name)
    }
}

/// Validated, immutable set of backend servers.
///
/// Server positions and flattened tool positions double as index doc ids.
#[derive(Debug)]
pub struct ServerRegistry {
    servers: Vec<ServerEntry>,
    by_name: HashMap<String, usize>,
    tool_refs: Vec<(usize, usize)>,
}

impl ServerRegistry {
    /// Validate `servers` and resolve missing descriptions with `policy`.
    pub fn new(
        mut servers: Vec<ServerEntry>,
        policy: DescriptionPolicy,
    ) -> Result<Self, RouterError> {
        let mut by_name = HashMap::with_capacity(servers.len());
        for (position, server) in servers.iter().enumerate() {
            if server.name.trim().is_empty() {
                return Err(RouterError::invalid_registry(format!(
                    "server #{position} has a blank name"
                )));
            }
            if by_name.insert(server.name.clone(), position).is_some() {
                return Err(RouterError::invalid_registry(format!(
                    "server `{}` is declared more than once",
                    server.name
                )));
            }
        }

        let mut tool_refs = Vec::new();
        for (server_pos, server) in servers.iter().enumerate() {
            let mut seen = HashSet::new();
            for (tool_pos, tool) in server.tools.iter().enumerate() {
                validate_tool(server, tool, &by_name)?;
                if !seen.insert(tool.name.as_str()) {
                    return Err(RouterError::invalid_registry(format!(
                        "tool `{}` is declared more than once on server `{}`",
                        tool.name, server.name
                    )));
                }
                tool_refs.push((server_pos, tool_pos));
            }
        }

        if policy == DescriptionPolicy::Synthesize {
            for server in servers
                .iter_mut()
                .filter(|server| server.description.trim().is_empty())
            {
                server.description = synthesize_description(&server.tools);
            }
        }

        Ok(Self {
            servers,
            by_name,
            tool_refs,
        })
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn tool_count(&self) -> usize {
        self.tool_refs.len()
    }

    pub fn servers(&self) -> &[ServerEntry] {
        &self.servers
    }

    pub fn server(&self, name: &str) -> Option<&ServerEntry> {
        self.by_name
            .get(name)
            .and_then(|position| self.servers.get(*position))
    }

    pub fn tool(&self, server_name: &str, tool_name: &str) -> Option<&ToolEntry> {
        self.server(server_name)?.tool(tool_name)
    }

    /// Server at a server-index doc id.
    pub fn server_at(&self, doc_id: usize) -> Option<&ServerEntry> {
        self.servers.get(doc_id)
    }

    /// Tool at a tool-index doc id (flattened registration order).
    pub fn tool_at(&self, doc_id: usize) -> Option<&ToolEntry> {
        let (server_pos, tool_pos) = *self.tool_refs.get(doc_id)?;
        self.servers.get(server_pos)?.tools.get(tool_pos)
    }

    /// All tools in flattened registration order.
    pub fn tools(&self) -> impl Iterator<Item = &ToolEntry> + '_ {
        self.servers.iter().flat_map(|server| server.tools.iter())
    }
}

fn validate_tool(
    server: &ServerEntry,
    tool: &ToolEntry,
    by_name: &HashMap<String, usize>,
) -> Result<(), RouterError> {
    if tool.name.trim().is_empty() {
        return Err(RouterError::invalid_registry(format!(
            "server `{}` declares a tool with a blank name",
            server.name
        )));
    }
    if !by_name.contains_key(&tool.server_name) {
        return Err(RouterError::invalid_registry(format!(
            "tool `{}` references unknown server `{}`",
            tool.name, tool.server_name
        )));
    }
    if tool.server_name != server.name {
        return Err(RouterError::invalid_registry(format!(
            "tool `{}` references server `{}` but is declared under `{}`",
            tool.name, tool.server_name, server.name
        )));
    }
    Ok(())
}

fn synthesize_description(tools: &[ToolEntry]) -> String {
    tools
        .iter()
        .map(|tool| tool.description.trim())
        .filter(|description| !description.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
