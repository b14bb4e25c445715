use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    time::Instant,
};

use serde::Serialize;

use super::backend::BackendSession;

/// Lifecycle state of one server's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Unconnected,
    Connecting,
    Ready,
    Failed,
    Closed,
}

impl SessionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unconnected => "unconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }

    const fn to_raw(self) -> u8 {
        match self {
            Self::Unconnected => 0,
            Self::Connecting => 1,
            Self::Ready => 2,
            Self::Failed => 3,
            Self::Closed => 4,
        }
    }

    const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Ready,
            3 => Self::Failed,
            4 => Self::Closed,
            _ => Self::Unconnected,
        }
    }
}

/// Lock-free mirror of a slot's status, readable while an attempt holds the latch.
#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(SessionStatus::Unconnected.to_raw()))
    }

    pub(crate) fn get(&self) -> SessionStatus {
        SessionStatus::from_raw(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, status: SessionStatus) {
        self.0.store(status.to_raw(), Ordering::Release);
    }
}

/// The live session owned by the connection manager for one server.
pub(crate) struct Session {
    pub(crate) backend: Arc<dyn BackendSession>,
    pub(crate) generation: u64,
    pub(crate) established_at: Instant,
}

/// Borrowed view of a ready session handed to one caller.
///
/// The generation identifies which session a failure belongs to, so a late
/// failure never tears down a newer replacement.
#[derive(Clone)]
pub struct SessionHandle {
    server_name: String,
    generation: u64,
    backend: Arc<dyn BackendSession>,
}

impl SessionHandle {
    pub(crate) fn new(server_name: &str, session: &Session) -> Self {
        Self {
            server_name: server_name.to_string(),
            generation: session.generation,
            backend: Arc::clone(&session.backend),
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn backend(&self) -> &dyn BackendSession {
        self.backend.as_ref()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("server_name", &self.server_name)
            .field("generation", &self.generation)
            .finish()
    }
}

