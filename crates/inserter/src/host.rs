//! Replica identity and liveness.

use std::fmt;

/// Liveness of one replica, as observed by its shard worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostState {
    Up,
    Down,
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostState::Up => f.write_str("up"),
            HostState::Down => f.write_str("down"),
        }
    }
}

/// Replica identity: two replicas with the same address and database are
/// the same replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(String);

impl HostId {
    fn new(address: &str, database: &str) -> Self {
        HostId(format!("{address}{database}"))
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capabilities shared by plain and weighted replica descriptions.
///
/// State changes use value semantics: `with_state` returns the updated
/// description, leaving the original untouched.
pub trait Host: Clone + Send + Sync + 'static {
    fn info(&self) -> HostInfo;
    fn with_state(self, state: HostState) -> Self;
}

/// One addressable replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostInfo {
    pub address: String,
    pub database: String,
    pub state: HostState,
}

impl HostInfo {
    /// Describes a replica in the `Up` state.
    pub fn new(address: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            database: database.into(),
            state: HostState::Up,
        }
    }

    pub fn id(&self) -> HostId {
        HostId::new(&self.address, &self.database)
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.database)
    }
}

impl Host for HostInfo {
    fn info(&self) -> HostInfo {
        self.clone()
    }

    fn with_state(mut self, state: HostState) -> Self {
        self.state = state;
        self
    }
}

/// A replica plus its share of the pick stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WeightedHostInfo {
    pub host: HostInfo,
    pub weight: u32,
}

impl WeightedHostInfo {
    /// Describes a replica in the `Up` state. Weight 0 is rejected by the
    /// weighted selector, not here.
    pub fn new(address: impl Into<String>, database: impl Into<String>, weight: u32) -> Self {
        Self {
            host: HostInfo::new(address, database),
            weight,
        }
    }

    pub fn id(&self) -> HostId {
        self.host.id()
    }
}

impl Host for WeightedHostInfo {
    fn info(&self) -> HostInfo {
        self.host.clone()
    }

    fn with_state(mut self, state: HostState) -> Self {
        self.host.state = state;
        self
    }
}
