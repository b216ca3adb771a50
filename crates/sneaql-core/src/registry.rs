//! Capability registry.
//!
//! Maps a capability kind and a name to a factory. Built-in commands,
//! dialects, connectors and sources are registered by
//! [`Registry::with_builtins`]; extensions register the same way before the
//! registry is shared with a [`Transform`](crate::transform::Transform).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::commands::Command;
use crate::config::TransformConfig;
use crate::database::Connector;
use crate::dialect::Dialect;
use crate::error::{SneaqlError, SneaqlResult};
use crate::repo::RepoSource;
use crate::steps::{StepSource, StepSourceContext};

/// Kinds of registered capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Command,
    DatabaseDialect,
    Connector,
    RepoManager,
    StepMetadataManager,
}

impl CapabilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Command => "command",
            CapabilityKind::DatabaseDialect => "database-dialect",
            CapabilityKind::Connector => "connector",
            CapabilityKind::RepoManager => "repo-manager",
            CapabilityKind::StepMetadataManager => "step-metadata-manager",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type CommandFactory = Arc<dyn Fn() -> Box<dyn Command> + Send + Sync>;
pub type DialectFactory = Arc<dyn Fn() -> Dialect + Send + Sync>;
pub type ConnectorFactory = Arc<dyn Fn() -> Arc<dyn Connector> + Send + Sync>;
pub type RepoSourceFactory =
    Arc<dyn Fn(&TransformConfig) -> SneaqlResult<Box<dyn RepoSource>> + Send + Sync>;
pub type StepSourceFactory =
    Arc<dyn Fn(&StepSourceContext<'_>) -> SneaqlResult<Box<dyn StepSource>> + Send + Sync>;

/// A registered factory. The variant determines the capability kind.
#[derive(Clone)]
pub enum Capability {
    Command(CommandFactory),
    DatabaseDialect(DialectFactory),
    Connector(ConnectorFactory),
    RepoManager(RepoSourceFactory),
    StepMetadataManager(StepSourceFactory),
}

impl Capability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::Command(_) => CapabilityKind::Command,
            Capability::DatabaseDialect(_) => CapabilityKind::DatabaseDialect,
            Capability::Connector(_) => CapabilityKind::Connector,
            Capability::RepoManager(_) => CapabilityKind::RepoManager,
            Capability::StepMetadataManager(_) => CapabilityKind::StepMetadataManager,
        }
    }

    pub fn command<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn Command> + Send + Sync + 'static,
    {
        Capability::Command(Arc::new(factory))
    }

    pub fn dialect<F>(factory: F) -> Self
    where
        F: Fn() -> Dialect + Send + Sync + 'static,
    {
        Capability::DatabaseDialect(Arc::new(factory))
    }

    pub fn connector<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Connector> + Send + Sync + 'static,
    {
        Capability::Connector(Arc::new(factory))
    }

    pub fn repo_manager<F>(factory: F) -> Self
    where
        F: Fn(&TransformConfig) -> SneaqlResult<Box<dyn RepoSource>> + Send + Sync + 'static,
    {
        Capability::RepoManager(Arc::new(factory))
    }

    pub fn step_metadata_manager<F>(factory: F) -> Self
    where
        F: Fn(&StepSourceContext<'_>) -> SneaqlResult<Box<dyn StepSource>>
            + Send
            + Sync
            + 'static,
    {
        Capability::StepMetadataManager(Arc::new(factory))
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({})", self.kind())
    }
}

/// Append-only registry of capabilities.
pub struct Registry {
    entries: HashMap<CapabilityKind, Vec<(String, Capability)>>,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in capability.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtins();
        registry
    }

    /// Add every built-in capability. Names registered earlier keep their
    /// existing entry.
    pub fn register_builtins(&mut self) {
        crate::commands::register_builtins(self);
        crate::dialect::register_builtins(self);
        crate::database::register_builtins(self);
        crate::repo::register_builtins(self);
        crate::steps::register_builtins(self);
    }

    /// Register a capability under `name`.
    ///
    /// Returns false, leaving the existing entry in place, when the name is
    /// already taken for this kind.
    pub fn register(&mut self, name: impl Into<String>, capability: Capability) -> bool {
        let name = name.into();
        let kind = capability.kind();
        let list = self.entries.entry(kind).or_default();
        if list.iter().any(|(n, _)| *n == name) {
            tracing::debug!(kind = %kind, name = %name, "Ignoring duplicate registration");
            return false;
        }
        list.push((name, capability));
        true
    }

    /// Look up a capability by kind and name.
    pub fn resolve(&self, kind: CapabilityKind, name: &str) -> SneaqlResult<&Capability> {
        self.entries
            .get(&kind)
            .and_then(|list| list.iter().find(|(n, _)| n == name))
            .map(|(_, c)| c)
            .ok_or_else(|| SneaqlError::CapabilityNotFound {
                kind,
                name: name.to_string(),
            })
    }

    /// Check if a capability is registered.
    pub fn has(&self, kind: CapabilityKind, name: &str) -> bool {
        self.resolve(kind, name).is_ok()
    }

    /// Registered names for a kind, in registration order.
    pub fn names(&self, kind: CapabilityKind) -> Vec<&str> {
        self.entries
            .get(&kind)
            .map(|list| list.iter().map(|(n, _)| n.as_str()).collect())
            .unwrap_or_default()
    }

    /// Construct the command registered as `name`.
    pub fn command(&self, name: &str) -> SneaqlResult<Box<dyn Command>> {
        match self.resolve(CapabilityKind::Command, name)? {
            Capability::Command(factory) => Ok(factory()),
            other => Err(mismatch(other, CapabilityKind::Command, name)),
        }
    }

    pub fn dialect(&self, name: &str) -> SneaqlResult<Dialect> {
        match self.resolve(CapabilityKind::DatabaseDialect, name)? {
            Capability::DatabaseDialect(factory) => Ok(factory()),
            other => Err(mismatch(other, CapabilityKind::DatabaseDialect, name)),
        }
    }

    pub fn connector(&self, name: &str) -> SneaqlResult<Arc<dyn Connector>> {
        match self.resolve(CapabilityKind::Connector, name)? {
            Capability::Connector(factory) => Ok(factory()),
            other => Err(mismatch(other, CapabilityKind::Connector, name)),
        }
    }

    pub fn repo_source(
        &self,
        name: &str,
        config: &TransformConfig,
    ) -> SneaqlResult<Box<dyn RepoSource>> {
        match self.resolve(CapabilityKind::RepoManager, name)? {
            Capability::RepoManager(factory) => factory(config),
            other => Err(mismatch(other, CapabilityKind::RepoManager, name)),
        }
    }

    pub fn step_source(
        &self,
        name: &str,
        ctx: &StepSourceContext<'_>,
    ) -> SneaqlResult<Box<dyn StepSource>> {
        match self.resolve(CapabilityKind::StepMetadataManager, name)? {
            Capability::StepMetadataManager(factory) => factory(ctx),
            other => Err(mismatch(other, CapabilityKind::StepMetadataManager, name)),
        }
    }

    /// Name of the first registered dialect that appears in a connection URL.
    pub fn database_type(&self, url: &str) -> Option<&str> {
        let url = url.to_lowercase();
        self.names(CapabilityKind::DatabaseDialect)
            .into_iter()
            .find(|name| url.contains(name))
    }
}

fn mismatch(found: &Capability, kind: CapabilityKind, name: &str) -> SneaqlError {
    SneaqlError::Configuration(format!(
        "{} '{}' is registered as a {}",
        kind,
        name,
        found.kind()
    ))
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (kind, list) in &self.entries {
            map.entry(kind, &list.iter().map(|(n, _)| n).collect::<Vec<_>>());
        }
        map.finish()
    }
}
