use once_cell::sync::Lazy;

use crate::node::TABLE_NAME;

static DEFAULT_CONFIG: Lazy<NestedSetConfig> = Lazy::new(|| NestedSetConfig::new("default"));

/// Runtime configuration for the nested-set service.
#[derive(Clone, Debug)]
pub struct NestedSetConfig {
    namespace: String,
    advisory_lock_strategy: AdvisoryLockStrategy,
    verify_invariants: bool,
}

impl NestedSetConfig {
    /// Create a new configuration for a logical namespace (usually the application name).
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let default_lock =
            AdvisoryLockStrategy::PerTable(AdvisoryLockKey::for_table(&namespace, TABLE_NAME));

        Self {
            namespace,
            advisory_lock_strategy: default_lock,
            verify_invariants: false,
        }
    }

    /// Process-wide configuration used by `TreeService::default()`.
    pub fn shared() -> &'static NestedSetConfig {
        &DEFAULT_CONFIG
    }

    /// Merge options produced by [`NestedSetOptions`].
    pub(crate) fn apply_options(mut self, options: NestedSetOptions) -> Self {
        if let Some(strategy) = options.advisory_lock_strategy {
            self.advisory_lock_strategy = strategy;
        }
        if let Some(verify) = options.verify_invariants {
            self.verify_invariants = verify;
        }
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Advisory lock strategy (PostgreSQL only).
    pub fn advisory_lock_strategy(&self) -> &AdvisoryLockStrategy {
        &self.advisory_lock_strategy
    }

    /// Re-check the affected trees inside the transaction before committing.
    pub fn verify_invariants(&self) -> bool {
        self.verify_invariants
    }
}

impl Default for NestedSetConfig {
    fn default() -> Self {
        Self::shared().clone()
    }
}

/// Builder-style overrides for [`NestedSetConfig`].
#[derive(Clone, Debug, Default)]
pub struct NestedSetOptions {
    advisory_lock_strategy: Option<AdvisoryLockStrategy>,
    verify_invariants: Option<bool>,
}

impl NestedSetOptions {
    pub fn advisory_lock_strategy(mut self, strategy: AdvisoryLockStrategy) -> Self {
        self.advisory_lock_strategy = Some(strategy);
        self
    }

    pub fn verify_invariants(mut self, verify: bool) -> Self {
        self.verify_invariants = Some(verify);
        self
    }

    pub fn apply(self, base: NestedSetConfig) -> NestedSetConfig {
        base.apply_options(self)
    }
}

/// Transaction-scoped advisory lock identity: a readable label and the
/// 64-bit id PostgreSQL locks on (crc32 of the label).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AdvisoryLockKey {
    label: String,
    id: i64,
}

impl AdvisoryLockKey {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let id = i64::from(crc32fast::hash(label.as_bytes()));
        Self { label, id }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    fn for_table(namespace: &str, table: &str) -> Self {
        Self::new(format!("nested-set::{namespace}::{table}"))
    }
}

/// Whether mutations serialise on an advisory lock (PostgreSQL only).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AdvisoryLockStrategy {
    Disabled,
    PerTable(AdvisoryLockKey),
}

impl AdvisoryLockStrategy {
    pub fn key(&self) -> Option<&AdvisoryLockKey> {
        match self {
            AdvisoryLockStrategy::Disabled => None,
            AdvisoryLockStrategy::PerTable(key) => Some(key),
        }
    }
}
