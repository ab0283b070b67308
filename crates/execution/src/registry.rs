//! Effect handlers keyed by mission kind.

use std::collections::HashMap;
use std::sync::Arc;
use mission_core::Mission;
use mission_tools::{Executor, ExecutorOutcome};

/// A pure in-process handler run instead of the external executor.
pub type EffectHandler = Arc<dyn Fn(&Mission) -> ExecutorOutcome + Send + Sync>;

/// What carries out a mission of a registered kind.
#[derive(Clone)]
pub enum Effect {
    /// In-process handler
    Handler(EffectHandler),
    /// Dedicated executor, bounded by the engine timeout
    Executor(Arc<dyn Executor>),
}

/// Maps kind tags (case-insensitive) to effects.
#[derive(Clone, Default)]
pub struct EffectRegistry {
    handlers: HashMap<String, Effect>,
}

impl EffectRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `kind`, replacing any previous one.
    pub fn register<F>(&mut self, kind: &str, handler: F) -> &mut Self
    where
        F: Fn(&Mission) -> ExecutorOutcome + Send + Sync + 'static,
    {
        self.handlers
            .insert(normalize(kind), Effect::Handler(Arc::new(handler)));
        self
    }

    /// Route `kind` to its own executor, replacing any previous effect.
    pub fn register_executor(&mut self, kind: &str, executor: Arc<dyn Executor>) -> &mut Self {
        self.handlers.insert(normalize(kind), Effect::Executor(executor));
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(mut self, kind: &str, handler: F) -> Self
    where
        F: Fn(&Mission) -> ExecutorOutcome + Send + Sync + 'static,
    {
        self.register(kind, handler);
        self
    }

    /// Effect for `kind`.
    pub fn get(&self, kind: &str) -> Option<Effect> {
        self.handlers.get(&normalize(kind)).cloned()
    }

    /// Whether `kind` has an effect.
    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(&normalize(kind))
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<_> = self.handlers.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

fn normalize(kind: &str) -> String {
    kind.trim().to_lowercase()
}
