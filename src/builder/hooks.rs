// src/builder/hooks.rs

//! Listeners called at fixed points of a formula install

use crate::error::Result;
use std::collections::HashMap;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use tracing::debug;

/// Phase boundaries hooks can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum HookPhase {
    /// After patching and the pause, right before the formula builds
    PreBuild,
    /// After the build, before staging into the bundle
    PostBuild,
    /// After the package is recorded in the manifest
    PostInstall,
}

/// A hook receives the name of the formula being installed
pub type Hook = Box<dyn FnMut(&str) -> Result<()>>;

/// Ordered hook lists per phase
#[derive(Default)]
pub struct Hooks {
    hooks: HashMap<HookPhase, Vec<Hook>>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&HookPhase, usize> =
            self.hooks.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("Hooks").field("registered", &counts).finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook to a phase
    pub fn register<F>(&mut self, phase: HookPhase, hook: F)
    where
        F: FnMut(&str) -> Result<()> + 'static,
    {
        self.hooks.entry(phase).or_default().push(Box::new(hook));
    }

    /// Call every hook of a phase in registration order
    ///
    /// Stops at the first failing hook.
    pub fn run(&mut self, phase: HookPhase, formula: &str) -> Result<()> {
        let Some(hooks) = self.hooks.get_mut(&phase) else {
            return Ok(());
        };
        debug!("Running {} {} hooks for {}", hooks.len(), phase, formula);
        for hook in hooks.iter_mut() {
            hook(formula)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(Vec::is_empty)
    }
}
