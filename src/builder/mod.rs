// src/builder/mod.rs

//! Build orchestration
//!
//! [`FormulaBuilder`] installs a formula and its dependencies into a
//! bundle. The whole dependency graph is resolved and validated first, then
//! every formula is taken through fetch, stage, patch, pause, build and
//! record in dependency order:
//!
//! ```text
//! resolve graph ─> for each node, leaves first:
//!     skip kits and installed packages
//!     fetch ─> stage ─> patch (fresh copies only) ─> reset install dir ─> pause
//!     pre_build hooks ─> build ─> post_build hooks
//!     stage files into bundle + record in manifest ─> post_install hooks
//! ```
//!
//! A failure stops the run. Packages finished before the failure stay
//! installed; the failing one is never recorded.

mod context;
mod hooks;
mod pause;

pub use context::BuildContext;
pub use hooks::{Hook, HookPhase, Hooks};
pub use pause::{NoPause, Pause, ShellPause};

use crate::bundle::Bundle;
use crate::error::{Error, Result};
use crate::formula::{Formula, Options, Registry};
use crate::graph::DependencyGraph;
use crate::source::{self, SourceLayout};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options for [`FormulaBuilder::install`]
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Rebuild the requested formula even if it is installed
    pub force: bool,
    /// Delete working copies before staging them
    pub clean_source: bool,
}

/// Resolved formulas for one install request
struct Plan {
    root: String,
    graph: DependencyGraph,
    formulas: HashMap<String, Arc<dyn Formula>>,
}

impl Plan {
    /// Names in build order, dependencies first
    fn order(&self) -> Result<Vec<String>> {
        let mut order = Vec::with_capacity(self.graph.len());
        self.graph.traverse(&[self.root.as_str()], |name| {
            order.push(name.to_string());
            Ok(())
        })?;
        Ok(order)
    }

    /// Direct dependencies to record for `name`, with kits replaced by
    /// what they aggregate
    fn recorded_deps(&self, name: &str) -> Vec<String> {
        let mut deps = Vec::new();
        let mut seen = BTreeSet::new();
        self.collect_deps(name, &mut deps, &mut seen);
        deps
    }

    fn collect_deps(&self, name: &str, deps: &mut Vec<String>, seen: &mut BTreeSet<String>) {
        let Some(node) = self.graph.get_node(name) else {
            return;
        };
        for child in &node.children {
            if !seen.insert(child.clone()) {
                continue;
            }
            let is_kit = self.formulas.get(child).is_some_and(|f| f.is_kit());
            if is_kit {
                self.collect_deps(child, deps, seen);
            } else {
                deps.push(child.clone());
            }
        }
    }
}

/// Installs formulas into one bundle
pub struct FormulaBuilder {
    bundle: Bundle,
    registry: Registry,
    context: BuildContext,
    layout: SourceLayout,
    hooks: Hooks,
    pause: Box<dyn Pause>,
}

impl std::fmt::Debug for FormulaBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormulaBuilder")
            .field("bundle", &self.bundle.path())
            .field("context", &self.context)
            .field("layout", &self.layout)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl FormulaBuilder {
    /// `layout.build_dir` should match `context.build_dir`
    pub fn new(
        bundle: Bundle,
        registry: Registry,
        context: BuildContext,
        layout: SourceLayout,
    ) -> Self {
        Self {
            bundle,
            registry,
            context,
            layout,
            hooks: Hooks::new(),
            pause: Box::new(NoPause),
        }
    }

    /// Pause between patching and building every formula
    pub fn with_pause(mut self, pause: Box<dyn Pause>) -> Self {
        self.pause = pause;
        self
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Install a formula and whatever it depends on
    ///
    /// Returns the names of the packages that were built, in build order.
    /// `force` only rebuilds the requested formula; missing dependencies
    /// are always built.
    pub fn install(&mut self, spec: &str, options: &InstallOptions) -> Result<Vec<String>> {
        let plan = self.resolve(spec)?;
        let order = plan.order()?;
        info!("Resolved {}: {}", plan.root, order.join(", "));

        let mut built = Vec::new();
        for name in &order {
            let Some(formula) = plan.formulas.get(name) else {
                return Err(Error::FormulaNotFound {
                    name: name.clone(),
                    searched: "resolved dependency graph".to_string(),
                });
            };
            let force = options.force && *name == plan.root;
            let deps = plan.recorded_deps(name);
            if self.install_one(formula.as_ref(), &deps, force, options.clean_source)? {
                built.push(name.clone());
            }
        }

        Ok(built)
    }

    /// Remove an installed package
    ///
    /// See [`uninstall`].
    pub fn uninstall(&self, name: &str, keep_dependents: bool) -> Result<Vec<String>> {
        uninstall(&self.bundle, name, keep_dependents)
    }

    /// Load every formula reachable from `spec` and build the graph
    ///
    /// Any formula that fails to resolve or validate fails the whole
    /// request before anything is built.
    fn resolve(&mut self, spec: &str) -> Result<Plan> {
        let root = self.registry.get(spec, &Options::new(), &[])?;
        let root_name = root.name().to_string();

        let mut graph = DependencyGraph::new();
        let mut formulas: HashMap<String, Arc<dyn Formula>> = HashMap::new();
        let mut pending = vec![root];

        while let Some(formula) = pending.pop() {
            if formulas.contains_key(formula.name()) {
                continue;
            }

            let extra: Vec<PathBuf> =
                formula.dir().map(|d| vec![d.to_path_buf()]).unwrap_or_default();
            let mut children = Vec::with_capacity(formula.depends_on().len());
            for dep in formula.depends_on() {
                let child = self.registry.get(&dep.name, &dep.options, &extra)?;
                children.push(child.name().to_string());
                pending.push(child);
            }

            graph.add_node(formula.name(), &children, [] as [&str; 0]);
            formulas.insert(formula.name().to_string(), formula);
        }

        Ok(Plan {
            root: root_name,
            graph,
            formulas,
        })
    }

    /// Returns false when the formula was skipped
    fn install_one(
        &mut self,
        formula: &dyn Formula,
        deps: &[String],
        force: bool,
        clean_source: bool,
    ) -> Result<bool> {
        let name = formula.name();
        if formula.is_kit() {
            debug!("{} is a kit, nothing to build", name);
            return Ok(false);
        }

        let manifest = self.bundle.manifest();
        if !force && manifest.is_installed(name)? {
            info!("{} is already installed", name);
            return Ok(false);
        }

        info!("Installing {} {}", name, formula.version());
        let source = formula
            .source()
            .ok_or_else(|| Error::formula(name, "missing source"))?;
        let runner = self.context.runner();

        let fetcher = source::fetcher_for(name, formula.version(), source, &self.layout, &runner)?;
        fetcher.fetch()?;
        if clean_source {
            fetcher.clean()?;
        }
        let restaged = fetcher.is_stale()?;
        let source_dir = fetcher.stage()?;

        // A reused working copy already carries its patches
        if restaged {
            let candidates = self.patch_dirs(formula);
            source::patch_source(formula.patches(), &candidates, &source_dir, &runner)?;
        } else {
            debug!("Reusing patched working copy {}", source_dir.display());
        }

        self.context.reset_install_dir()?;
        self.pause.pause(name, &source_dir, &runner)?;

        self.hooks.run(HookPhase::PreBuild, name)?;
        let files = formula.build(&self.context, &source_dir)?;
        self.hooks.run(HookPhase::PostBuild, name)?;

        manifest.install(name, formula.version(), deps, &files, force)?;
        self.hooks.run(HookPhase::PostInstall, name)?;

        info!("Installed {} {}", name, formula.version());
        Ok(true)
    }

    /// Directories searched for a formula's patches, most specific first
    fn patch_dirs(&self, formula: &dyn Formula) -> Vec<PathBuf> {
        let Some(dir) = formula.dir() else {
            return Vec::new();
        };
        let toolchain = &self.context.toolchain;
        let local = dir.join("patches").join(formula.name());
        let shared = dir.join("..").join("patches").join(formula.name());
        vec![local.join(toolchain), local, shared.join(toolchain), shared]
    }
}

/// Remove an installed package from a bundle
///
/// Unless `keep_dependents` is set, installed packages depending on `name`
/// are removed first, dependents before their dependencies. With it set,
/// only `name` goes and its dependents are reported as orphaned. Returns
/// the removed names in removal order.
pub fn uninstall(bundle: &Bundle, name: &str, keep_dependents: bool) -> Result<Vec<String>> {
    let manifest = bundle.manifest();
    if !manifest.is_installed(name)? {
        return Err(Error::Bundle(format!("{} is not installed", name)));
    }

    let installed: BTreeSet<String> = manifest.installed()?.into_iter().map(|p| p.name).collect();
    let mut graph = DependencyGraph::new();
    for package in &installed {
        graph.add_node(package, manifest.deps(package)?, [] as [&str; 0]);
    }

    let dependents: Vec<String> = graph
        .required_by(name)
        .into_iter()
        .filter(|n| installed.contains(n))
        .collect();

    let mut removed = Vec::new();
    if keep_dependents {
        if !dependents.is_empty() {
            warn!("Orphaned packages (depend on {}): {}", name, dependents.join(", "));
        }
    } else if !dependents.is_empty() {
        let starts: Vec<&str> = dependents.iter().map(String::as_str).collect();
        let mut order = Vec::new();
        graph.traverse(&starts, |n| {
            if dependents.iter().any(|d| d == n) {
                order.push(n.to_string());
            }
            Ok(())
        })?;

        for dependent in order.into_iter().rev() {
            info!("Removing {} (depends on {})", dependent, name);
            manifest.uninstall(&dependent)?;
            removed.push(dependent);
        }
    }

    info!("Removing {}", name);
    manifest.uninstall(name)?;
    removed.push(name.to_string());
    Ok(removed)
}
