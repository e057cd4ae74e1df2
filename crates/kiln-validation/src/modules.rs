//! Module index of a run
//!
//! Maps every planned module to its spec and remembers which project
//! modules each produced artifact imports, so the reference check can detect
//! unresolved imports and cycles among artifacts generated so far.

use crate::source::{Import, SourceUnit};
use kiln_artifact::{ArtifactSpec, ModulePath};
use std::collections::{BTreeMap, BTreeSet};

/// Planned and produced modules under one package root
#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    package_root: String,
    planned: BTreeMap<ModulePath, String>,
    produced: BTreeMap<ModulePath, BTreeSet<ModulePath>>,
}

impl ModuleIndex {
    /// Create empty index
    #[inline]
    #[must_use]
    pub fn new(package_root: impl Into<String>) -> Self {
        Self {
            package_root: package_root.into(),
            planned: BTreeMap::new(),
            produced: BTreeMap::new(),
        }
    }

    /// Index every spec of a plan
    #[must_use]
    pub fn from_specs<'a>(
        package_root: impl Into<String>,
        specs: impl IntoIterator<Item = &'a ArtifactSpec>,
    ) -> Self {
        let mut index = Self::new(package_root);
        for spec in specs {
            index.insert_planned(spec.module.clone(), spec.name.clone());
        }
        index
    }

    /// Top-level package of generated modules
    #[inline]
    #[must_use]
    pub fn package_root(&self) -> &str {
        &self.package_root
    }

    /// Register a planned module
    pub fn insert_planned(&mut self, module: ModulePath, spec_name: impl Into<String>) {
        self.planned.insert(module, spec_name.into());
    }

    /// Spec name owning `module`
    #[inline]
    #[must_use]
    pub fn spec_for(&self, module: &ModulePath) -> Option<&str> {
        self.planned.get(module).map(String::as_str)
    }

    /// Check if `module` is planned or is a package containing planned modules
    #[must_use]
    pub fn is_known(&self, module: &ModulePath) -> bool {
        self.planned.contains_key(module)
            || self.planned.keys().any(|planned| module.is_package_of(planned))
    }

    /// Check if `module` already has content
    #[inline]
    #[must_use]
    pub fn is_produced(&self, module: &ModulePath) -> bool {
        self.produced.contains_key(module)
    }

    /// Check if `module` lives under the package root
    #[inline]
    #[must_use]
    pub fn is_internal(&self, module: &ModulePath) -> bool {
        module.root() == Some(self.package_root.as_str())
    }

    /// Project modules referenced by an import
    ///
    /// `from app.models import widget` resolves to `app.models.widget` when
    /// that module is planned, otherwise to `app.models`. Relative and
    /// third-party imports resolve to nothing.
    #[must_use]
    pub fn resolve(&self, import: &Import) -> Vec<ModulePath> {
        if import.relative {
            return Vec::new();
        }
        let Ok(module) = import.module.parse::<ModulePath>() else {
            return Vec::new();
        };
        if !self.is_internal(&module) {
            return Vec::new();
        }

        let mut targets = Vec::new();
        let mut module_itself = import.names.is_empty();
        for name in &import.names {
            let child = module.child(name.as_str());
            if name != "*" && self.planned.contains_key(&child) {
                push_unique(&mut targets, child);
            } else {
                module_itself = true;
            }
        }
        if module_itself {
            push_unique(&mut targets, module);
        }
        targets
    }

    /// Remember the planned modules a produced artifact imports
    pub fn record_produced(&mut self, module: ModulePath, source: &SourceUnit<'_>) {
        let imports: BTreeSet<ModulePath> = source
            .imports()
            .iter()
            .flat_map(|import| self.resolve(import))
            .filter(|target| self.planned.contains_key(target))
            .collect();
        self.produced.insert(module, imports);
    }

    /// Path of produced imports leading from `from` back to `to`
    ///
    /// Returns the modules visited, starting with `from` and ending with `to`.
    #[must_use]
    pub fn import_path(&self, from: &ModulePath, to: &ModulePath) -> Option<Vec<ModulePath>> {
        let mut visited = BTreeSet::new();
        let mut path = vec![from.clone()];
        if self.search(from, to, &mut visited, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn search(
        &self,
        current: &ModulePath,
        to: &ModulePath,
        visited: &mut BTreeSet<ModulePath>,
        path: &mut Vec<ModulePath>,
    ) -> bool {
        if current == to {
            return true;
        }
        if !visited.insert(current.clone()) {
            return false;
        }
        let Some(imports) = self.produced.get(current) else {
            return false;
        };
        for next in imports {
            path.push(next.clone());
            if self.search(next, to, visited, path) {
                return true;
            }
            path.pop();
        }
        false
    }
}

fn push_unique(targets: &mut Vec<ModulePath>, module: ModulePath) {
    if !targets.contains(&module) {
        targets.push(module);
    }
}
