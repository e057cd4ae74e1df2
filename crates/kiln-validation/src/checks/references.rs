//! Reference integrity
//!
//! Imports rooted at the package root must name planned modules, must not
//! point back at the importing module and must not close a cycle with
//! modules that were already produced.

use crate::check::{Check, CheckContext};
use kiln_artifact::{IssueCategory, ModulePath, ValidationIssue};

/// Resolves project imports against the run's module index
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceCheck;

impl Check for ReferenceCheck {
    fn name(&self) -> &'static str {
        "references"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::ReferenceIntegrity
    }

    fn run(&self, ctx: &CheckContext<'_, '_>) -> Vec<ValidationIssue> {
        let own = &ctx.spec.module;
        let mut issues = Vec::new();

        for import in ctx.source.imports() {
            let targets = ctx.modules.resolve(&import);
            for target in targets {
                let location = format!("{}:{} {}", import.line, import.column, target);

                if &target == own {
                    issues.push(
                        ValidationIssue::critical(
                            IssueCategory::ReferenceIntegrity,
                            format!("module `{own}` imports itself"),
                        )
                        .at(location),
                    );
                    continue;
                }

                if !ctx.modules.is_known(&target) {
                    issues.push(
                        ValidationIssue::critical(
                            IssueCategory::ReferenceIntegrity,
                            format!("unresolved import `{target}`: no such module is planned"),
                        )
                        .at(location),
                    );
                    continue;
                }

                let Some(owner) = ctx.modules.spec_for(&target) else {
                    // package import
                    continue;
                };

                if ctx.modules.is_produced(&target) {
                    if let Some(path) = ctx.modules.import_path(&target, own) {
                        let mut cycle = vec![own.clone()];
                        cycle.extend(path);
                        issues.push(
                            ValidationIssue::critical(
                                IssueCategory::ReferenceIntegrity,
                                format!("circular import: {}", join_modules(&cycle)),
                            )
                            .at(location),
                        );
                    }
                } else if !ctx.spec.depends_on(owner) {
                    issues.push(
                        ValidationIssue::warning(
                            IssueCategory::ReferenceIntegrity,
                            format!(
                                "imports `{target}` of artifact '{owner}', which is not a \
                                 declared dependency and has not been produced yet"
                            ),
                        )
                        .at(location),
                    );
                }
            }
        }

        issues
    }
}

fn join_modules(modules: &[ModulePath]) -> String {
    modules
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
