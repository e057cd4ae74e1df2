//! Artifact planning
//!
//! Turns a [`ResourceDescription`] into an ordered list of
//! [`ArtifactSpec`]s. Order is by tier (foundation, domain, aggregation);
//! within a tier, the first artifact in declaration order whose dependencies
//! are already placed comes next.

use crate::error::PlanError;
use kiln_artifact::{
    ArtifactKind, ArtifactSpec, GenerationContext, ModulePath, Persistence, ResolvedAttribute,
    ResourceDescription, Tier,
};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Static description of one planned artifact
struct Blueprint {
    name: &'static str,
    kind: ArtifactKind,
    /// Path below the package root; `{r}` is replaced by the resource name
    path: &'static str,
    depends_on: Vec<&'static str>,
}

impl Blueprint {
    fn new(
        name: &'static str,
        kind: ArtifactKind,
        path: &'static str,
        depends_on: &[&'static str],
    ) -> Self {
        Self {
            name,
            kind,
            path,
            depends_on: depends_on.to_vec(),
        }
    }
}

/// Builds artifact queues from resource descriptions
#[derive(Debug, Clone)]
pub struct Planner {
    package_root: String,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new("app")
    }
}

impl Planner {
    /// Create planner writing under `package_root`
    #[inline]
    #[must_use]
    pub fn new(package_root: impl Into<String>) -> Self {
        Self {
            package_root: package_root.into(),
        }
    }

    /// Package root of planned paths
    #[inline]
    #[must_use]
    pub fn package_root(&self) -> &str {
        &self.package_root
    }

    /// Plan the artifacts of a resource
    ///
    /// # Errors
    /// Returns `PlanError` if the description is invalid or the derived
    /// artifacts conflict; no generation may happen in that case
    pub fn plan(&self, description: &ResourceDescription) -> Result<Vec<ArtifactSpec>, PlanError> {
        description.validate()?;

        let resource = description.resource.trim();
        let attributes = description
            .attributes
            .iter()
            .map(|a| -> Result<ResolvedAttribute, PlanError> {
                Ok(ResolvedAttribute::new(a.name.clone(), a.attribute_type()?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut specs = Vec::new();
        let mut modules: HashMap<ModulePath, String> = HashMap::new();
        for blueprint in blueprints(description) {
            let path = format!(
                "{}/{}",
                self.package_root,
                blueprint.path.replace("{r}", resource)
            );
            let module = ModulePath::from_file_path(&path)?;
            if let Some(first) = modules.insert(module.clone(), blueprint.name.to_string()) {
                return Err(PlanError::ConflictingModules {
                    first,
                    second: blueprint.name.to_string(),
                    module: module.to_string(),
                });
            }

            specs.push(ArtifactSpec {
                name: blueprint.name.to_string(),
                kind: blueprint.kind,
                path,
                module,
                depends_on: blueprint
                    .depends_on
                    .iter()
                    .map(|d| (*d).to_string())
                    .collect::<BTreeSet<_>>(),
                context: GenerationContext {
                    project_name: description.project_name.clone(),
                    resource: resource.to_string(),
                    class_name: description.class_name(),
                    attributes: attributes.clone(),
                    persistence: description.persistence,
                    features: description.features,
                    conventions: conventions(blueprint.kind, description.persistence),
                },
            });
        }

        let ordered = order_specs(specs)?;
        debug!(
            resource,
            artifacts = ordered.len(),
            order = %ordered.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(","),
            "plan ready"
        );
        Ok(ordered)
    }
}

/// Order specs by tier, then dependencies, then declaration order
///
/// # Errors
/// Returns error for unknown dependencies, dependencies on a later tier and
/// dependency cycles
pub fn order_specs(specs: Vec<ArtifactSpec>) -> Result<Vec<ArtifactSpec>, PlanError> {
    let tiers: HashMap<&str, Tier> = specs.iter().map(|s| (s.name.as_str(), s.tier())).collect();

    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for spec in &specs {
        graph.add_node(spec.name.as_str());
    }
    for spec in &specs {
        for dependency in &spec.depends_on {
            let Some(dep_tier) = tiers.get(dependency.as_str()) else {
                return Err(PlanError::UnknownDependency {
                    spec: spec.name.clone(),
                    dependency: dependency.clone(),
                });
            };
            if *dep_tier > spec.tier() {
                return Err(PlanError::TierViolation {
                    spec: spec.name.clone(),
                    dependency: dependency.clone(),
                });
            }
            graph.add_edge(dependency.as_str(), spec.name.as_str(), ());
        }
    }
    if let Err(cycle) = toposort(&graph, None) {
        return Err(PlanError::CyclicDependency(cycle.node_id().to_string()));
    }

    let mut remaining: Vec<&ArtifactSpec> = specs.iter().collect();
    remaining.sort_by_key(|s| s.tier());
    let mut placed: HashSet<&str> = HashSet::new();
    let mut order: Vec<String> = Vec::with_capacity(specs.len());
    while !remaining.is_empty() {
        let tier = remaining[0].tier();
        let next = remaining
            .iter()
            .position(|s| {
                s.tier() == tier && s.depends_on.iter().all(|d| placed.contains(d.as_str()))
            })
            .ok_or_else(|| PlanError::CyclicDependency(remaining[0].name.clone()))?;
        let spec = remaining.remove(next);
        placed.insert(spec.name.as_str());
        order.push(spec.name.clone());
    }

    let mut by_name: HashMap<String, ArtifactSpec> =
        specs.into_iter().map(|s| (s.name.clone(), s)).collect();
    Ok(order
        .into_iter()
        .filter_map(|name| by_name.remove(&name))
        .collect())
}

fn blueprints(description: &ResourceDescription) -> Vec<Blueprint> {
    use ArtifactKind::{Aggregation, Behavior, Contract, Foundation, Interface, Model};

    let auth = description.features.authentication;
    let protect = description.features.protect_routes;

    let mut plan = vec![
        Blueprint::new("config", Foundation, "core/config.py", &[]),
        Blueprint::new("db-session", Foundation, "database/db_session.py", &["config"]),
        Blueprint::new("base-model", Foundation, "models/base_model.py", &[]),
    ];
    if auth {
        plan.push(Blueprint::new("security", Foundation, "core/security.py", &["config"]));
    }

    plan.push(Blueprint::new("model", Model, "models/{r}.py", &["base-model"]));
    plan.push(Blueprint::new("schema", Contract, "schemas/{r}.py", &[]));
    plan.push(Blueprint::new(
        "crud",
        Behavior,
        "crud/{r}.py",
        &["model", "schema", "db-session"],
    ));
    let mut endpoint_deps = vec!["crud", "schema", "db-session"];
    if protect {
        endpoint_deps.push("auth-dependency");
    }
    plan.push(Blueprint::new(
        "endpoint",
        Interface,
        "api/endpoints/{r}.py",
        &endpoint_deps,
    ));

    if auth {
        plan.push(Blueprint::new("user-model", Model, "models/user.py", &["base-model"]));
        plan.push(Blueprint::new("user-schema", Contract, "schemas/user.py", &[]));
        plan.push(Blueprint::new(
            "user-crud",
            Behavior,
            "crud/user.py",
            &["user-model", "user-schema", "db-session", "security"],
        ));
        plan.push(Blueprint::new(
            "auth-dependency",
            Behavior,
            "api/deps.py",
            &["user-crud", "security", "db-session"],
        ));
        plan.push(Blueprint::new(
            "auth-endpoint",
            Interface,
            "api/endpoints/auth.py",
            &["auth-dependency", "user-crud", "user-schema", "security", "db-session"],
        ));
    }

    let mut router_deps = vec!["endpoint"];
    if auth {
        router_deps.push("auth-endpoint");
    }
    plan.push(Blueprint::new("router", Aggregation, "api/router.py", &router_deps));
    plan.push(Blueprint::new("main", Aggregation, "main.py", &["router", "config"]));
    plan
}

/// Target-framework conventions for one kind of artifact
#[must_use]
pub fn conventions(kind: ArtifactKind, persistence: Persistence) -> Vec<String> {
    let list: &[&str] = match (kind, persistence) {
        (ArtifactKind::Foundation, _) => &[
            "Read settings with pydantic-settings BaseSettings",
            "Expose module-level singletons instead of global mutable state",
        ],
        (ArtifactKind::Model, Persistence::Sql) => &[
            "Use SQLAlchemy 2.0 typing: Mapped[...] annotations with mapped_column()",
            "Derive models from the shared declarative Base",
        ],
        (ArtifactKind::Model, Persistence::MongoDb) => &[
            "Define Beanie Document subclasses with annotated fields",
            "Set the collection name in an inner Settings class",
        ],
        (ArtifactKind::Contract, _) => &[
            "Use Pydantic v2 models",
            "Separate create, update and read schemas",
            "Enable model_config = ConfigDict(from_attributes=True) on read schemas",
        ],
        (ArtifactKind::Behavior, _) => &[
            "Keep data access in plain functions that receive the session explicitly",
            "Import only from declared dependencies",
        ],
        (ArtifactKind::Interface, _) => &[
            "Create an APIRouter and register handlers with @router.<verb>",
            "Declare response_model on every route",
            "Return status_code=201 from POST routes",
            "Inject collaborators with Depends imported from fastapi",
        ],
        (ArtifactKind::Aggregation, _) => &[
            "Mount endpoint routers with include_router",
            "Create the FastAPI application in main",
        ],
    };
    list.iter().map(|c| (*c).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_artifact::{DescriptionError, Features};

    fn widget() -> ResourceDescription {
        ResourceDescription::new("widget")
            .with_attribute("name", "string")
            .with_attribute("price", "number")
    }

    fn names(specs: &[ArtifactSpec]) -> Vec<&str> {
        specs.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn widget_plan_order() {
        let plan = Planner::default().plan(&widget()).unwrap();
        assert_eq!(
            names(&plan),
            vec![
                "config",
                "db-session",
                "base-model",
                "model",
                "schema",
                "crud",
                "endpoint",
                "router",
                "main"
            ]
        );
        let model = &plan[3];
        assert_eq!(model.path, "app/models/widget.py");
        assert_eq!(model.module.to_string(), "app.models.widget");
        assert_eq!(model.context.class_name, "Widget");
        assert_eq!(model.context.attributes[1].python_type, "float");
    }

    #[test]
    fn protected_routes_reorder_domain_tier() {
        let plan = Planner::default()
            .plan(&widget().with_features(Features::protected()))
            .unwrap();
        let order = names(&plan);
        let position = |n: &str| order.iter().position(|x| *x == n).unwrap();
        assert!(position("auth-dependency") < position("endpoint"));
        assert!(position("security") < position("model"));
        assert_eq!(position("main"), order.len() - 1);
    }

    #[test]
    fn invalid_description_fails_before_planning() {
        let err = Planner::default()
            .plan(&ResourceDescription::new("widget"))
            .unwrap_err();
        assert!(matches!(
            err,
            PlanError::InvalidDescription(DescriptionError::NoAttributes)
        ));
    }

    #[test]
    fn user_resource_conflicts_with_auth_models() {
        let description = ResourceDescription::new("user")
            .with_attribute("email", "string")
            .with_features(Features::authentication());
        assert!(matches!(
            Planner::default().plan(&description),
            Err(PlanError::ConflictingModules { .. })
        ));
    }

    #[test]
    fn custom_package_root() {
        let plan = Planner::new("service").plan(&widget()).unwrap();
        assert!(plan.iter().all(|s| s.path.starts_with("service/")));
    }

    #[test]
    fn mongo_conventions() {
        let conventions = conventions(ArtifactKind::Model, Persistence::MongoDb);
        assert!(conventions[0].contains("Beanie"));
    }
}
