//! Shared fixtures for unit tests

use kiln_artifact::{
    ArtifactKind, ArtifactSpec, Features, GenerationContext, ModulePath, Persistence,
};

pub(crate) fn spec(name: &str, kind: ArtifactKind, path: &str, deps: &[&str]) -> ArtifactSpec {
    spec_with(name, kind, path, deps, Persistence::Sql)
}

pub(crate) fn spec_with(
    name: &str,
    kind: ArtifactKind,
    path: &str,
    deps: &[&str],
    persistence: Persistence,
) -> ArtifactSpec {
    ArtifactSpec {
        name: name.to_string(),
        kind,
        path: path.to_string(),
        module: ModulePath::from_file_path(path).unwrap(),
        depends_on: deps.iter().map(|d| (*d).to_string()).collect(),
        context: GenerationContext {
            project_name: "shop".to_string(),
            resource: "widget".to_string(),
            class_name: "Widget".to_string(),
            attributes: Vec::new(),
            persistence,
            features: Features::default(),
            conventions: Vec::new(),
        },
    }
}
