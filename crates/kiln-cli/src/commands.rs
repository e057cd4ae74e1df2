//! Command definitions and handlers
//!
//! Handlers return the text for stdout and whether the command succeeded;
//! `main` prints and maps success to the exit code.

use crate::fixture::FixtureGenerator;
use crate::logging::LogFormat;
use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use kiln_artifact::{needs_repair, Attribute, Features, Persistence, ResourceDescription};
use kiln_core::{normalize_content, Orchestrator, Planner, RunConfig};
use kiln_validation::{ModuleIndex, ValidationInput, ValidatorBattery};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Result of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub success: bool,
}

impl CommandOutput {
    fn new(stdout: String, success: bool) -> Self {
        Self { stdout, success }
    }
}

fn description_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("resource")
                .long("resource")
                .short('r')
                .required(true)
                .help("Resource name, e.g. widget"),
        )
        .arg(
            Arg::new("attributes")
                .long("attributes")
                .short('a')
                .default_value("")
                .help("Attributes as 'name:type, other:type'"),
        )
        .arg(
            Arg::new("project")
                .long("project")
                .default_value("")
                .help("Project name"),
        )
        .arg(
            Arg::new("persistence")
                .long("persistence")
                .default_value("sql")
                .value_parser(value_parser!(Persistence))
                .help("sql or mongodb"),
        )
        .arg(
            Arg::new("auth")
                .long("auth")
                .action(ArgAction::SetTrue)
                .help("Add user model, security helpers and auth endpoints"),
        )
        .arg(
            Arg::new("protect")
                .long("protect")
                .action(ArgAction::SetTrue)
                .requires("auth")
                .help("Require an authenticated user on the resource routes"),
        )
        .arg(
            Arg::new("package-root")
                .long("package-root")
                .help("Top-level package of generated modules (default: app)"),
        )
}

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

/// Top-level command
pub fn cli() -> Command {
    Command::new("kiln")
        .version(kiln_core::VERSION)
        .about("Plan, generate, validate and repair the source files of a CRUD module")
        .subcommand_required(true)
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(value_parser!(LogFormat))
                .help("text or json"),
        )
        .subcommand(
            description_args(Command::new("plan").about("Print the artifact queue"))
                .arg(json_flag()),
        )
        .subcommand(
            description_args(
                Command::new("validate").about("Validate one source file as a planned artifact"),
            )
            .arg(
                Arg::new("artifact")
                    .long("artifact")
                    .required(true)
                    .help("Planned artifact name, e.g. crud"),
            )
            .arg(
                Arg::new("file")
                    .long("file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf))
                    .help("Source file to validate"),
            )
            .arg(json_flag()),
        )
        .subcommand(
            description_args(
                Command::new("replay").about("Run the pipeline against a fixture directory"),
            )
            .arg(
                Arg::new("fixtures")
                    .long("fixtures")
                    .required(true)
                    .value_parser(value_parser!(PathBuf))
                    .help("Directory of <artifact>.py and <artifact>.<n>.py files"),
            )
            .arg(
                Arg::new("config")
                    .long("config")
                    .value_parser(value_parser!(PathBuf))
                    .help("Run configuration (.toml, .yaml or .yml)"),
            )
            .arg(
                Arg::new("max-iterations")
                    .long("max-iterations")
                    .value_parser(value_parser!(u32))
                    .help("Generate+validate cycles per artifact"),
            ),
        )
}

/// Resource description from the shared arguments
///
/// # Errors
/// Returns error if the attribute list is malformed
pub fn description(args: &ArgMatches) -> anyhow::Result<ResourceDescription> {
    let resource = string_arg(args, "resource");
    let attributes = Attribute::parse_list(&string_arg(args, "attributes"))?;
    let persistence = args
        .get_one::<Persistence>("persistence")
        .copied()
        .unwrap_or_default();
    let features = Features {
        authentication: args.get_flag("auth"),
        protect_routes: args.get_flag("protect"),
    };
    Ok(ResourceDescription::new(resource)
        .with_project(string_arg(args, "project"))
        .with_attributes(attributes)
        .with_persistence(persistence)
        .with_features(features))
}

fn string_arg(args: &ArgMatches, id: &str) -> String {
    args.get_one::<String>(id).cloned().unwrap_or_default()
}

fn planner(args: &ArgMatches) -> Planner {
    args.get_one::<String>("package-root")
        .map_or_else(Planner::default, Planner::new)
}

/// `kiln plan`
///
/// # Errors
/// Returns error if the description is rejected
pub fn plan(args: &ArgMatches) -> anyhow::Result<CommandOutput> {
    let plan = planner(args).plan(&description(args)?)?;
    if args.get_flag("json") {
        return Ok(CommandOutput::new(serde_json::to_string_pretty(&plan)?, true));
    }

    let mut out = String::new();
    for (position, spec) in plan.iter().enumerate() {
        let deps: Vec<&str> = spec.depends_on.iter().map(String::as_str).collect();
        write!(
            out,
            "{:>2}. {:<16} {:<12} {}",
            position + 1,
            spec.name,
            spec.kind.to_string(),
            spec.path
        )?;
        if !deps.is_empty() {
            write!(out, "  <- {}", deps.join(", "))?;
        }
        out.push('\n');
    }
    Ok(CommandOutput::new(out, true))
}

/// `kiln validate`
///
/// Dependencies count as planned but not produced, so imports of declared
/// dependencies are accepted.
///
/// # Errors
/// Returns error if the description is rejected, the artifact is not part
/// of the plan or the file cannot be read
pub fn validate(args: &ArgMatches) -> anyhow::Result<CommandOutput> {
    let planner = planner(args);
    let plan = planner.plan(&description(args)?)?;
    let name = string_arg(args, "artifact");
    let Some(spec) = plan.iter().find(|s| s.name == name) else {
        let names: Vec<&str> = plan.iter().map(|s| s.name.as_str()).collect();
        bail!("'{name}' is not planned; expected one of: {}", names.join(", "));
    };
    let path = args
        .get_one::<PathBuf>("file")
        .context("missing --file")?;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let content = normalize_content(&raw);
    let modules = ModuleIndex::from_specs(planner.package_root(), &plan);
    let issues = ValidatorBattery::with_defaults().validate(&ValidationInput {
        spec,
        content: &content,
        modules: &modules,
    });
    let success = !needs_repair(&issues);

    if args.get_flag("json") {
        return Ok(CommandOutput::new(
            serde_json::to_string_pretty(&issues)?,
            success,
        ));
    }
    let mut out = String::new();
    if issues.is_empty() {
        writeln!(out, "{}: no issues", spec.path)?;
    }
    for issue in &issues {
        writeln!(out, "{}: {issue}", spec.path)?;
    }
    Ok(CommandOutput::new(out, success))
}

/// Configuration of a replay: file, then environment, then flags
///
/// # Errors
/// Returns error if the file or an override is invalid
pub fn replay_config(args: &ArgMatches) -> anyhow::Result<RunConfig> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    }
    .apply_env()?;
    if let Some(max) = args.get_one::<u32>("max-iterations") {
        config = config.with_max_iterations(*max);
    }
    if let Some(root) = args.get_one::<String>("package-root") {
        config = config.with_package_root(root.clone());
    }
    config.validate()?;
    Ok(config)
}

/// `kiln replay`
///
/// # Errors
/// Returns error if the configuration or description is rejected
pub async fn replay(args: &ArgMatches) -> anyhow::Result<CommandOutput> {
    let config = replay_config(args)?;
    let fixtures = args
        .get_one::<PathBuf>("fixtures")
        .context("missing --fixtures")?;
    if !fixtures.is_dir() {
        bail!("fixture directory {} does not exist", fixtures.display());
    }
    info!(fixtures = %fixtures.display(), "replaying");

    let generator = Arc::new(FixtureGenerator::new(fixtures.clone()));
    let report = Orchestrator::new(generator, config)?
        .run(&description(args)?)
        .await?;
    Ok(CommandOutput::new(
        report.to_json_pretty()?,
        report.all_validated(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_test_utils::{valid_source, widget};
    use pretty_assertions::assert_eq;

    fn matches(argv: &[&str]) -> ArgMatches {
        cli().try_get_matches_from(argv).unwrap()
    }

    fn sub<'a>(matches: &'a ArgMatches, name: &str) -> &'a ArgMatches {
        matches.subcommand_matches(name).unwrap()
    }

    #[test]
    fn parses_description() {
        let m = matches(&[
            "kiln", "plan", "-r", "widget", "-a", "name:string, price:number", "--auth",
            "--persistence", "mongodb",
        ]);
        let description = description(sub(&m, "plan")).unwrap();
        assert_eq!(description.resource, "widget");
        assert_eq!(description.attributes.len(), 2);
        assert_eq!(description.persistence, Persistence::MongoDb);
        assert_eq!(description.features, Features::authentication());
    }

    #[test]
    fn protect_requires_auth() {
        let result = cli().try_get_matches_from(["kiln", "plan", "-r", "widget", "--protect"]);
        assert!(result.is_err());
    }

    #[test]
    fn plan_lists_queue() {
        let m = matches(&["kiln", "plan", "-r", "widget", "-a", "name:string"]);
        let output = plan(sub(&m, "plan")).unwrap();
        assert!(output.success);
        let lines: Vec<&str> = output.stdout.lines().collect();
        assert_eq!(lines.len(), 9);
        assert!(lines[0].contains("config"));
        assert!(lines[8].contains("main"));
        assert!(lines[8].ends_with("<- config, router"));
    }

    #[test]
    fn plan_rejects_missing_attributes() {
        let m = matches(&["kiln", "plan", "-r", "widget"]);
        assert!(plan(sub(&m, "plan")).is_err());
    }

    #[test]
    fn validate_reports_syntax_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("crud.py");
        std::fs::write(&file, "def broken(:\n").unwrap();

        let file_arg = file.to_string_lossy().to_string();
        let m = matches(&[
            "kiln", "validate", "-r", "widget", "-a", "name:string", "--artifact", "crud",
            "--file", &file_arg, "--json",
        ]);
        let output = validate(sub(&m, "validate")).unwrap();
        assert!(!output.success);
        assert!(output.stdout.contains("\"syntax\""));
    }

    #[test]
    fn validate_accepts_canonical_source() {
        let planned = Planner::default().plan(&widget()).unwrap();
        let crud = planned.iter().find(|s| s.name == "crud").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("crud.py");
        std::fs::write(&file, valid_source(crud)).unwrap();

        let file_arg = file.to_string_lossy().to_string();
        let m = matches(&[
            "kiln", "validate", "-r", "widget", "-a", "name:string, price:number",
            "--project", "shop", "--artifact", "crud", "--file", &file_arg,
        ]);
        let output = validate(sub(&m, "validate")).unwrap();
        assert!(output.success, "{}", output.stdout);
        assert_eq!(output.stdout, "app/crud/widget.py: no issues\n");
    }

    #[test]
    fn validate_rejects_unknown_artifact() {
        let m = matches(&[
            "kiln", "validate", "-r", "widget", "-a", "name:string", "--artifact", "nope",
            "--file", "x.py",
        ]);
        let err = validate(sub(&m, "validate")).unwrap_err();
        assert!(err.to_string().contains("'nope' is not planned"));
    }

    #[tokio::test]
    async fn replay_runs_fixture_directory() {
        let planned = Planner::default().plan(&widget()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        for spec in &planned {
            std::fs::write(
                dir.path().join(format!("{}.py", spec.name)),
                valid_source(spec),
            )
            .unwrap();
        }
        // first schema attempt is broken, the repair falls back to schema.py
        std::fs::write(dir.path().join("schema.1.py"), "class (\n").unwrap();

        let dir_arg = dir.path().to_string_lossy().to_string();
        let m = matches(&[
            "kiln", "replay", "-r", "widget", "-a", "name:string, price:number",
            "--project", "shop", "--fixtures", &dir_arg, "--max-iterations", "2",
        ]);
        let output = replay(sub(&m, "replay")).await.unwrap();
        assert!(output.success, "{}", output.stdout);

        let report: serde_json::Value = serde_json::from_str(&output.stdout).unwrap();
        assert_eq!(report["correctionsApplied"], 1);
        assert_eq!(report["artifacts"].as_array().unwrap().len(), 9);
    }
}
