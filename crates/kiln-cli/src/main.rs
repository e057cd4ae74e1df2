use kiln_cli::{cli, commands, logging, LogFormat};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    let format = matches
        .get_one::<LogFormat>("log-format")
        .copied()
        .unwrap_or_default();
    if let Err(e) = logging::init(format, "info") {
        eprintln!("failed to initialise logging: {e}");
    }

    let result = match matches.subcommand() {
        Some(("plan", args)) => commands::plan(args),
        Some(("validate", args)) => commands::validate(args),
        Some(("replay", args)) => commands::replay(args).await,
        _ => unreachable!("subcommand is required"),
    };

    match result {
        Ok(output) => {
            print!("{}", output.stdout);
            if !output.stdout.ends_with('\n') {
                println!();
            }
            if output.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
