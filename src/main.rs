use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use cliffs::api::{self, SweepArgs};
use cliffs::programs;

#[derive(Parser, Debug)]
#[command(
    name = "cliffs",
    version,
    about = "Benefit cliff simulator: sweeps earned income through benefit programs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep a household's earned income and print the benefit series as JSON.
    Sweep {
        #[arg(long, help = "Path to a household JSON file")]
        household: PathBuf,
        #[command(flatten)]
        args: SweepArgs,
        #[arg(long, help = "Include detected benefit cliffs in the output")]
        cliffs: bool,
        #[arg(long, help = "Pretty-print the JSON output")]
        pretty: bool,
    },
    /// List registered programs with their dependencies.
    Programs,
    /// Run the HTTP API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    cliffs::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Sweep {
            household,
            args,
            cliffs,
            pretty,
        } => match run_sweep_command(&household, args, cliffs, pretty) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        Command::Programs => match programs::standard_registry() {
            Ok(registry) => {
                for info in api::list_programs(&registry) {
                    let deps = info
                        .depends_on
                        .iter()
                        .map(|id| id.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");
                    println!("{:<10} depends on: [{deps}]", info.id.as_str());
                }
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        Command::Serve { port } => {
            if let Err(e) = api::run_http_server(port).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn run_sweep_command(
    path: &Path,
    args: SweepArgs,
    include_cliffs: bool,
    pretty: bool,
) -> Result<String, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let household = api::household_from_json(&raw)?;
    let request = api::build_sweep_request(args, household)?;
    let registry = programs::standard_registry().map_err(|e| e.to_string())?;

    let mut response = api::run_sweep(&registry, request).map_err(|e| e.to_string())?;
    if !include_cliffs {
        response.cliffs = None;
    }

    let json = if pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    };
    json.map_err(|e| format!("cannot serialize sweep: {e}"))
}
