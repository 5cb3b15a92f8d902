use clap::{Args, Parser, Subcommand, ValueEnum};
use optiform_models::{
    AssignmentInput, BuildError, Built, FacilityInput, KnapsackInput, MipSpec, Outcome, RoutingInput, SchedulingInput,
};
use optiform_solver::{BranchAndBound, Domain, ObjectiveSense};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "optiform")]
#[command(about = "Build and solve classic optimization models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Give up after this many seconds
    #[arg(long, global = true)]
    time_limit: Option<f64>,
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = Format::Pretty)]
    format: Format,
    /// Log model sizes and solver progress
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign workers to tasks at minimum cost
    Assignment {
        /// JSON instance file
        file: PathBuf,
    },
    /// Pick the most valuable items within a weight capacity
    Knapsack {
        /// JSON instance file
        file: PathBuf,
    },
    /// Open facilities and serve every client at minimum cost
    Facility {
        /// JSON instance file
        file: PathBuf,
    },
    /// Schedule tasks on parallel machines minimizing the makespan
    Scheduling {
        /// JSON instance file
        file: PathBuf,
    },
    /// Route vehicles from a depot through all customers
    Routing {
        /// JSON instance file
        file: PathBuf,
    },
    /// Solve a generic mixed-integer program given as text
    Mip {
        #[command(flatten)]
        text: MipText,
        /// Maximize instead of minimize
        #[arg(long)]
        maximize: bool,
    },
    /// Check a generic MIP for errors without solving it
    Check {
        #[command(flatten)]
        text: MipText,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Assignment { .. } => "assignment",
            Commands::Knapsack { .. } => "knapsack",
            Commands::Facility { .. } => "facility",
            Commands::Scheduling { .. } => "scheduling",
            Commands::Routing { .. } => "routing",
            Commands::Mip { .. } => "mip",
            Commands::Check { .. } => "check",
        }
    }
}

#[derive(Args)]
struct MipText {
    /// Objective coefficients, space separated
    #[arg(long, allow_hyphen_values = true)]
    objective: String,
    /// File with one `coefficients,sense,rhs` constraint per line
    #[arg(long)]
    constraints: PathBuf,
    /// Variable types (continuous, integer, binary), space separated
    #[arg(long, default_value = "")]
    types: String,
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let time_limit = match cli.time_limit.map(parse_time_limit).transpose() {
        Ok(limit) => limit,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    debug!(command = cli.command.name(), ?time_limit, format = ?cli.format, "starting");

    let succeeded = match cli.command {
        Commands::Assignment { file } => run(read_instance::<AssignmentInput>(&file).build(), time_limit, cli.format),
        Commands::Knapsack { file } => run(read_instance::<KnapsackInput>(&file).build(), time_limit, cli.format),
        Commands::Facility { file } => run(read_instance::<FacilityInput>(&file).build(), time_limit, cli.format),
        Commands::Scheduling { file } => run(read_instance::<SchedulingInput>(&file).build(), time_limit, cli.format),
        Commands::Routing { file } => run(read_instance::<RoutingInput>(&file).build(), time_limit, cli.format),
        Commands::Mip { text, maximize } => {
            let spec = parse_mip(&text);
            let sense = if maximize {
                ObjectiveSense::Maximize
            } else {
                ObjectiveSense::Minimize
            };
            run(spec.build(sense), time_limit, cli.format)
        }
        Commands::Check { text } => {
            let spec = parse_mip(&text);
            match spec.build(ObjectiveSense::Minimize) {
                Ok(built) => {
                    println!("{}", summarize(&spec, built.model().num_constraints()));
                    true
                }
                Err(e) => {
                    eprintln!("{}", e);
                    false
                }
            }
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
}

fn init_logger(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("optiform_cli=debug,optiform_models=debug,optiform_solver=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

fn parse_time_limit(secs: f64) -> Result<Duration, String> {
    if secs.is_finite() && secs > 0.0 {
        Ok(Duration::from_secs_f64(secs))
    } else {
        Err(format!("time limit must be a positive number of seconds, got {}", secs))
    }
}

fn read_file(file: &Path) -> String {
    match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file {}: {}", file.display(), e);
            std::process::exit(1);
        }
    }
}

fn read_instance<T: DeserializeOwned>(file: &Path) -> T {
    let source = read_file(file);
    match serde_json::from_str(&source) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Invalid instance {}: {}", file.display(), e);
            std::process::exit(1);
        }
    }
}

fn parse_mip(text: &MipText) -> MipSpec {
    let constraints = read_file(&text.constraints);
    match MipSpec::parse(&text.objective, &constraints, &text.types) {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Solve and print. Returns whether the outcome was optimal.
fn run<T: Serialize + Display>(built: Result<Built<T>, BuildError>, time_limit: Option<Duration>, format: Format) -> bool {
    let built = match built {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{}", e);
            return false;
        }
    };

    debug!(
        model = built.model().name(),
        variables = built.model().num_variables(),
        constraints = built.model().num_constraints(),
        "solving"
    );
    match built.solve(&BranchAndBound::new(), time_limit) {
        Ok(outcome) => {
            println!("{}", render(&outcome, format));
            matches!(outcome, Outcome::Optimal(_))
        }
        Err(e) => {
            eprintln!("Decode error: {}", e);
            false
        }
    }
}

fn render<T: Serialize + Display>(outcome: &Outcome<T>, format: Format) -> String {
    match format {
        Format::Json => serde_json::to_string_pretty(outcome).unwrap_or_else(|e| format!("Error: {}", e)),
        Format::Pretty => match outcome {
            Outcome::Optimal(plan) => format!("Status: OPTIMAL\n\n{}", plan),
            Outcome::Infeasible => "Status: INFEASIBLE".to_string(),
            Outcome::Unbounded => "Status: UNBOUNDED".to_string(),
            Outcome::Unknown(Some(reason)) => format!("Status: UNKNOWN ({})", reason),
            Outcome::Unknown(None) => "Status: UNKNOWN".to_string(),
        },
    }
}

fn summarize(spec: &MipSpec, constraints: usize) -> String {
    let count = |domain: Domain| spec.domains.iter().filter(|&&d| d == domain).count();
    format!(
        "OK: {} variables ({} continuous, {} integer, {} binary), {} constraints",
        spec.num_variables(),
        count(Domain::Continuous),
        count(Domain::Integer),
        count(Domain::Binary),
        constraints
    )
}
