use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use coordinated_await::scenarios::{self, Scenario};
use coordinated_await::{EventSinkKind, load_config, logging, start_from_config};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "coordinated-await")]
#[command(about = "Async/await built from a coordinator, workers and message passing")]
struct Cli {
    /// Path to a JSON config file
    #[arg(long, global = true, env = "COORDINATOR_CONFIG")]
    config: Option<PathBuf>,
    /// Print the recorded event log as JSON lines after the run
    #[arg(long, global = true, default_value_t = false)]
    events: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one of the demonstration scenarios
    Run {
        #[arg(value_enum)]
        scenario: ScenarioArg,
        /// Number of parallel invocations for the fanout scenario
        #[arg(short, long, default_value_t = 8)]
        count: u32,
    },
    /// Run every scenario in turn
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScenarioArg {
    /// invoke(f) where f() = 42
    Simple,
    /// outer computation invokes and awaits an inner one, returns 2 * 42
    Nested,
    /// two callers await the same pending promise
    SharedAwait,
    /// N parallel invocations summed by one computation
    Fanout,
    /// a computation that fails
    Failing,
}

impl ScenarioArg {
    fn into_scenario(self, count: u32) -> Scenario {
        match self {
            Self::Simple => Scenario::Simple,
            Self::Nested => Scenario::Nested,
            Self::SharedAwait => Scenario::SharedAwait,
            Self::Fanout => Scenario::Fanout { count },
            Self::Failing => Scenario::Failing,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if cli.events {
        config.event_sink = EventSinkKind::Memory;
    }

    let plan = match cli.command {
        Commands::Run { scenario, count } => vec![scenario.into_scenario(count)],
        Commands::All => vec![
            Scenario::Simple,
            Scenario::Nested,
            Scenario::SharedAwait,
            Scenario::Fanout { count: 8 },
            Scenario::Failing,
        ],
    };

    let (handle, memory) = start_from_config(&config);

    for scenario in plan {
        info!("Running scenario {:?} as {}", scenario, config.caller_name);
        let value = scenarios::run(
            &handle,
            &config.caller_name,
            scenario,
            config.release_completed,
        )
        .await?;
        println!("{:?}: {}", scenario, value);
    }

    handle.shutdown()?;
    let stats = handle.join().await?;
    info!(
        "Promises allocated: {}, completed: {}, pending: {}",
        stats.allocated, stats.completed, stats.pending
    );

    if let Some(memory) = memory {
        for event in memory.snapshot() {
            println!("{}", serde_json::to_string(&event)?);
        }
    }

    Ok(())
}
