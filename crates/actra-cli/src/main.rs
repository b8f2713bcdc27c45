//! Command-line interface for the actra exploration engine.

mod demos;

use actra_search::{
    ChoiceOrchestrationMode, SearchConfig, SearchError, SearchScheduler, StateCachingMode,
    SymmetryMode, TaskOrchestrationMode,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum CliError {
    #[error("unknown demo program '{0}' (try `actra list`)")]
    UnknownDemo(String),

    #[error("unknown {what} mode '{value}'")]
    UnknownMode { what: &'static str, value: String },

    #[error(transparent)]
    Search(#[from] SearchError),
}

#[derive(Parser)]
#[command(name = "actra", version)]
#[command(about = "Symbolic/explicit state-space exploration for actor programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore a built-in demo program
    Run {
        /// Demo program name
        #[arg(value_name = "DEMO")]
        demo: String,

        /// Choice orchestration: none, random, qlearning, epsilon-greedy
        #[arg(long, default_value = "none")]
        choice_orchestration: String,

        /// Task orchestration: depth-first, random, coverage-astar, learn
        #[arg(long, default_value = "depth-first")]
        task_orchestration: String,

        /// State caching: none, fast, exact
        #[arg(long, default_value = "fast")]
        state_caching: String,

        /// Symmetry mode: none, full
        #[arg(long, default_value = "none")]
        symmetry: String,

        /// Explore choice alternatives symbolically, all at once
        #[arg(long)]
        symbolic: bool,

        /// Disable backtracking entirely
        #[arg(long)]
        no_backtrack: bool,

        /// Hard cap on step depth per iteration
        #[arg(long, default_value_t = 10_000)]
        max_steps: usize,

        /// Treat hitting the step cap as an error
        #[arg(long)]
        fail_on_max_steps: bool,

        /// Stop after this many iterations (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        max_executions: usize,

        /// Bound on backtrack tasks created per iteration (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        max_backtrack_tasks: usize,

        /// PRNG seed for randomized policies
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Wall-clock budget in seconds (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        timeout: u64,

        /// Logging detail (0-5)
        #[arg(short, long, default_value_t = 0)]
        verbosity: u8,

        /// Write checkpoints here on timeout
        #[arg(long, value_name = "DIR")]
        checkpoint_dir: Option<PathBuf>,
    },

    /// Resume a search from a checkpoint file
    Resume {
        /// Checkpoint written by a previous run
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Fresh wall-clock budget in seconds (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        timeout: u64,
    },

    /// List available demo programs
    List,
}

fn parse_choice_orchestration(value: &str) -> Result<ChoiceOrchestrationMode, CliError> {
    match value {
        "none" => Ok(ChoiceOrchestrationMode::None),
        "random" => Ok(ChoiceOrchestrationMode::Random),
        "qlearning" => Ok(ChoiceOrchestrationMode::QLearning),
        "epsilon-greedy" => Ok(ChoiceOrchestrationMode::EpsilonGreedy),
        _ => Err(CliError::UnknownMode {
            what: "choice orchestration",
            value: value.into(),
        }),
    }
}

fn parse_task_orchestration(value: &str) -> Result<TaskOrchestrationMode, CliError> {
    match value {
        "depth-first" => Ok(TaskOrchestrationMode::DepthFirst),
        "random" => Ok(TaskOrchestrationMode::Random),
        "coverage-astar" => Ok(TaskOrchestrationMode::CoverageAStar),
        "learn" => Ok(TaskOrchestrationMode::Learn),
        _ => Err(CliError::UnknownMode {
            what: "task orchestration",
            value: value.into(),
        }),
    }
}

fn parse_state_caching(value: &str) -> Result<StateCachingMode, CliError> {
    match value {
        "none" => Ok(StateCachingMode::None),
        "fast" => Ok(StateCachingMode::Fast),
        "exact" => Ok(StateCachingMode::Exact),
        _ => Err(CliError::UnknownMode {
            what: "state caching",
            value: value.into(),
        }),
    }
}

fn parse_symmetry(value: &str) -> Result<SymmetryMode, CliError> {
    match value {
        "none" => Ok(SymmetryMode::None),
        "full" => Ok(SymmetryMode::Full),
        _ => Err(CliError::UnknownMode {
            what: "symmetry",
            value: value.into(),
        }),
    }
}

/// Run the scheduler, reporting the verdict; timeouts checkpoint when a
/// directory is configured.
fn finish(mut scheduler: SearchScheduler, resumed: bool) -> Result<ExitCode, CliError> {
    let outcome = if resumed {
        scheduler.resume_search()
    } else {
        scheduler.do_search()
    };
    match outcome {
        Ok(()) => {
            scheduler.print_progress(true);
            println!("result: {}", scheduler.result());
            println!(
                "iterations: {}, max depth: {}, distinct states: {}, coverage: {:.6} ({})",
                scheduler.iter() - scheduler.start_iter(),
                scheduler.search_stats().total().max_depth,
                scheduler.state_cache().total_distinct_states,
                scheduler.coverage().estimated_coverage(),
                scheduler.coverage().coverage_goal_achieved(),
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(SearchError::PropertyViolation { message, guard }) => {
            println!("result: bug found: {message} (path {guard:?})");
            Ok(ExitCode::FAILURE)
        }
        Err(SearchError::Timeout { elapsed_secs }) => {
            info!(elapsed_secs, "timed out");
            if scheduler.config().output_dir.is_some() {
                let path = scheduler.write_to_file()?;
                println!("result: timeout, checkpoint written to {}", path.display());
            } else {
                println!("result: timeout after {elapsed_secs:.1}s");
            }
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    match cli.command {
        Commands::Run {
            demo,
            choice_orchestration,
            task_orchestration,
            state_caching,
            symmetry,
            symbolic,
            no_backtrack,
            max_steps,
            fail_on_max_steps,
            max_executions,
            max_backtrack_tasks,
            seed,
            timeout,
            verbosity,
            checkpoint_dir,
        } => {
            let program = demos::demo(&demo).ok_or(CliError::UnknownDemo(demo))?;
            let config = SearchConfig {
                choice_orchestration: parse_choice_orchestration(&choice_orchestration)?,
                task_orchestration: parse_task_orchestration(&task_orchestration)?,
                state_caching: parse_state_caching(&state_caching)?,
                symmetry_mode: parse_symmetry(&symmetry)?,
                symbolic,
                use_backtrack: !no_backtrack,
                max_step_bound: max_steps,
                fail_on_max_step_bound: fail_on_max_steps,
                max_executions,
                max_backtrack_tasks_per_execution: max_backtrack_tasks,
                verbosity,
                seed,
                timeout_secs: timeout,
                output_dir: checkpoint_dir,
                ..Default::default()
            };
            finish(SearchScheduler::new(config, program), false)
        }
        Commands::Resume { file, timeout } => {
            let mut checkpoint = actra_search::read_checkpoint(&file)?;
            checkpoint.config.timeout_secs = timeout;
            let program = demos::demo(&checkpoint.program)
                .ok_or_else(|| CliError::UnknownDemo(checkpoint.program.clone()))?;
            let scheduler = SearchScheduler::from_checkpoint(checkpoint, program);
            finish(scheduler, true)
        }
        Commands::List => {
            for name in demos::DEMO_NAMES {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> miette::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = match &cli.command {
        Commands::Run { verbosity, .. } if *verbosity >= 4 => EnvFilter::new("trace"),
        Commands::Run { verbosity, .. } if *verbosity >= 1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    run(cli).map_err(|e| miette::miette!("{e}"))
}
