//! gjsolve command-line interface.
//!
//! Solve dense linear systems from TOML job files:
//! ```sh
//! gjsolve run job.toml -w 4
//! gjsolve validate job.toml
//! gjsolve generate 100 system.txt --seed 7
//! mpirun -n 4 gjsolve run mpi_job.toml   # built with --features mpi
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gjsolve")]
#[command(about = "gjsolve: Distributed Gauss-Jordan Solver")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the system described by a TOML configuration file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Worker count (overrides config file setting).
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Validate a configuration file without solving.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Write a random system to a file.
    Generate {
        /// Number of unknowns.
        dimension: usize,
        /// Destination file.
        path: PathBuf,
        /// Seed for reproducible output.
        #[arg(long)]
        seed: Option<u64>,
        /// Entries are drawn from 0..max_value.
        #[arg(long, default_value_t = gjsolve_core::source::DEFAULT_MAX_VALUE)]
        max_value: u32,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            output,
            workers,
        } => {
            let mut job = config::load_config(&config)?;
            if let Some(count) = workers {
                if count == 0 {
                    anyhow::bail!("--workers must be at least 1");
                }
                job.workers.count = count;
            }
            log::debug!("job configuration: {:?}", job);

            let Some(result) = runner::run_job(&job)? else {
                // Non-coordinator MPI rank.
                return Ok(());
            };
            println!("Configuration: {}", config.display());

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));

            if job.output.save_solution {
                runner::write_solution_csv(&result, &out_dir.join("solution.csv"))?;
            }
            if job.output.save_json {
                runner::write_report_json(&result.report, &out_dir.join("report.json"))?;
            }

            println!("Solve complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            if let config::SourceSpec::File { path } = &job.system.source {
                runner::build_system(&job)?;
                println!("System file is valid: {}", path);
            }
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
        Commands::Generate {
            dimension,
            path,
            seed,
            max_value,
        } => {
            if dimension == 0 || max_value == 0 {
                anyhow::bail!("dimension and --max-value must be positive");
            }
            if gjsolve_core::source::augmented_len(dimension).is_none() {
                anyhow::bail!("dimension {} is too large", dimension);
            }
            let system = gjsolve_core::source::random_system(dimension, max_value, seed);
            gjsolve_core::source::write_system(&system, &path)?;
            println!("Wrote {}-unknown system to: {}", dimension, path.display());
            Ok(())
        }
    }
}
