//! Job runner: builds the input system, solves it, reports and writes results.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use ndarray::{Array1, Array2};
use serde::Serialize;

use gjsolve_core::solver::gauss_jordan::DistributedSolver;
use gjsolve_core::solver::LinearSolver;
use gjsolve_core::source::{load_system, random_system, singular_variant};
use gjsolve_core::types::{AugmentedSystem, ReducedSystem};
use gjsolve_core::verify::{residual, Residual};

use crate::config::{JobConfig, SourceSpec};

/// Results from a solve, held by the coordinator.
pub struct RunOutput {
    /// Reduced system with rows permuted into column order; its right-hand
    /// side is the solution.
    pub reduced: ReducedSystem,
    pub report: SolveReport,
}

/// Summary written to `report.json`.
#[derive(Debug, Serialize)]
pub struct SolveReport {
    pub dimension: usize,
    pub workers: usize,
    pub backend: String,
    pub elapsed_seconds: f64,
    pub residual: Residual,
    pub solution: Vec<f64>,
}

/// Build the input system described by the job.
pub fn build_system(job: &JobConfig) -> Result<AugmentedSystem> {
    let dimension = job.system.dimension;
    let system = match &job.system.source {
        SourceSpec::Random { seed, max_value } => random_system(dimension, *max_value, *seed),
        SourceSpec::File { path } => {
            let system = load_system(Path::new(path))
                .with_context(|| format!("Failed to load system from '{}'", path))?;
            if system.dimension() != dimension {
                anyhow::bail!(
                    "'{}' holds a {}-unknown system but system.dimension = {}",
                    path,
                    system.dimension(),
                    dimension
                );
            }
            system
        }
    };

    Ok(match job.system.singular_row {
        Some(row) => {
            println!("  Zeroing row {} (singular test case)", row);
            singular_variant(&system, row)
        }
        None => system,
    })
}

/// Run a full solve from a parsed job configuration.
///
/// Returns `None` on MPI ranks other than the coordinator.
pub fn run_job(job: &JobConfig) -> Result<Option<RunOutput>> {
    match job.workers.backend.as_str() {
        "threads" => run_threads(job).map(Some),
        "mpi" => run_mpi(job),
        other => anyhow::bail!("Unknown backend '{}'. Valid backends: threads, mpi", other),
    }
}

fn run_threads(job: &JobConfig) -> Result<RunOutput> {
    println!("Backend: threads ({} workers)", job.workers.count);
    let system = build_system(job)?;
    show_source(job, &system);

    let solver = DistributedSolver {
        pivot_tolerance: job.workers.pivot_tolerance,
        ..DistributedSolver::new(job.workers.count)
    };
    let start = Instant::now();
    let reduced = solver
        .reduce(&system)
        .map_err(|e| anyhow::anyhow!("{} failed: {}", solver.method_name(), e))?;
    let elapsed = start.elapsed().as_secs_f64();

    finish(job, system, &reduced, job.workers.count, "threads", elapsed)
}

#[cfg(feature = "mpi")]
fn run_mpi(job: &JobConfig) -> Result<Option<RunOutput>> {
    use gjsolve_comm::{Communicator, MpiComm};
    use gjsolve_core::solver::gauss_jordan::COORDINATOR;

    let comm = MpiComm::new()?;
    let is_coordinator = comm.rank() == COORDINATOR;

    // A coordinator that cannot build its system still joins the collective
    // agreement without one, so every rank fails instead of waiting forever.
    let loaded = is_coordinator.then(|| build_system(job));
    let input = match &loaded {
        Some(Ok(system)) => {
            println!("Backend: {} ({} ranks)", comm.info().name, comm.size());
            show_source(job, system);
            Some(system)
        }
        _ => None,
    };

    let solver = DistributedSolver {
        pivot_tolerance: job.workers.pivot_tolerance,
        expected_workers: Some(job.workers.count),
        ..Default::default()
    };
    let start = Instant::now();
    let collected = solver.solve_worker(&comm, job.system.dimension, input);
    let elapsed = start.elapsed().as_secs_f64();

    let system = match loaded {
        Some(Ok(system)) => Some(system),
        Some(Err(e)) => return Err(e),
        None => None,
    };
    let collected = collected.map_err(|e| {
        anyhow::anyhow!("{} failed on rank {}: {}", solver.method_name(), comm.rank(), e)
    })?;

    match (collected, system) {
        (Some(reduced), Some(system)) => {
            finish(job, system, &reduced, comm.size(), "mpi", elapsed).map(Some)
        }
        _ => Ok(None),
    }
}

#[cfg(not(feature = "mpi"))]
fn run_mpi(_job: &JobConfig) -> Result<Option<RunOutput>> {
    anyhow::bail!("MPI backend requested but binary was built without --features mpi")
}

fn finish(
    job: &JobConfig,
    system: AugmentedSystem,
    reduced: &ReducedSystem,
    workers: usize,
    backend: &str,
    elapsed: f64,
) -> Result<RunOutput> {
    let reduced = reduced.reorder()?;
    let check = residual(&system, &reduced.rhs);

    if system.dimension() < job.output.print_threshold {
        println!("Reduced system (column order):");
        print!("{}", format_augmented(&reduced.matrix, &reduced.rhs));
    }
    println!("Solve time: {:.6} s", elapsed);
    println!("Max delta: {:.6e} (row {})", check.max_delta, check.row);

    let report = SolveReport {
        dimension: system.dimension(),
        workers,
        backend: backend.into(),
        elapsed_seconds: elapsed,
        residual: check,
        solution: reduced.rhs.to_vec(),
    };
    Ok(RunOutput { reduced, report })
}

fn show_source(job: &JobConfig, system: &AugmentedSystem) {
    println!("System: {} unknowns", system.dimension());
    if system.dimension() < job.output.print_threshold {
        println!("Input system:");
        print!("{}", format_augmented(&system.matrix, &system.rhs));
    }
}

/// Render `[A | b]` one row per line.
pub fn format_augmented(matrix: &Array2<f64>, rhs: &Array1<f64>) -> String {
    let mut out = String::new();
    for (row, b) in matrix.rows().into_iter().zip(rhs.iter()) {
        for v in row.iter() {
            out.push_str(&format!("{:>12.4}", v));
        }
        out.push_str(&format!("  | {:>12.4}\n", b));
    }
    out
}

/// Write the solution vector to a CSV file with a metadata header.
pub fn write_solution_csv(output: &RunOutput, path: &Path) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path)?;
    writeln!(file, "# gjsolve Gauss-Jordan solution")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(
        file,
        "# dimension: {}, workers: {} ({})",
        output.report.dimension, output.report.workers, output.report.backend
    )?;
    writeln!(file, "# max_delta: {:.6e}", output.report.residual.max_delta)?;
    writeln!(file, "#")?;
    writeln!(file, "index,value")?;
    for (i, x) in output.reduced.rhs.iter().enumerate() {
        writeln!(file, "{},{:.17e}", i, x)?;
    }

    println!("Solution written to: {}", path.display());
    Ok(())
}

/// Write the solve report to a JSON file.
pub fn write_report_json(report: &SolveReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(report)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    std::fs::write(path, json)?;

    println!("Report (JSON) written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use tempfile::TempDir;

    #[test]
    fn test_threads_job_solves_random_system() {
        let job = parse_config(
            "[system]\ndimension = 6\n[system.source]\nseed = 3\n[workers]\ncount = 3\n",
        )
        .unwrap();
        let output = run_job(&job).unwrap().unwrap();
        assert_eq!(output.reduced.rhs.len(), 6);
        assert!(output.report.residual.max_delta < 1e-8);
        for i in 0..6 {
            assert_eq!(output.reduced.matrix[[i, i]], 1.0);
        }
    }

    #[test]
    fn test_file_source_and_outputs() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("system.txt");
        std::fs::write(&input, "3\n2 1 -1 8\n-3 -1 2 -11\n-2 1 2 -3\n").unwrap();

        let job = parse_config(&format!(
            "[system]\ndimension = 3\n[system.source]\npath = {:?}\n[workers]\ncount = 2\n",
            input.display().to_string()
        ))
        .unwrap();
        let output = run_job(&job).unwrap().unwrap();
        approx::assert_abs_diff_eq!(output.reduced.rhs[0], 2.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(output.reduced.rhs[1], 3.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(output.reduced.rhs[2], -1.0, epsilon = 1e-9);

        let csv = dir.path().join("out").join("solution.csv");
        write_solution_csv(&output, &csv).unwrap();
        let text = std::fs::read_to_string(&csv).unwrap();
        assert!(text.contains("index,value"));
        assert_eq!(text.lines().filter(|l| !l.starts_with('#')).count(), 4);

        let json = dir.path().join("out").join("report.json");
        write_report_json(&output.report, &json).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(value["dimension"], 3);
        assert_eq!(value["solution"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_dimension_must_match_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("system.txt");
        std::fs::write(&input, "2\n1 0 1\n0 1 2\n").unwrap();
        let job = parse_config(&format!(
            "[system]\ndimension = 3\n[system.source]\npath = {:?}\n",
            input.display().to_string()
        ))
        .unwrap();
        assert!(build_system(&job).is_err());
    }

    #[test]
    fn test_singular_row_fails_the_solve() {
        let job = parse_config(
            "[system]\ndimension = 5\nsingular_row = 3\n[system.source]\nseed = 1\n[workers]\ncount = 2\n",
        )
        .unwrap();
        let err = run_job(&job).err().unwrap();
        assert!(err.to_string().contains("Singular"));
    }

    #[test]
    fn test_augmented_format_has_one_line_per_row() {
        let system = random_system(3, 10, Some(0));
        let text = format_augmented(&system.matrix, &system.rhs);
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().all(|l| l.contains('|')));
    }
}
