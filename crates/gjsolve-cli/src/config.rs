//! TOML configuration deserialisation for solve jobs.

use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub system: SystemConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// The linear system to solve.
#[derive(Debug, Deserialize)]
pub struct SystemConfig {
    /// Number of unknowns. Required for every source so that all workers
    /// know it before any data is exchanged.
    pub dimension: usize,
    #[serde(default)]
    pub source: SourceSpec,
    /// Zero this row (and its right-hand side) before solving.
    #[serde(default)]
    pub singular_row: Option<usize>,
}

/// Where the coordinator obtains the system: a file or a random generator.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    File {
        path: String,
    },
    Random {
        #[serde(default)]
        seed: Option<u64>,
        #[serde(default = "default_max_value")]
        max_value: u32,
    },
}

impl Default for SourceSpec {
    fn default() -> Self {
        SourceSpec::Random {
            seed: None,
            max_value: default_max_value(),
        }
    }
}

fn default_max_value() -> u32 {
    gjsolve_core::source::DEFAULT_MAX_VALUE
}

/// Worker group configuration.
#[derive(Debug, Deserialize)]
pub struct WorkersConfig {
    /// Number of workers. For the MPI backend this is checked against the
    /// number of launched ranks.
    #[serde(default = "default_worker_count")]
    pub count: usize,
    /// Communicator backend: "threads" or "mpi". Default: "threads".
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Pivot magnitudes at or below this value abort the solve.
    #[serde(default)]
    pub pivot_tolerance: f64,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            backend: default_backend(),
            pivot_tolerance: 0.0,
        }
    }
}

fn default_worker_count() -> usize {
    4
}
fn default_backend() -> String {
    "threads".into()
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save the solution as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_solution: bool,
    /// Whether to also save a JSON report (default: false).
    #[serde(default)]
    pub save_json: bool,
    /// Print source and reduced matrices when the dimension is below this
    /// (default: 8).
    #[serde(default = "default_print_threshold")]
    pub print_threshold: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_solution: true,
            save_json: false,
            print_threshold: default_print_threshold(),
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}
fn default_print_threshold() -> usize {
    8
}

/// Parse a TOML job configuration and check it for obvious mistakes.
pub fn parse_config(content: &str) -> anyhow::Result<JobConfig> {
    let config: JobConfig = toml::from_str(content)?;
    if config.system.dimension == 0 {
        anyhow::bail!("system.dimension must be at least 1");
    }
    if gjsolve_core::source::augmented_len(config.system.dimension).is_none() {
        anyhow::bail!("system.dimension = {} is too large", config.system.dimension);
    }
    if config.workers.count == 0 {
        anyhow::bail!("workers.count must be at least 1");
    }
    if let Some(row) = config.system.singular_row {
        if row >= config.system.dimension {
            anyhow::bail!(
                "system.singular_row = {} is outside a system of dimension {}",
                row,
                config.system.dimension
            );
        }
    }
    let tolerance = config.workers.pivot_tolerance;
    if !tolerance.is_finite() || tolerance < 0.0 {
        anyhow::bail!("workers.pivot_tolerance must be a non-negative number, got {}", tolerance);
    }
    if let SourceSpec::Random { max_value: 0, .. } = config.system.source {
        anyhow::bail!("system.source.max_value must be positive");
    }
    match config.workers.backend.as_str() {
        "threads" | "mpi" => {}
        other => anyhow::bail!("Unknown backend '{}'. Valid backends: threads, mpi", other),
    }
    Ok(config)
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let job = parse_config("[system]\ndimension = 5\n").unwrap();
        assert_eq!(job.system.dimension, 5);
        assert!(matches!(
            job.system.source,
            SourceSpec::Random { seed: None, max_value: 1000 }
        ));
        assert_eq!(job.workers.count, 4);
        assert_eq!(job.workers.backend, "threads");
        assert!(job.output.save_solution);
        assert_eq!(job.output.print_threshold, 8);
    }

    #[test]
    fn test_file_source() {
        let job = parse_config(
            "[system]\ndimension = 3\n[system.source]\npath = \"a.txt\"\n[workers]\ncount = 2\n",
        )
        .unwrap();
        assert!(matches!(job.system.source, SourceSpec::File { ref path } if path == "a.txt"));
        assert_eq!(job.workers.count, 2);
    }

    #[test]
    fn test_random_source_with_seed() {
        let job = parse_config("[system]\ndimension = 3\n[system.source]\nseed = 42\n").unwrap();
        assert!(matches!(
            job.system.source,
            SourceSpec::Random { seed: Some(42), .. }
        ));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(parse_config("[system]\ndimension = 0\n").is_err());
        assert!(parse_config("[system]\ndimension = 100000000000\n").is_err());
        assert!(parse_config("[system]\ndimension = 3\n[workers]\ncount = 0\n").is_err());
        assert!(parse_config("[system]\ndimension = 3\nsingular_row = 3\n").is_err());
        assert!(parse_config("[system]\ndimension = 3\n[workers]\nbackend = \"gpu\"\n").is_err());
        assert!(parse_config("[system]\ndimension = 3\n[workers]\npivot_tolerance = -1.0\n").is_err());
    }
}
