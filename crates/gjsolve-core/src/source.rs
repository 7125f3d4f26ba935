//! Construction of input systems: random generation and a plain-text format.
//!
//! The text format is:
//! ```text
//! # comments and blank lines are ignored
//! <n>
//! <a_00> <a_01> ... <a_0(n-1)> <b_0>
//! ...
//! <a_(n-1)0> ...               <b_(n-1)>
//! ```

use std::path::Path;

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::types::AugmentedSystem;

/// Default exclusive upper bound for randomly generated entries.
pub const DEFAULT_MAX_VALUE: u32 = 1000;

/// Errors while reading a system file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    FormatError { line: usize, message: String },
}

/// Number of values in an `n`-unknown augmented system (`n * (n + 1)`), or
/// `None` if that overflows `usize`.
pub fn augmented_len(dimension: usize) -> Option<usize> {
    dimension.checked_add(1)?.checked_mul(dimension)
}

/// Generate an `n`-unknown system with integer entries drawn uniformly from
/// `0..max_value`.
///
/// With a `seed` the result is reproducible; without one the generator is
/// seeded from the operating system.
///
/// # Panics
/// If `max_value` is zero or [`augmented_len`] overflows.
pub fn random_system(dimension: usize, max_value: u32, seed: Option<u64>) -> AugmentedSystem {
    assert!(max_value > 0, "max_value must be positive");
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let mut draw = || rng.gen_range(0..max_value) as f64;

    let matrix = Array2::from_shape_simple_fn((dimension, dimension), &mut draw);
    let rhs = Array1::from_shape_simple_fn(dimension, &mut draw);
    AugmentedSystem { matrix, rhs }
}

/// Zero row `row` and its right-hand side, producing a singular system.
///
/// # Panics
/// If `row` is not a row of `system`.
pub fn singular_variant(system: &AugmentedSystem, row: usize) -> AugmentedSystem {
    let mut out = system.clone();
    out.matrix.row_mut(row).fill(0.0);
    out.rhs[row] = 0.0;
    out
}

/// Parse a system from the text format described in the module docs.
pub fn parse_system(content: &str) -> Result<AugmentedSystem, ParseError> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.split('#').next().unwrap_or("").trim()))
        .filter(|(_, line)| !line.is_empty());

    let (header_line, header) = lines.next().ok_or_else(|| ParseError::FormatError {
        line: 1,
        message: "File is empty; expected the system dimension".into(),
    })?;
    let dimension: usize = header.parse().map_err(|_| ParseError::FormatError {
        line: header_line,
        message: format!("First entry must be the system dimension, got '{}'", header),
    })?;
    if dimension == 0 {
        return Err(ParseError::FormatError {
            line: header_line,
            message: "System dimension must be at least 1".into(),
        });
    }
    if augmented_len(dimension).is_none() {
        return Err(ParseError::FormatError {
            line: header_line,
            message: format!("System dimension {} is too large", dimension),
        });
    }

    // Grown row by row; the header alone is not trusted for allocation.
    let mut coefficients = Vec::new();
    let mut rhs = Vec::new();
    for (line_no, line) in lines {
        if rhs.len() == dimension {
            return Err(ParseError::FormatError {
                line: line_no,
                message: format!("Unexpected data after {} rows", dimension),
            });
        }
        let values = line
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| ParseError::FormatError {
                    line: line_no,
                    message: format!("Invalid number '{}'", token),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        if values.len() != dimension + 1 {
            return Err(ParseError::FormatError {
                line: line_no,
                message: format!(
                    "Expected {} coefficients and a right-hand side, got {} values",
                    dimension,
                    values.len()
                ),
            });
        }
        coefficients.extend_from_slice(&values[..dimension]);
        rhs.push(values[dimension]);
    }

    if rhs.len() != dimension {
        return Err(ParseError::FormatError {
            line: header_line,
            message: format!("Header says {} rows but found {}", dimension, rhs.len()),
        });
    }

    let matrix = Array2::from_shape_vec((dimension, dimension), coefficients).map_err(|e| {
        ParseError::FormatError {
            line: header_line,
            message: e.to_string(),
        }
    })?;
    Ok(AugmentedSystem {
        matrix,
        rhs: Array1::from_vec(rhs),
    })
}

/// Read and parse a system file.
pub fn load_system(path: &Path) -> Result<AugmentedSystem, ParseError> {
    let content = std::fs::read_to_string(path)?;
    parse_system(&content)
}

/// Render a system in the text format accepted by [`parse_system`].
///
/// Values are written with Rust's shortest round-trip formatting, so parsing
/// the output reproduces the system exactly.
pub fn format_system(system: &AugmentedSystem) -> String {
    let mut out = format!("{}\n", system.dimension());
    for (row, b) in system.matrix.rows().into_iter().zip(system.rhs.iter()) {
        let line: Vec<String> = row.iter().chain(std::iter::once(b)).map(|v| v.to_string()).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

/// Write a system file, creating parent directories as needed.
pub fn write_system(system: &AugmentedSystem, path: &Path) -> Result<(), ParseError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format_system(system))?;
    Ok(())
}
