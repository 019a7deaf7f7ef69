//! Instrument Seed Data
//!
//! Initial rows for the simulated table: a JSON file of
//! `[{"code", "name", "price"}]` records, or a built-in universe.

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;

use crate::domain::instrument::{Instrument, ValidationError};

/// Errors loading a seed file.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    /// The file could not be read.
    #[error("failed to read seed file {path}: {source}")]
    Io {
        /// Seed file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a JSON array of instruments.
    #[error("failed to parse seed file {path}: {source}")]
    Parse {
        /// Seed file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A record failed validation.
    #[error("invalid seed record: {0}")]
    Invalid(#[from] ValidationError),
}

/// Read and validate a JSON seed file.
///
/// # Errors
///
/// Returns `SeedError` if the file is unreadable, malformed, or contains an
/// invalid record.
pub fn load_seed_file(path: &Path) -> Result<Vec<Instrument>, SeedError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_seed(&raw).map_err(|err| match err {
        SeedError::Parse { source, .. } => SeedError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

fn parse_seed(raw: &str) -> Result<Vec<Instrument>, SeedError> {
    let instruments: Vec<Instrument> =
        serde_json::from_str(raw).map_err(|source| SeedError::Parse {
            path: PathBuf::new(),
            source,
        })?;
    for instrument in &instruments {
        instrument.validate()?;
    }
    Ok(instruments)
}

/// Instruments used when no seed file is configured.
#[must_use]
pub fn builtin_universe() -> Vec<Instrument> {
    [
        ("AAPL", "Apple Inc.", 18_912),
        ("MSFT", "Microsoft Corporation", 41_533),
        ("GOOG", "Alphabet Inc.", 17_205),
        ("AMZN", "Amazon.com Inc.", 18_440),
        ("IBM", "International Business Machines", 16_871),
        ("ORCL", "Oracle Corporation", 12_659),
        ("INTC", "Intel Corporation", 3_092),
        ("CSCO", "Cisco Systems Inc.", 4_783),
        ("XRX", "Xerox Holdings Corporation", 1_234),
        ("HPQ", "HP Inc.", 3_317),
    ]
    .into_iter()
    .map(|(code, name, cents)| Instrument {
        code: code.to_string(),
        name: name.to_string(),
        price: Decimal::new(cents, 2),
    })
    .collect()
}
