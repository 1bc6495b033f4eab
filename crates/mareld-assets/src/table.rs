//! Flat float tables from CSV files.
//!
//! The simulation's data files (noise samples, precomputed tables) are
//! comma-separated floats, one or more values per line. Row/column shape
//! is the consumer's business; the loader returns a flat array in file
//! order.

use crate::{AssetError, Result};
use std::path::Path;

/// Load a CSV file of floats into a flat array.
pub fn load_float_table(path: impl AsRef<Path>) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| AssetError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_float_table(&text).map_err(|message| AssetError::MalformedTable {
        path: path.display().to_string(),
        message,
    })
}

fn parse_float_table(text: &str) -> std::result::Result<Vec<f32>, String> {
    let mut values = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        for token in line.split(',') {
            let token = token.trim().trim_matches('"');
            if token.is_empty() {
                continue;
            }
            let value: f32 = token
                .parse()
                .map_err(|_| format!("line {}: bad float '{token}'", line_no + 1))?;
            values.push(value);
        }
    }

    if values.is_empty() {
        return Err("no values".to_string());
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn parses_multi_line_csv() {
        let values = parse_float_table("1.0,2.5,-3.0\n4.0\n").unwrap();
        assert_eq!(values.len(), 4);
        assert_relative_eq!(values[1], 2.5);
        assert_relative_eq!(values[2], -3.0);
    }

    #[test]
    fn quoted_values_and_trailing_commas_are_tolerated() {
        let values = parse_float_table("\"0.5\", 1.5,\n").unwrap();
        assert_eq!(values, vec![0.5, 1.5]);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_float_table("1.0,abc\n").is_err());
    }

    #[test]
    fn empty_file_is_an_error() {
        assert!(parse_float_table("").is_err());
    }
}
