//! Reading URL lists for the `--input-file` option
//!
//! An input file holds one URL per line. Blank lines and lines starting with
//! `#` are skipped. The path `-` reads the list from stdin.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Comment marker for ignoring lines in input files
const COMMENT_MARKER: &str = "#";

/// A list of URLs read from a file or any other reader
#[derive(Debug, Clone)]
pub(crate) struct InputFile {
    /// The URLs, in file order
    pub(crate) urls: Vec<String>,
}

impl InputFile {
    /// Create `InputFile` from any reader
    pub(crate) fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let lines: Vec<String> = BufReader::new(reader)
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .context("Cannot read lines from reader")?;

        Ok(InputFile {
            urls: Self::filter_lines(lines),
        })
    }

    /// Trim lines, then drop comments and empty lines
    fn filter_lines(lines: Vec<String>) -> Vec<String> {
        lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty() && !line.starts_with(COMMENT_MARKER))
            .collect()
    }
}

impl TryFrom<&Path> for InputFile {
    type Error = anyhow::Error;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        if path == Path::new("-") {
            Self::from_reader(std::io::stdin())
        } else {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Cannot open input file: {}", path.display()))?;
            Self::from_reader(file)
        }
    }
}
