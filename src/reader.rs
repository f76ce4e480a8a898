pub mod entrez;
pub mod fasta;
pub mod refgene;
pub mod variant;
pub mod vcf;

use crate::errors::{AnnoError, AnnoResult};
use crate::utils::is_skippable_line;
use std::io::BufRead;
use tracing::warn;

#[derive(Debug, Default)]
/// The outcome of reading a line-oriented file: the parsed records and the
/// malformed lines that were skipped.
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub skipped: Vec<AnnoError>,
}

impl<T> Parsed<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Drives `parse` over every record line of `reader`.
///
/// Empty lines and `#` comments are ignored. `parse` receives the line and its 1-based
/// number and returns the records the line yields (possibly none). Recoverable errors
/// ([AnnoError::MalformedRecord]) skip the line and are collected; any other error
/// aborts the read.
///
/// # Arguments
///
/// * `reader`: the buffered input.
/// * `what`: a name for the input used in the log messages.
/// * `parse`: the per-line parser.
pub fn parse_lines<T, R, F>(reader: R, what: &str, mut parse: F) -> AnnoResult<Parsed<T>>
where
    R: BufRead,
    F: FnMut(&str, usize) -> AnnoResult<Vec<T>>,
{
    let mut parsed = Parsed {
        records: Vec::new(),
        skipped: Vec::new(),
    };
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if is_skippable_line(&line) {
            continue;
        }
        match parse(&line, idx + 1) {
            Ok(mut recs) => parsed.records.append(&mut recs),
            Err(e) if e.is_recoverable() => parsed.skipped.push(e),
            Err(e) => return Err(e),
        }
    }
    if !parsed.skipped.is_empty() {
        warn!(
            "skipped {} malformed {} records; the first one was: {}",
            parsed.skipped.len(),
            what,
            parsed.skipped[0]
        );
    }
    Ok(parsed)
}

/// Splits a tab-delimited line and checks that it has at least `min_fields` columns.
pub(crate) fn split_fields(line: &str, line_no: usize, min_fields: usize) -> AnnoResult<Vec<&str>> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < min_fields {
        return Err(AnnoError::malformed(
            line_no,
            format!(
                "expected at least {} tab-separated columns, found {}",
                min_fields,
                fields.len()
            ),
        ));
    }
    Ok(fields)
}

/// Parses an integer column, reporting the column name on failure.
pub(crate) fn parse_int<N: std::str::FromStr>(field: &str, name: &str, line_no: usize) -> AnnoResult<N> {
    field
        .trim()
        .parse::<N>()
        .map_err(|_| AnnoError::malformed(line_no, format!("invalid {} {:?}", name, field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines() {
        let text = "#header\n1\n\nx\n3\n";
        let parsed = parse_lines(text.as_bytes(), "number", |line, no| {
            Ok(vec![parse_int::<i64>(line, "value", no)?])
        })
        .unwrap();
        assert_eq!(parsed.records, vec![1, 3]);
        assert_eq!(parsed.skipped.len(), 1);
        assert!(matches!(
            parsed.skipped[0],
            AnnoError::MalformedRecord { line: 4, .. }
        ));

        let fatal = parse_lines("1\n".as_bytes(), "number", |_, _| -> AnnoResult<Vec<i64>> {
            Err(AnnoError::UnknownChromosome(String::from("Un")))
        });
        assert!(fatal.is_err());
    }

    #[test]
    fn test_split_fields() {
        assert_eq!(split_fields("a\tb\tc", 1, 3).unwrap(), vec!["a", "b", "c"]);
        assert!(split_fields("a\tb", 1, 3).is_err());
    }
}
