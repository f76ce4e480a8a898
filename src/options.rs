use crate::errors::{AnnoError, AnnoResult};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Default length of the upstream/downstream flanks, in bases.
pub const DEFAULT_FLANK: i64 = 3000;
/// Default width of a Genome Index window, in bases.
pub const DEFAULT_INDEX_STEP: i64 = 300_000;
/// Default distance from an exon boundary within which an intronic variant is
/// called a splicing variant.
pub const DEFAULT_SPLICING_LEN: i64 = 2;
/// Multiplier that separates chromosomes in the digital position space.
pub const CHROM_RANK_STRIDE: i64 = 1_000_000_000;

const GRCH37_CHROMS: [(&str, i64); 25] = [
    ("1", 249250621),
    ("2", 243199373),
    ("3", 198022430),
    ("4", 191154276),
    ("5", 180915260),
    ("6", 171115067),
    ("7", 159138663),
    ("8", 146364022),
    ("9", 141213431),
    ("10", 135534747),
    ("11", 135006516),
    ("12", 133851895),
    ("13", 115169878),
    ("14", 107349540),
    ("15", 102531392),
    ("16", 90354753),
    ("17", 81195210),
    ("18", 78077248),
    ("19", 59128983),
    ("20", 63025520),
    ("21", 48129895),
    ("22", 51304566),
    ("X", 155270560),
    ("Y", 59373566),
    ("MT", 16569),
];

#[nutype(derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, AsRef))]
/// The 1-based rank of a chromosome in the configured chromosome table.
pub struct ChromRank(i64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One entry of the chromosome table: the canonical name (no `chr` prefix)
/// and the length in bases.
pub struct ChromInfo {
    pub name: String,
    pub length: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The numeric knobs of the annotation.
///
/// # Fields
///
/// * `up_down_stream`: the length of the upstream/downstream flanks of each transcript.
/// * `refidx_step`: the width of a Genome Index window.
/// * `splicing_len`: the distance from an exon boundary within which an intronic
///   variant is reported as `splicing` instead of `intronic`.
#[serde(default)]
pub struct AnnoParams {
    pub up_down_stream: i64,
    pub refidx_step: i64,
    pub splicing_len: i64,
}

impl Default for AnnoParams {
    fn default() -> AnnoParams {
        AnnoParams {
            up_down_stream: DEFAULT_FLANK,
            refidx_step: DEFAULT_INDEX_STEP,
            splicing_len: DEFAULT_SPLICING_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The configuration of an annotation run.
///
/// The configuration is an explicit value that is passed to every entry point that needs it.
/// It can be read from a YAML file of the following shape, where every key is optional:
///
/// ```yaml
/// param:
///   up_down_stream: 3000
///   refidx_step: 300000
///   splicing_len: 2
/// chrom:
///   - name: "1"
///     length: 249250621
///   - name: "MT"
///     length: 16569
/// ```
///
/// The order of the `chrom` list defines the chromosome ranks used for sorting and for the
/// digital positions of the Genome Index. When `chrom` is omitted the GRCh37 table
/// (1-22, X, Y, MT) is used.
#[serde(default)]
pub struct AnnoConfig {
    pub param: AnnoParams,
    pub chrom: Vec<ChromInfo>,
}

impl Default for AnnoConfig {
    fn default() -> AnnoConfig {
        AnnoConfig {
            param: AnnoParams::default(),
            chrom: GRCH37_CHROMS
                .iter()
                .map(|(name, length)| ChromInfo {
                    name: name.to_string(),
                    length: *length,
                })
                .collect(),
        }
    }
}

impl AnnoConfig {
    /// Reads a YAML configuration file and validates it.
    ///
    /// # Arguments
    ///
    /// * `file_path`: the path to the YAML file.
    ///
    /// # Returns
    ///
    /// * `Ok(AnnoConfig)`: if the file could be read, parsed and validated.
    /// * `Err(AnnoError)`: an [AnnoError::Io] if the file cannot be read, or an
    ///   [AnnoError::Config] if it cannot be parsed or fails validation.
    pub fn from_yaml<T: AsRef<Path>>(file_path: T) -> AnnoResult<AnnoConfig> {
        let content = std::fs::read_to_string(file_path.as_ref())?;
        let config: AnnoConfig = serde_yaml::from_str(&content)
            .map_err(|e| AnnoError::Config(format!("{:?}: {}", file_path.as_ref(), e)))?;
        config.validate()?;
        debug!(
            "loaded configuration with {} chromosomes from {:?}",
            config.chrom.len(),
            file_path.as_ref()
        );
        Ok(config)
    }

    /// Checks that the window step is positive, that the flank and splicing distances are
    /// not negative and that the chromosome table is non-empty with unique names.
    pub fn validate(&self) -> AnnoResult<()> {
        if self.param.refidx_step <= 0 {
            return Err(AnnoError::Config(String::from(
                "refidx_step must be a positive number",
            )));
        }
        if self.param.up_down_stream < 0 || self.param.splicing_len < 0 {
            return Err(AnnoError::Config(String::from(
                "up_down_stream and splicing_len cannot be negative",
            )));
        }
        if self.chrom.is_empty() {
            return Err(AnnoError::Config(String::from(
                "the chromosome table is empty",
            )));
        }
        let mut seen = HashMap::new();
        for c in self.chrom.iter() {
            if c.length <= 0 || c.length >= CHROM_RANK_STRIDE {
                return Err(AnnoError::Config(format!(
                    "chromosome {} has an invalid length {}",
                    c.name, c.length
                )));
            }
            if seen.insert(c.name.as_str(), ()).is_some() {
                return Err(AnnoError::Config(format!(
                    "chromosome {} is listed twice",
                    c.name
                )));
            }
        }
        Ok(())
    }

    /// Builds the lookup table of chromosome ranks and lengths.
    pub fn chrom_table(&self) -> ChromTable {
        ChromTable::new(&self.chrom)
    }

    /// Replaces the configured chromosome lengths with the lengths observed in a genome
    /// FASTA. Chromosomes of the table that are missing from the FASTA keep their
    /// configured length; FASTA records that are not in the table are ignored.
    pub fn update_lengths(&mut self, observed: &[(String, usize)]) {
        let observed: HashMap<&str, usize> = observed
            .iter()
            .map(|(name, len)| (crate::utils::strip_chr_prefix(name), *len))
            .collect();
        for c in self.chrom.iter_mut() {
            match observed.get(c.name.as_str()) {
                Some(len) => c.length = *len as i64,
                None => warn!(
                    "chromosome {} was not found in the genome; keeping the configured length {}",
                    c.name, c.length
                ),
            }
        }
    }
}

#[derive(Debug, Clone)]
/// A name-indexed view of the configured chromosome table.
pub struct ChromTable {
    entries: Vec<ChromInfo>,
    ranks: HashMap<String, usize>,
}

impl ChromTable {
    pub fn new(entries: &[ChromInfo]) -> ChromTable {
        let ranks = entries
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        ChromTable {
            entries: entries.to_vec(),
            ranks,
        }
    }

    /// The chromosomes in configured order.
    pub fn entries(&self) -> &[ChromInfo] {
        &self.entries
    }

    pub fn contains(&self, chrom: &str) -> bool {
        self.ranks.contains_key(chrom)
    }

    /// Returns the 1-based rank of `chrom`, or [AnnoError::UnknownChromosome].
    pub fn rank(&self, chrom: &str) -> AnnoResult<ChromRank> {
        self.ranks
            .get(chrom)
            .map(|i| ChromRank::new(*i as i64 + 1))
            .ok_or_else(|| AnnoError::UnknownChromosome(chrom.to_string()))
    }

    pub fn length(&self, chrom: &str) -> AnnoResult<i64> {
        self.ranks
            .get(chrom)
            .map(|i| self.entries[*i].length)
            .ok_or_else(|| AnnoError::UnknownChromosome(chrom.to_string()))
    }

    /// Maps a position on `chrom` to the global digital position
    /// `rank * 10^9 + pos`, which orders positions across the whole genome.
    pub fn digital_position(&self, chrom: &str, pos: i64) -> AnnoResult<i64> {
        Ok(self.rank(chrom)?.into_inner() * CHROM_RANK_STRIDE + pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = AnnoConfig::default();
        assert!(config.validate().is_ok());
        let table = config.chrom_table();
        assert_eq!(table.entries().len(), 25);
        assert_eq!(table.rank("1").unwrap(), ChromRank::new(1));
        assert_eq!(table.rank("MT").unwrap(), ChromRank::new(25));
        assert_eq!(table.length("MT").unwrap(), 16569);
        assert_eq!(
            table.digital_position("2", 150).unwrap(),
            2 * CHROM_RANK_STRIDE + 150
        );
        assert!(matches!(
            table.rank("chrUn"),
            Err(AnnoError::UnknownChromosome(_))
        ));
    }

    #[test]
    fn test_yaml_config() {
        let yaml = "param:\n  up_down_stream: 100\nchrom:\n  - name: \"2\"\n    length: 5000\n  - name: \"1\"\n    length: 8000\n";
        let config: AnnoConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.param.up_down_stream, 100);
        assert_eq!(config.param.refidx_step, DEFAULT_INDEX_STEP);
        assert_eq!(config.param.splicing_len, DEFAULT_SPLICING_LEN);

        // ranks follow the configured order, not the lexical one
        let table = config.chrom_table();
        assert!(table.rank("2").unwrap() < table.rank("1").unwrap());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AnnoConfig::default();
        config.param.refidx_step = 0;
        assert!(matches!(config.validate(), Err(AnnoError::Config(_))));

        let mut config = AnnoConfig::default();
        config.chrom.push(ChromInfo {
            name: String::from("1"),
            length: 10,
        });
        assert!(matches!(config.validate(), Err(AnnoError::Config(_))));
    }

    #[test]
    fn test_update_lengths() {
        let mut config = AnnoConfig::default();
        config.update_lengths(&[(String::from("chr1"), 1000), (String::from("GL000192.1"), 5)]);
        let table = config.chrom_table();
        assert_eq!(table.length("1").unwrap(), 1000);
        assert_eq!(table.length("2").unwrap(), 243199373);
        assert!(!table.contains("GL000192.1"));
    }
}
