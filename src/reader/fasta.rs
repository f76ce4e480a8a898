use crate::sequence::Sequence;
use crate::utils::{get_noodles_reader_from_path, get_noodles_reader_from_reader, FastaReader};
use anyhow::Context;
use noodles::fasta;
use noodles::fasta::record::Definition;
use std::collections::HashMap;
use std::io::{BufRead, Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// Returns the name of a FASTA record, i.e. its definition line up to the first space.
fn record_name(record: &fasta::Record) -> anyhow::Result<String> {
    let record_name = record.name();
    Ok(record_name
        .split_once(' ')
        .unwrap_or((record_name, ""))
        .0
        .to_string())
}

#[derive(Debug, Clone, Default)]
/// The transcript sequence store.
///
/// Each entry holds the positive-strand genomic sequence of a transcript's
/// `[exon_start, exon_end]` span, keyed by the transcript key
/// (`transcript_id|chrom:exon_start:exon_end`). The store is written by the database
/// preparation step and read back as a FASTA file.
///
/// # Examples
///
/// ```ignore
/// let store = SequenceStore::from_path("refgene.mrna.fa")?;
/// let genomic = store.get("NM_000546|17:7565097:7590856");
/// ```
pub struct SequenceStore {
    sequences: HashMap<String, Sequence>,
}

impl SequenceStore {
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Sequence> {
        self.sequences.get(key)
    }

    pub fn insert(&mut self, key: String, sequence: Sequence) -> Option<Sequence> {
        self.sequences.insert(key, sequence)
    }

    /// Reads a plain or gzipped sequence store FASTA file.
    pub fn from_path<T: AsRef<Path>>(file_path: T) -> anyhow::Result<SequenceStore> {
        let start_time = std::time::Instant::now();
        let mut reader = get_noodles_reader_from_path(file_path.as_ref())
            .with_context(|| format!("could not open {:?}", file_path.as_ref()))?;
        let store = SequenceStore::from_fasta_reader(&mut reader)?;
        info!(
            "read {} transcript sequences from {:?}",
            store.len(),
            file_path.as_ref()
        );
        debug!("read sequence store in {:?}", start_time.elapsed());
        Ok(store)
    }

    /// Reads a sequence store from any reader; gzip compression is detected.
    pub fn from_reader(r: impl Read + 'static) -> anyhow::Result<SequenceStore> {
        let mut reader = get_noodles_reader_from_reader(r)?;
        SequenceStore::from_fasta_reader(&mut reader)
    }

    fn from_fasta_reader(reader: &mut FastaReader) -> anyhow::Result<SequenceStore> {
        let mut sequences = HashMap::new();
        for result in reader.records() {
            let record = result?;
            let name = record_name(&record)?;
            sequences.insert(name, Sequence::from(record.sequence().as_ref()));
        }
        Ok(SequenceStore { sequences })
    }

    /// Writes the store as FASTA, with records sorted by key so the output is
    /// reproducible.
    pub fn write<W: Write>(&self, w: W) -> anyhow::Result<()> {
        let mut keys: Vec<&String> = self.sequences.keys().collect();
        keys.sort();
        let mut writer = fasta::Writer::new(w);
        for key in keys {
            if let Some(seq) = self.sequences.get(key) {
                write_record(&mut writer, key, seq)?;
            }
        }
        Ok(())
    }
}

/// Writes one FASTA record.
pub fn write_record<W: Write>(
    writer: &mut fasta::Writer<W>,
    name: &str,
    sequence: &Sequence,
) -> anyhow::Result<()> {
    let definition = Definition::new(name.to_string(), None);
    let record = fasta::Record::new(
        definition,
        fasta::record::Sequence::from(sequence.as_bytes().to_vec()),
    );
    writer.write_record(&record)?;
    Ok(())
}

/// Visits every record of a genome FASTA file, one chromosome at a time, passing the name
/// (up to the first space, with any `chr` prefix kept) and the sequence to `visit`.
///
/// Only one chromosome is held in memory at any time.
pub fn for_each_chromosome<T, F>(file_path: T, mut visit: F) -> anyhow::Result<()>
where
    T: AsRef<Path>,
    F: FnMut(&str, Sequence) -> anyhow::Result<()>,
{
    let mut reader = get_noodles_reader_from_path(file_path.as_ref())
        .with_context(|| format!("could not open {:?}", file_path.as_ref()))?;
    for result in reader.records() {
        let record = result?;
        let name = record_name(&record)?;
        visit(&name, Sequence::from(record.sequence().as_ref()))?;
    }
    Ok(())
}

/// Extracts sequence names and lengths from a FASTA file.
///
/// This function parses a FASTA file to extract the names (identifiers) and lengths of the
/// sequences it contains, typically the chromosomes of a genome.
///
/// # Returns
///
/// Returns `anyhow::Result<Vec<(String, usize)>>`:
/// * `Ok(Vec<(String, usize)>)`: the name and length of every record, in file order.
/// * `Err(anyhow::Error)`: an error if there is a problem opening the file or reading from it.
///
/// # Examples
///
/// ```ignore
/// let chromsize = get_chromsize("path/to/genome.fa")?;
/// config.update_lengths(&chromsize);
/// ```
pub fn get_chromsize<T: AsRef<Path>>(file_path: T) -> anyhow::Result<Vec<(String, usize)>> {
    let mut reader = get_noodles_reader_from_path(file_path)?;
    _get_chromsize(&mut reader)
}

fn _get_chromsize<T: BufRead>(rdr: &mut fasta::Reader<T>) -> anyhow::Result<Vec<(String, usize)>> {
    let mut chromsize = Vec::new();
    for result in rdr.records() {
        let record = result?;
        chromsize.push((record_name(&record)?, record.sequence().len()));
    }
    Ok(chromsize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_get_chromsize() {
        let fasta_data = b">sq0 test\nACGT\n>sq1\nNNNN\nNNNN\nNN\n";
        let mut rdr = fasta::Reader::new(&fasta_data[..]);

        let chromsize = _get_chromsize(&mut rdr).unwrap();
        assert_eq!(
            chromsize,
            vec![(String::from("sq0"), 4), (String::from("sq1"), 10)]
        );
    }

    #[test]
    fn test_store_round_trip() {
        let mut store = SequenceStore::default();
        store.insert(String::from("NM_2|1:11:20"), Sequence::from("acgtacgtac"));
        store.insert(String::from("NM_1|1:1:4"), Sequence::from("TTTT"));

        let mut buf = Vec::new();
        store.write(&mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with(">NM_1|1:1:4\nTTTT\n"));

        let back = SequenceStore::from_reader(Cursor::new(buf)).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(
            back.get("NM_2|1:11:20").unwrap().to_string(),
            "ACGTACGTAC"
        );
    }
}
