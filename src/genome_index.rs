use crate::errors::{AnnoError, AnnoResult};
use crate::options::{AnnoConfig, ChromInfo, ChromTable};
use crate::reader::{parse_int, parse_lines, split_fields};
use crate::transcript::{Transcript, TranscriptSet};
use crate::utils::get_text_reader_from_path;
use crate::variant::GenomicSpan;
use rayon::prelude::*;
use rust_lapper::{Interval, Lapper};
use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{debug, info};

type Iv = Interval<u64, usize>;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A fixed-size window of a chromosome and the keys of the transcripts whose
/// flank-extended span intersects it.
pub struct IndexWindow {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    pub transcripts: Vec<String>,
}

impl GenomicSpan for IndexWindow {
    fn chrom(&self) -> &str {
        &self.chrom
    }
    fn start(&self) -> i64 {
        self.start
    }
    fn end(&self) -> i64 {
        self.end
    }
}

/// Windows one chromosome. The flank-extended transcript spans go into a rust-lapper
/// tree, which is queried once per window. Only non-empty windows are returned.
fn index_chromosome(chrom: &ChromInfo, transcripts: &[&Transcript], step: i64) -> Vec<IndexWindow> {
    if transcripts.is_empty() {
        return Vec::new();
    }
    let start_time = std::time::Instant::now();

    let mut keys: Vec<String> = transcripts.iter().map(|t| t.key()).collect();
    keys.sort();
    let ivs: Vec<Iv> = transcripts
        .iter()
        .filter_map(|t| {
            let (s, e) = t.flanked_span();
            // rust-lapper intervals are right-exclusive
            keys.binary_search(&t.key()).ok().map(|val| Iv {
                start: s.max(1) as u64,
                stop: (e.max(s.max(1)) + 1) as u64,
                val,
            })
        })
        .collect();
    let lapper = Lapper::new(ivs);

    let mut windows = Vec::new();
    let mut i = 0i64;
    while i < chrom.length {
        let (ws, we) = (i + 1, (i + step).min(chrom.length));
        let mut hits: Vec<usize> = lapper
            .find(ws as u64, (we + 1) as u64)
            .map(|iv| iv.val)
            .collect();
        if !hits.is_empty() {
            hits.sort_unstable();
            hits.dedup();
            windows.push(IndexWindow {
                chrom: chrom.name.clone(),
                start: ws,
                end: we,
                transcripts: hits.into_iter().map(|h| keys[h].clone()).collect(),
            });
        }
        i += step;
    }

    debug!(
        "indexed chromosome {} ({} transcripts, {} windows) in {:?}",
        chrom.name,
        transcripts.len(),
        windows.len(),
        start_time.elapsed()
    );
    windows
}

#[derive(Debug, Clone, Default)]
/// The Genome Index: every non-empty window of every configured chromosome, sorted by
/// digital position.
///
/// A transcript is listed in a window iff `[exon_start - flank, exon_end + flank]`
/// intersects the window. Candidate transcripts for a sorted list of variants are
/// obtained with [GenomeIndex::candidates].
pub struct GenomeIndex {
    windows: Vec<IndexWindow>,
    spans: Vec<(i64, i64)>,
}

impl GenomeIndex {
    /// Builds the index of `transcripts` with one rayon task per configured chromosome.
    /// Transcripts on chromosomes missing from the table are not indexed.
    ///
    /// # Arguments
    ///
    /// * `transcripts`: the transcript model, with flanks already attached.
    /// * `config`: the configuration providing the window step and the chromosome table.
    pub fn build(transcripts: &TranscriptSet, config: &AnnoConfig) -> AnnoResult<GenomeIndex> {
        let start_time = std::time::Instant::now();
        let table = config.chrom_table();
        let step = config.param.refidx_step;
        if step <= 0 {
            return Err(AnnoError::Config(String::from(
                "refidx_step must be a positive number",
            )));
        }

        let by_chrom = transcripts.by_chrom();
        let unindexed: usize = by_chrom
            .iter()
            .filter(|(c, _)| !table.contains(c))
            .map(|(_, v)| v.len())
            .sum();
        if unindexed > 0 {
            debug!(
                "{} transcripts are on chromosomes outside of the chromosome table and are not indexed",
                unindexed
            );
        }

        let per_chrom: Vec<Vec<IndexWindow>> = config
            .chrom
            .par_iter()
            .map(|c| {
                let ts = by_chrom
                    .get(c.name.as_str())
                    .map(|v| v.as_slice())
                    .unwrap_or(&[]);
                index_chromosome(c, ts, step)
            })
            .collect();

        let index = GenomeIndex::from_windows(per_chrom.into_iter().flatten().collect(), &table)?;
        info!(
            "built a genome index of {} windows in {:?}",
            index.len(),
            start_time.elapsed()
        );
        Ok(index)
    }

    /// Sorts the windows by digital position and caches their spans.
    pub fn from_windows(windows: Vec<IndexWindow>, table: &ChromTable) -> AnnoResult<GenomeIndex> {
        let mut keyed = windows
            .into_iter()
            .map(|w| Ok(((w.digital_start(table)?, w.digital_end(table)?), w)))
            .collect::<AnnoResult<Vec<((i64, i64), IndexWindow)>>>()?;
        keyed.sort_by_key(|(span, _)| *span);
        let (spans, windows) = keyed.into_iter().unzip();
        Ok(GenomeIndex { windows, spans })
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn windows(&self) -> &[IndexWindow] {
        &self.windows
    }

    /// Finds the candidate transcripts of every variant with a merge walk over the sorted
    /// variants and the sorted windows.
    ///
    /// The window pointer moves past windows that end before the current variant starts;
    /// the windows from the pointer on that start before the variant ends overlap it and
    /// contribute their keys (deduplicated, in first-seen order).
    ///
    /// **Note** : `variants` must be sorted by digital position (see
    /// [crate::variant::sort_by_position]). This is not re-checked; unsorted input yields
    /// incomplete candidate lists.
    ///
    /// # Returns
    ///
    /// One candidate key list per variant, in input order, or
    /// [AnnoError::UnknownChromosome] if a variant is not on a configured chromosome.
    pub fn candidates<V: GenomicSpan>(
        &self,
        variants: &[V],
        table: &ChromTable,
    ) -> AnnoResult<Vec<Vec<&str>>> {
        let mut out = Vec::with_capacity(variants.len());
        let mut j = 0usize;
        for v in variants {
            let (vs, ve) = (v.digital_start(table)?, v.digital_end(table)?);
            while j < self.spans.len() && self.spans[j].1 < vs {
                j += 1;
            }
            let mut seen = HashSet::new();
            let mut keys = Vec::new();
            let mut k = j;
            while k < self.spans.len() && self.spans[k].0 <= ve {
                for key in self.windows[k].transcripts.iter() {
                    if seen.insert(key.as_str()) {
                        keys.push(key.as_str());
                    }
                }
                k += 1;
            }
            out.push(keys);
        }
        Ok(out)
    }

    /// Writes the index as `chrom<TAB>start<TAB>end<TAB>key,key,...` lines.
    pub fn write<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        for win in self.windows.iter() {
            writeln!(
                w,
                "{}\t{}\t{}\t{}",
                win.chrom,
                win.start,
                win.end,
                win.transcripts.join(",")
            )?;
        }
        w.flush()
    }

    /// Reads an index written by [GenomeIndex::write]. Malformed lines are skipped; a
    /// window on a chromosome missing from `table` is an error.
    pub fn read<R: BufRead>(reader: R, table: &ChromTable) -> AnnoResult<GenomeIndex> {
        let parsed = parse_lines(reader, "genome index", |line, no| {
            let fields = split_fields(line, no, 4)?;
            let chrom = fields[0].trim().to_string();
            if !table.contains(&chrom) {
                return Err(AnnoError::UnknownChromosome(chrom));
            }
            Ok(vec![IndexWindow {
                chrom,
                start: parse_int(fields[1], "window start", no)?,
                end: parse_int(fields[2], "window end", no)?,
                transcripts: fields[3]
                    .split(',')
                    .filter(|k| !k.is_empty())
                    .map(|k| k.to_string())
                    .collect(),
            }])
        })?;
        GenomeIndex::from_windows(parsed.records, table)
    }

    /// Reads a plain or gzipped index file.
    pub fn from_path<T: AsRef<Path>>(file_path: T, table: &ChromTable) -> AnnoResult<GenomeIndex> {
        let index = GenomeIndex::read(get_text_reader_from_path(file_path.as_ref())?, table)?;
        info!(
            "read {} genome index windows from {:?}",
            index.len(),
            file_path.as_ref()
        );
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{AnnoParams, ChromInfo};
    use crate::transcript::{Completeness, GeneModelRecord, Strand};
    use crate::variant::Variant;
    use pretty_assertions::assert_eq;

    fn config(step: i64, flank: i64) -> AnnoConfig {
        AnnoConfig {
            param: AnnoParams {
                up_down_stream: flank,
                refidx_step: step,
                splicing_len: 2,
            },
            chrom: vec![
                ChromInfo {
                    name: String::from("1"),
                    length: 10_000,
                },
                ChromInfo {
                    name: String::from("2"),
                    length: 5_000,
                },
            ],
        }
    }

    fn transcript(id: &str, chrom: &str, start: i64, end: i64) -> GeneModelRecord {
        GeneModelRecord {
            transcript_id: id.to_string(),
            chrom: chrom.to_string(),
            strand: Strand::Positive,
            tx_start: start,
            tx_end: end,
            cds_start: start,
            cds_end: end,
            exons: vec![(start, end)],
            gene_symbol: id.to_string(),
            tag: Completeness::Complete,
        }
    }

    #[test]
    fn test_window_membership() {
        let cfg = config(1000, 100);
        // pseudo-random spans from a linear congruential generator
        let mut seed = 7u64;
        let mut records = Vec::new();
        for i in 0..60 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let start = (seed >> 33) as i64 % 9_500 + 1;
            let len = (seed >> 20) as i64 % 700 + 1;
            let chrom = if i % 3 == 0 { "2" } else { "1" };
            let end = (start + len).min(if chrom == "2" { 5_000 } else { 10_000 });
            records.push(transcript(&format!("T{}", i), chrom, start.min(end), end));
        }
        let set = TranscriptSet::from_records(records, 100);
        let index = GenomeIndex::build(&set, &cfg).unwrap();

        for c in cfg.chrom.iter() {
            let mut ws = 1;
            while ws <= c.length {
                let we = (ws + 999).min(c.length);
                let listed: Vec<String> = index
                    .windows()
                    .iter()
                    .find(|w| w.chrom == c.name && w.start == ws)
                    .map(|w| w.transcripts.clone())
                    .unwrap_or_default();
                for t in set.iter() {
                    let overlaps = t.chrom == c.name
                        && t.exon_start - 100 <= we
                        && ws <= t.exon_end + 100;
                    assert_eq!(listed.contains(&t.key()), overlaps, "{} in {}:{}", t.key(), ws, we);
                }
                ws += 1000;
            }
        }
    }

    #[test]
    fn test_merge_walk() {
        let cfg = config(1000, 100);
        let table = cfg.chrom_table();
        let set = TranscriptSet::from_records(
            vec![
                transcript("A", "1", 500, 900),
                transcript("B", "1", 1500, 2600),
                transcript("C", "2", 100, 300),
            ],
            100,
        );
        let index = GenomeIndex::build(&set, &cfg).unwrap();
        assert_eq!(index.len(), 4);

        let vars = vec![
            Variant::normalize("1", 50, "A", "T"),
            Variant::normalize("1", 980, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", "A"),
            Variant::normalize("1", 5000, "A", "T"),
            Variant::normalize("2", 4000, "A", "T"),
        ];
        let cands = index.candidates(&vars, &table).unwrap();
        assert_eq!(cands[0], vec!["A|1:500:900"]);
        // spans two windows; the keys are deduplicated
        assert_eq!(cands[1], vec!["A|1:500:900", "B|1:1500:2600"]);
        assert!(cands[2].is_empty());
        assert!(cands[3].is_empty());
    }

    #[test]
    fn test_index_file_round_trip() {
        let cfg = config(1000, 10);
        let table = cfg.chrom_table();
        let set = TranscriptSet::from_records(
            vec![transcript("A", "2", 500, 1200), transcript("B", "1", 10, 20)],
            10,
        );
        let index = GenomeIndex::build(&set, &cfg).unwrap();
        let mut buf = Vec::new();
        index.write(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf.clone()).unwrap(),
            "1\t1\t1000\tB|1:10:20\n2\t1\t1000\tA|2:500:1200\n2\t1001\t2000\tA|2:500:1200\n"
        );
        let back = GenomeIndex::read(&buf[..], &table).unwrap();
        assert_eq!(back.windows(), index.windows());

        let bad = "Un\t1\t1000\tA\n";
        assert!(matches!(
            GenomeIndex::read(bad.as_bytes(), &table),
            Err(AnnoError::UnknownChromosome(_))
        ));
    }
}
