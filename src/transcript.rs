use crate::errors::{AnnoError, AnnoResult};
use crate::reader::entrez::EntrezIndex;
use crate::reader::fasta::SequenceStore;
use crate::sequence::Sequence;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Strand {
    Positive,
    Negative,
}

impl Strand {
    pub fn is_positive(&self) -> bool {
        matches!(self, Strand::Positive)
    }
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Strand::Positive => write!(f, "+"),
            Strand::Negative => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
/// The kind of a transcript segment.
pub enum RegionKind {
    Utr5,
    Cds,
    Utr3,
    Intron,
    Upstream,
    Downstream,
}

impl RegionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionKind::Utr5 => "UTR5",
            RegionKind::Cds => "CDS",
            RegionKind::Utr3 => "UTR3",
            RegionKind::Intron => "intron",
            RegionKind::Upstream => "upstream",
            RegionKind::Downstream => "downstream",
        }
    }

    pub fn is_utr(&self) -> bool {
        matches!(self, RegionKind::Utr5 | RegionKind::Utr3)
    }

    pub fn is_exonic(&self) -> bool {
        matches!(self, RegionKind::Utr5 | RegionKind::Cds | RegionKind::Utr3)
    }
}

impl std::fmt::Display for RegionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
/// A closed segment `[start, end]` of a transcript.
///
/// `exon_order` is the 1-based number of the exon the segment belongs to, counted from
/// the 5' end of the transcript. Introns and flanks carry 0.
pub struct Region {
    pub start: i64,
    pub end: i64,
    pub kind: RegionKind,
    pub exon_order: u32,
}

impl Region {
    pub fn new(start: i64, end: i64, kind: RegionKind, exon_order: u32) -> Region {
        Region {
            start,
            end,
            kind,
            exon_order,
        }
    }

    pub fn len(&self) -> i64 {
        (self.end - self.start + 1).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, pos: i64) -> bool {
        self.start <= pos && pos <= self.end
    }

    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        self.start <= end && start <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
/// How trustworthy the coding annotation of a transcript is.
pub enum Completeness {
    /// the CDS translates to a protein with a start residue and one terminal stop
    Complete,
    /// a CDS exists but its translation is not a complete protein
    Incomplete,
    /// non-coding, or no sequence is available
    Unknown,
}

impl Completeness {
    /// Parses the completeness tag of a gene-model record.
    pub fn from_tag(tag: &str) -> Completeness {
        match tag {
            "cmpl" => Completeness::Complete,
            "incmpl" => Completeness::Incomplete,
            _ => Completeness::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One flat gene-model record, already converted to 1-based inclusive coordinates.
pub struct GeneModelRecord {
    pub transcript_id: String,
    pub chrom: String,
    pub strand: Strand,
    pub tx_start: i64,
    pub tx_end: i64,
    pub cds_start: i64,
    pub cds_end: i64,
    /// `(start, end)` of every exon, in ascending genomic order
    pub exons: Vec<(i64, i64)>,
    pub gene_symbol: String,
    pub tag: Completeness,
}

/// Builds the key under which a transcript is stored in the sequence store and in the
/// Genome Index.
pub fn transcript_key(transcript_id: &str, chrom: &str, exon_start: i64, exon_end: i64) -> String {
    format!("{}|{}:{}:{}", transcript_id, chrom, exon_start, exon_end)
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A transcript of the reference model, segmented into [Region]s.
///
/// Transcripts are built once from a [GeneModelRecord] by [Transcript::build], gain their
/// coding and protein sequence in a second pass ([Transcript::with_coding]) and are
/// read-only afterwards. `coding` is stored 5' to 3' in transcript orientation, i.e.
/// reverse complemented for transcripts on the negative strand.
pub struct Transcript {
    pub chrom: String,
    pub strand: Strand,
    pub gene_symbol: String,
    pub entrez_id: String,
    pub transcript_id: String,
    pub exon_start: i64,
    pub exon_end: i64,
    pub cds_start: i64,
    pub cds_end: i64,
    pub exon_count: u32,
    pub regions: Vec<Region>,
    pub upstream: Region,
    pub downstream: Region,
    pub coding: Option<Sequence>,
    pub protein: Option<Sequence>,
    pub completeness: Completeness,
}

impl Transcript {
    /// Segments a gene-model record into UTR, CDS and intron [Region]s and adds the two
    /// flanking regions.
    ///
    /// Exons entirely outside `[cds_start, cds_end]` become a single UTR region, typed by
    /// strand and side (left of the CDS is the 5' UTR on the positive strand and the 3'
    /// UTR on the negative strand). Exons entirely inside the CDS become a CDS region.
    /// Exons that straddle a CDS boundary are split into up to three regions that share
    /// the exon order. Consecutive exons are separated by an intron region.
    ///
    /// # Arguments
    ///
    /// * `record`: the gene-model record.
    /// * `flank`: the length of the upstream and downstream regions.
    ///
    /// # Returns
    ///
    /// The [Transcript], with its completeness taken from the record tag (or `Unknown`
    /// if the record has no CDS) and no sequence.
    pub fn build(record: GeneModelRecord, flank: i64) -> Transcript {
        let GeneModelRecord {
            transcript_id,
            chrom,
            strand,
            tx_start,
            tx_end,
            cds_start,
            cds_end,
            exons,
            gene_symbol,
            tag,
        } = record;

        let exon_count = exons.len() as u32;
        let positive = strand.is_positive();
        let (left_utr, right_utr) = if positive {
            (RegionKind::Utr5, RegionKind::Utr3)
        } else {
            (RegionKind::Utr3, RegionKind::Utr5)
        };

        let mut regions = Vec::with_capacity(exons.len() * 2);
        let mut prev_end: Option<i64> = None;
        for (i, (start, end)) in exons.iter().copied().enumerate() {
            let order = if positive {
                i as u32 + 1
            } else {
                exon_count - i as u32
            };
            if let Some(pe) = prev_end {
                if pe + 1 < start {
                    regions.push(Region::new(pe + 1, start - 1, RegionKind::Intron, 0));
                }
            }
            prev_end = Some(end);

            if end < cds_start {
                regions.push(Region::new(start, end, left_utr, order));
            } else if start > cds_end {
                regions.push(Region::new(start, end, right_utr, order));
            } else {
                if start < cds_start {
                    regions.push(Region::new(start, cds_start - 1, left_utr, order));
                }
                let (cs, ce) = (start.max(cds_start), end.min(cds_end));
                if cs <= ce {
                    regions.push(Region::new(cs, ce, RegionKind::Cds, order));
                }
                if end > cds_end {
                    regions.push(Region::new(cds_end + 1, end, right_utr, order));
                }
            }
        }
        regions.sort_by_key(|r| r.start);

        let left = Region::new((tx_start - flank).max(1), tx_start - 1, RegionKind::Upstream, 0);
        let right = Region::new(tx_end + 1, tx_end + flank, RegionKind::Downstream, 0);
        let (upstream, downstream) = if positive {
            (left, right)
        } else {
            (
                Region::new(right.start, right.end, RegionKind::Upstream, 0),
                Region::new(left.start, left.end, RegionKind::Downstream, 0),
            )
        };

        let has_cds = regions.iter().any(|r| r.kind == RegionKind::Cds);
        let completeness = if has_cds { tag } else { Completeness::Unknown };

        Transcript {
            chrom,
            strand,
            gene_symbol,
            entrez_id: String::new(),
            transcript_id,
            exon_start: tx_start,
            exon_end: tx_end,
            cds_start,
            cds_end,
            exon_count,
            regions,
            upstream,
            downstream,
            coding: None,
            protein: None,
            completeness,
        }
    }

    /// The key of the transcript in the sequence store and the Genome Index.
    pub fn key(&self) -> String {
        transcript_key(
            &self.transcript_id,
            &self.chrom,
            self.exon_start,
            self.exon_end,
        )
    }

    pub fn is_positive(&self) -> bool {
        self.strand.is_positive()
    }

    pub fn is_mitochondrial(&self) -> bool {
        self.chrom == "MT"
    }

    /// `true` if `[start, end]` intersects `[exon_start, exon_end]`.
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        self.exon_start <= end && start <= self.exon_end
    }

    /// The span of the transcript extended by its flanks.
    pub fn flanked_span(&self) -> (i64, i64) {
        (
            self.upstream.start.min(self.downstream.start),
            self.upstream.end.max(self.downstream.end),
        )
    }

    /// The flanking regions in genomic order.
    pub fn flanks(&self) -> [&Region; 2] {
        if self.is_positive() {
            [&self.upstream, &self.downstream]
        } else {
            [&self.downstream, &self.upstream]
        }
    }

    pub fn cds_regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(|r| r.kind == RegionKind::Cds)
    }

    /// The total length of the CDS regions.
    pub fn coding_len(&self) -> usize {
        self.cds_regions().map(|r| r.len() as usize).sum()
    }

    /// The index of the region containing `pos`.
    pub fn region_index_at(&self, pos: i64) -> Option<usize> {
        self.regions.iter().position(|r| r.contains(pos))
    }

    /// The 0-based offset of the genomic position `pos` in the CDS read in genomic
    /// order, or `None` if `pos` is not coding.
    pub fn genomic_coding_offset(&self, pos: i64) -> Option<usize> {
        let mut offset = 0usize;
        for r in self.cds_regions() {
            if r.contains(pos) {
                return Some(offset + (pos - r.start) as usize);
            }
            offset += r.len() as usize;
        }
        None
    }

    /// The half-open range, in the CDS read in genomic order, of the coding bases inside
    /// `[start, end]`.
    pub fn genomic_coding_range(&self, start: i64, end: i64) -> Option<(usize, usize)> {
        let mut offset = 0usize;
        let mut range: Option<(usize, usize)> = None;
        for r in self.cds_regions() {
            if r.overlaps(start, end) {
                let s = offset + (start.max(r.start) - r.start) as usize;
                let e = offset + (end.min(r.end) - r.start) as usize + 1;
                range = Some(match range {
                    Some((rs, _)) => (rs, e),
                    None => (s, e),
                });
            }
            offset += r.len() as usize;
        }
        range
    }

    /// The number of coding bases that lie 5' of `pos` in transcript orientation.
    pub fn coding_bases_before(&self, pos: i64) -> usize {
        self.cds_regions()
            .map(|r| {
                if self.is_positive() {
                    (pos.min(r.end + 1) - r.start).clamp(0, r.len()) as usize
                } else {
                    (r.end - pos.max(r.start - 1)).clamp(0, r.len()) as usize
                }
            })
            .sum()
    }

    /// Converts a sequence read in genomic order into transcript orientation, and back.
    pub fn orient(&self, seq: &Sequence) -> Sequence {
        if self.is_positive() {
            seq.clone()
        } else {
            seq.reverse_complement()
        }
    }

    /// The coding sequence read in genomic order.
    pub fn genomic_coding(&self) -> Option<Sequence> {
        self.coding.as_ref().map(|c| self.orient(c))
    }

    /// Cuts the coding sequence out of the genomic sequence of `[exon_start, exon_end]`
    /// and returns it in transcript orientation.
    ///
    /// # Returns
    ///
    /// * `Ok(Sequence)`: the coding sequence.
    /// * `Err(AnnoError::SequenceUnavailable)`: if a CDS region falls outside of `genomic`.
    pub fn extract_coding(&self, genomic: &Sequence) -> AnnoResult<Sequence> {
        let mut coding = Sequence::default();
        for r in self.cds_regions() {
            let s = (r.start - self.exon_start) as usize;
            let e = (r.end - self.exon_start) as usize + 1;
            let piece = genomic
                .slice(s, e)
                .ok_or_else(|| AnnoError::SequenceUnavailable(self.key()))?;
            coding = coding.concat(&piece);
        }
        Ok(self.orient(&coding))
    }

    /// Attaches a coding sequence (in transcript orientation), translates it and settles
    /// the completeness: complete if the protein starts with `M` and its only stop is the
    /// last residue, incomplete otherwise, in which case the protein is dropped.
    /// Non-coding transcripts are returned unchanged.
    pub fn with_coding(self, coding: Sequence) -> Transcript {
        if self.completeness == Completeness::Unknown {
            return self;
        }
        let protein = coding.translate(self.is_mitochondrial());
        let complete = protein.get(0) == Some(b'M')
            && protein.find(b'*') == Some(protein.len() - 1);
        let (protein, completeness) = if complete {
            (Some(protein), Completeness::Complete)
        } else {
            (None, Completeness::Incomplete)
        };
        Transcript {
            coding: Some(coding),
            protein,
            completeness,
            ..self
        }
    }

    /// Marks the transcript as non-coding because no sequence is available for it.
    pub fn without_sequence(self) -> Transcript {
        Transcript {
            coding: None,
            protein: None,
            completeness: Completeness::Unknown,
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Counts of the outcomes of [TranscriptSet::enrich].
pub struct EnrichReport {
    pub complete: usize,
    pub incomplete: usize,
    pub non_coding: usize,
    pub unavailable: usize,
}

#[derive(Debug, Clone, Default)]
/// The transcript model, keyed by [Transcript::key].
pub struct TranscriptSet {
    transcripts: HashMap<String, Transcript>,
}

impl TranscriptSet {
    /// Builds every record into a [Transcript]. If two records share a key the last one
    /// wins.
    pub fn from_records(records: Vec<GeneModelRecord>, flank: i64) -> TranscriptSet {
        let start_time = std::time::Instant::now();
        let mut transcripts = HashMap::with_capacity(records.len());
        for rec in records {
            let t = Transcript::build(rec, flank);
            if let Some(old) = transcripts.insert(t.key(), t) {
                debug!("duplicated transcript {}; keeping the last record", old.key());
            }
        }
        debug!(
            "built {} transcripts in {:?}",
            transcripts.len(),
            start_time.elapsed()
        );
        TranscriptSet { transcripts }
    }

    pub fn len(&self) -> usize {
        self.transcripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Transcript> {
        self.transcripts.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transcript> {
        self.transcripts.values()
    }

    /// Groups the transcripts by chromosome.
    pub fn by_chrom(&self) -> HashMap<&str, Vec<&Transcript>> {
        let mut hm: HashMap<&str, Vec<&Transcript>> = HashMap::new();
        for t in self.transcripts.values() {
            hm.entry(t.chrom.as_str()).or_default().push(t);
        }
        hm
    }

    /// Fills in the Entrez gene id of every transcript from its gene symbol.
    pub fn with_entrez_ids(self, entrez: &EntrezIndex) -> TranscriptSet {
        let transcripts = self
            .transcripts
            .into_iter()
            .map(|(k, t)| {
                let entrez_id = entrez.lookup(&t.gene_symbol).unwrap_or_default().to_string();
                (k, Transcript { entrez_id, ..t })
            })
            .collect();
        TranscriptSet { transcripts }
    }

    /// Attaches coding and protein sequences from the sequence store and settles the
    /// completeness of every coding transcript. Transcripts without a usable store entry
    /// degrade to `Unknown`.
    pub fn enrich(self, store: &SequenceStore) -> (TranscriptSet, EnrichReport) {
        let start_time = std::time::Instant::now();
        let mut report = EnrichReport::default();
        let mut transcripts = HashMap::with_capacity(self.transcripts.len());

        for (key, t) in self.transcripts.into_iter() {
            let t = if t.completeness == Completeness::Unknown {
                t
            } else {
                let coding = store
                    .get(&key)
                    .ok_or_else(|| AnnoError::SequenceUnavailable(key.clone()))
                    .and_then(|genomic| t.extract_coding(genomic));
                match coding {
                    Ok(coding) => t.with_coding(coding),
                    Err(e) => {
                        debug!("{}", e);
                        report.unavailable += 1;
                        t.without_sequence()
                    }
                }
            };
            match t.completeness {
                Completeness::Complete => report.complete += 1,
                Completeness::Incomplete => report.incomplete += 1,
                Completeness::Unknown => report.non_coding += 1,
            }
            transcripts.insert(key, t);
        }

        if report.unavailable > 0 {
            warn!(
                "no usable sequence for {} coding transcripts; they are treated as non-coding",
                report.unavailable
            );
        }
        info!(
            "enriched transcripts: {} complete, {} incomplete, {} non-coding",
            report.complete, report.incomplete, report.non_coding
        );
        debug!("enrich transcripts in {:?}", start_time.elapsed());
        (TranscriptSet { transcripts }, report)
    }
}

impl FromIterator<Transcript> for TranscriptSet {
    fn from_iter<I: IntoIterator<Item = Transcript>>(iter: I) -> TranscriptSet {
        TranscriptSet {
            transcripts: iter.into_iter().map(|t| (t.key(), t)).collect(),
        }
    }
}
