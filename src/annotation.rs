use crate::consequence::call_consequence;
use crate::errors::AnnoResult;
use crate::genome_index::GenomeIndex;
use crate::options::{AnnoConfig, ChromTable};
use crate::reader::variant::{CnvRecord, SnvRecord};
use crate::transcript::{Completeness, RegionKind, Transcript, TranscriptSet};
use crate::variant::{sort_by_position, Cnv, GenomicSpan, OtherInfo, Variant};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
/// The consequence of a variant on one transcript.
///
/// Fields that do not apply are empty strings. An intergenic variant has a single
/// annotation whose only non-empty field is `region`.
pub struct Annotation {
    pub gene_symbol: String,
    #[serde(rename = "gene_entrez_id")]
    pub entrez_id: String,
    pub transcript: String,
    pub region: String,
    pub exon: String,
    pub na_change: String,
    pub aa_change: String,
    pub event: String,
}

impl Annotation {
    /// An empty annotation carrying the identity of `t`.
    pub fn for_transcript(t: &Transcript) -> Annotation {
        Annotation {
            gene_symbol: t.gene_symbol.clone(),
            entrez_id: t.entrez_id.clone(),
            transcript: t.transcript_id.clone(),
            ..Default::default()
        }
    }

    pub fn intergenic() -> Annotation {
        Annotation {
            region: String::from("intergenic"),
            ..Default::default()
        }
    }

    /// `true` if the variant hits an exon or a splice site.
    pub fn is_coding_or_splicing(&self) -> bool {
        self.region.contains("exon") || self.region.contains("splic")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// One output record: the variant, its annotations and the passthrough column of
/// its input line.
pub struct AnnotatedRecord<V> {
    pub variant: V,
    pub annotations: Vec<Annotation>,
    pub other_info: OtherInfo,
}

/// The per-variant annotations, grouped by the completeness of the transcripts they
/// come from.
#[derive(Debug, Default)]
struct Tiers {
    complete: Vec<Annotation>,
    incomplete: Vec<Annotation>,
    unknown: Vec<Annotation>,
}

impl Tiers {
    /// Picks the tier to report. Coding or splicing hits on complete transcripts win;
    /// otherwise the incomplete tier is preferred over the remaining (intronic or UTR)
    /// hits on complete transcripts, and non-coding transcripts come last.
    fn select<F: Fn(&Annotation) -> bool>(self, is_coding: F) -> Vec<Annotation> {
        if self.complete.iter().any(is_coding) {
            self.complete
        } else if !self.incomplete.is_empty() {
            self.incomplete
        } else if !self.complete.is_empty() {
            self.complete
        } else {
            self.unknown
        }
    }
}

/// One annotation per flank of `candidates` that intersects `[start, end]`.
fn flank_annotations(start: i64, end: i64, candidates: &[&Transcript]) -> Vec<Annotation> {
    let mut annos = Vec::new();
    for t in candidates {
        for r in t.flanks() {
            if !r.is_empty() && r.overlaps(start, end) {
                annos.push(Annotation {
                    region: r.kind.as_str().to_string(),
                    ..Annotation::for_transcript(t)
                });
            }
        }
    }
    annos
}

/// Places a copy-number change on a coding transcript: the range of CDS exons it
/// touches, and whether it touches coding exons, only UTRs, or neither.
pub fn score_cnv(cnv: &Cnv, t: &Transcript) -> Annotation {
    let mut anno = Annotation::for_transcript(t);
    let mut orders: Option<(u32, u32)> = None;
    let mut touches_utr = false;
    for r in t.regions.iter().filter(|r| r.overlaps(cnv.start, cnv.end)) {
        match r.kind {
            RegionKind::Cds => {
                orders = Some(match orders {
                    Some((lo, hi)) => (lo.min(r.exon_order), hi.max(r.exon_order)),
                    None => (r.exon_order, r.exon_order),
                });
            }
            RegionKind::Utr5 | RegionKind::Utr3 => touches_utr = true,
            _ => {}
        }
    }
    match orders {
        Some((lo, hi)) => {
            anno.region = String::from("exonic");
            anno.exon = if lo == hi {
                format!("exon{}", lo)
            } else {
                format!("exon{}-exon{}", lo, hi)
            };
        }
        None if touches_utr => anno.region = String::from("UTR"),
        None => anno.region = String::from("intronic"),
    }
    anno.event = cnv.kind.as_str().to_string();
    anno
}

/// The annotation engine: classifies variants against the transcripts the Genome Index
/// lists for them.
///
/// # Examples
///
/// ```ignore
/// let annotator = Annotator::new(&config, &transcripts, &index);
/// let records = annotator.annotate_snvs(read_snvs_from_path("calls.tsv")?.records)?;
/// ```
pub struct Annotator<'a> {
    table: ChromTable,
    splicing_len: i64,
    transcripts: &'a TranscriptSet,
    index: &'a GenomeIndex,
}

impl<'a> Annotator<'a> {
    pub fn new(
        config: &AnnoConfig,
        transcripts: &'a TranscriptSet,
        index: &'a GenomeIndex,
    ) -> Annotator<'a> {
        Annotator {
            table: config.chrom_table(),
            splicing_len: config.param.splicing_len,
            transcripts,
            index,
        }
    }

    /// Annotates a small variant against its candidate transcripts.
    ///
    /// Transcripts whose exon span intersects the variant are classified with
    /// [call_consequence] (non-coding ones as `ncRNA`) and tiered. Without any such
    /// transcript the variant is reported in the flanks it hits, and as `intergenic`
    /// if there are none.
    pub fn annotate_variant(&self, v: &Variant, candidates: &[&Transcript]) -> Vec<Annotation> {
        let mut tiers = Tiers::default();
        for t in candidates.iter().filter(|t| t.overlaps(v.start, v.end)) {
            match t.completeness {
                Completeness::Complete => {
                    tiers.complete.push(call_consequence(v, t, self.splicing_len));
                }
                Completeness::Incomplete => {
                    let mut anno = call_consequence(v, t, self.splicing_len);
                    if anno.event.is_empty() {
                        anno.event = String::from("incmplCDS");
                    }
                    tiers.incomplete.push(anno);
                }
                Completeness::Unknown => tiers.unknown.push(Annotation {
                    region: String::from("ncRNA"),
                    ..Annotation::for_transcript(t)
                }),
            }
        }
        self.finish(tiers, v.start, v.end, candidates, Annotation::is_coding_or_splicing)
    }

    /// Annotates a copy-number change against its candidate transcripts, with the same
    /// tiering and fallbacks as [Annotator::annotate_variant]. Hits on incomplete
    /// transcripts carry the event `incmplCDS`.
    pub fn annotate_cnv(&self, cnv: &Cnv, candidates: &[&Transcript]) -> Vec<Annotation> {
        let mut tiers = Tiers::default();
        for t in candidates.iter().filter(|t| t.overlaps(cnv.start, cnv.end)) {
            match t.completeness {
                Completeness::Complete => tiers.complete.push(score_cnv(cnv, t)),
                Completeness::Incomplete => tiers.incomplete.push(Annotation {
                    event: String::from("incmplCDS"),
                    ..score_cnv(cnv, t)
                }),
                Completeness::Unknown => tiers.unknown.push(Annotation {
                    region: String::from("ncRNA"),
                    ..Annotation::for_transcript(t)
                }),
            }
        }
        self.finish(tiers, cnv.start, cnv.end, candidates, |a| a.region == "exonic")
    }

    fn finish<F: Fn(&Annotation) -> bool>(
        &self,
        tiers: Tiers,
        start: i64,
        end: i64,
        candidates: &[&Transcript],
        is_coding: F,
    ) -> Vec<Annotation> {
        let annos = tiers.select(is_coding);
        if !annos.is_empty() {
            return annos;
        }
        let annos = flank_annotations(start, end, candidates);
        if !annos.is_empty() {
            return annos;
        }
        vec![Annotation::intergenic()]
    }

    /// Annotates small-variant records. The output is sorted by position.
    pub fn annotate_snvs(&self, records: Vec<SnvRecord>) -> AnnoResult<Vec<AnnotatedRecord<Variant>>> {
        self.annotate_all(records, |rec, ts| AnnotatedRecord {
            annotations: self.annotate_variant(&rec.variant, ts),
            variant: rec.variant,
            other_info: rec.other_info,
        })
    }

    /// Annotates copy-number records. The output is sorted by position.
    pub fn annotate_cnvs(&self, records: Vec<CnvRecord>) -> AnnoResult<Vec<AnnotatedRecord<Cnv>>> {
        self.annotate_all(records, |rec, ts| AnnotatedRecord {
            annotations: self.annotate_cnv(&rec.cnv, ts),
            variant: rec.cnv,
            other_info: rec.other_info,
        })
    }

    /// Sorts the records, walks them against the Genome Index and hands each one with its
    /// candidate transcripts to `annotate`.
    ///
    /// Fails with [crate::errors::AnnoError::UnknownChromosome] if a record lies on a chromosome outside the
    /// chromosome table.
    fn annotate_all<R, O, F>(&self, mut records: Vec<R>, mut annotate: F) -> AnnoResult<Vec<O>>
    where
        R: GenomicSpan,
        F: FnMut(R, &[&Transcript]) -> O,
    {
        let start_time = std::time::Instant::now();
        sort_by_position(&mut records, &self.table)?;
        let candidates = self.index.candidates(&records, &self.table)?;

        let mut out = Vec::with_capacity(records.len());
        let mut missing = 0usize;
        let mut chrom = String::new();
        for (rec, keys) in records.into_iter().zip(candidates) {
            if rec.chrom() != chrom {
                chrom = rec.chrom().to_string();
                info!("annotate chr{}", chrom);
            }
            let ts: Vec<&Transcript> = keys
                .iter()
                .filter_map(|k| {
                    let t = self.transcripts.get(k);
                    if t.is_none() {
                        missing += 1;
                    }
                    t
                })
                .collect();
            out.push(annotate(rec, &ts));
        }
        if missing > 0 {
            warn!(
                "{} Genome Index entries name transcripts missing from the gene model",
                missing
            );
        }
        debug!("annotated {} records in {:?}", out.len(), start_time.elapsed());
        Ok(out)
    }
}
