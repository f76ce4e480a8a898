//! Placement and nomenclature of a small variant on one transcript.
//!
//! Positions in the coding sequence are handled in genomic order, where an edit is a
//! plain splice of the CDS read left to right, and are converted to transcript
//! orientation (reverse complement on the negative strand) before translation and
//! naming. `c.` positions are 1-based from the first coding base; `p.` positions are
//! 1-based residue numbers.

use crate::annotation::Annotation;
use crate::sequence::Sequence;
use crate::transcript::{Completeness, Region, RegionKind, Transcript};
use crate::variant::{MutationKind, Variant};

/// Where a variant falls on a transcript.
struct Placement {
    /// indices of the regions touched by the variant, in genomic order
    touched: Vec<usize>,
    has_cds: bool,
    has_intron: bool,
}

/// The genomic span a variant is placed by. An insertion sits between `start` and
/// `start + 1` and is placed by the one of the two on its transcript-5' side.
fn placed_span(v: &Variant, t: &Transcript) -> (i64, i64) {
    match v.kind() {
        MutationKind::Ins if t.is_positive() => (v.start, v.start),
        MutationKind::Ins => (v.start + 1, v.start + 1),
        _ => (v.start, v.end),
    }
}

impl Placement {
    fn of(t: &Transcript, v: &Variant) -> Placement {
        let (s, e) = placed_span(v, t);
        let touched: Vec<usize> = t
            .regions
            .iter()
            .enumerate()
            .filter(|(_, r)| r.overlaps(s, e))
            .map(|(i, _)| i)
            .collect();
        let has_cds = touched.iter().any(|i| t.regions[*i].kind == RegionKind::Cds);
        let has_intron = touched
            .iter()
            .any(|i| t.regions[*i].kind == RegionKind::Intron);
        Placement {
            touched,
            has_cds,
            has_intron,
        }
    }

    fn regions<'a>(&'a self, t: &'a Transcript) -> impl Iterator<Item = &'a Region> + 'a {
        self.touched.iter().map(move |i| &t.regions[*i])
    }
}

/// `exonN`, or `exonN-exonM` when several exons are hit.
fn exon_label<'a>(regions: impl Iterator<Item = &'a Region>) -> String {
    let orders: Vec<u32> = regions
        .filter(|r| r.kind.is_exonic())
        .map(|r| r.exon_order)
        .collect();
    match (orders.iter().min(), orders.iter().max()) {
        (Some(a), Some(b)) if a == b => format!("exon{}", a),
        (Some(a), Some(b)) => format!("exon{}-exon{}", a, b),
        _ => String::new(),
    }
}

/// Describes the consequence of `v` on `t`.
///
/// `t` must overlap `v`. Non-coding transcripts get no placement; the annotation engine
/// reports them as `ncRNA`. On a coding transcript the variant is placed in an intron
/// (`splicing` within `splicing_len` bases of an exon, `intronic` otherwise), a UTR, or the
/// CDS (`exonic`, or `exonic_splicing` when it also reaches into an intron). Only complete
/// transcripts get `c.`/`p.` nomenclature and an event class for exonic variants.
///
/// # Arguments
///
/// * `v`: a normalized variant.
/// * `t`: an enriched transcript overlapping `v`.
/// * `splicing_len`: the maximal distance from an exon boundary of a splicing variant.
pub fn call_consequence(v: &Variant, t: &Transcript, splicing_len: i64) -> Annotation {
    let mut anno = Annotation::for_transcript(t);
    if t.completeness == Completeness::Unknown {
        return anno;
    }
    let placement = Placement::of(t, v);
    if placement.touched.is_empty() {
        return anno;
    }

    if placement.has_cds {
        anno.region = if placement.has_intron {
            String::from("exonic_splicing")
        } else {
            String::from("exonic")
        };
        anno.exon = exon_label(placement.regions(t));
        if t.completeness == Completeness::Complete {
            describe_coding(v, t, &placement, &mut anno);
        }
    } else if !placement.has_intron || placement.touched.len() > 1 {
        // UTR, possibly reaching into the adjacent intron
        let utr = placement
            .regions(t)
            .find(|r| r.kind.is_utr())
            .map(|r| r.kind.as_str())
            .unwrap_or_default();
        anno.region = if placement.has_intron {
            format!("{}_exon_splicing", utr)
        } else {
            utr.to_string()
        };
        anno.exon = exon_label(placement.regions(t));
    } else {
        describe_intronic(v, t, placement.touched[0], splicing_len, &mut anno);
    }
    anno
}

/// Names the position `g` of intron `r` relative to the nearest coding exon boundary:
/// `N+d` after the last base `N` of the exon 5' of the intron, or `M-d` before the first
/// base `M` of the exon 3' of it.
fn intronic_position(t: &Transcript, r: &Region, g: i64) -> String {
    let (dl, dr) = (g - r.start + 1, r.end - g + 1);
    if t.is_positive() {
        let n = t.coding_bases_before(r.start);
        if dl <= dr {
            format!("{}+{}", n, dl)
        } else {
            format!("{}-{}", n + 1, dr)
        }
    } else {
        let n = t.coding_bases_before(r.end);
        if dr <= dl {
            format!("{}+{}", n, dr)
        } else {
            format!("{}-{}", n + 1, dl)
        }
    }
}

fn describe_intronic(v: &Variant, t: &Transcript, idx: usize, splicing_len: i64, anno: &mut Annotation) {
    let r = &t.regions[idx];
    let (ps, pe) = placed_span(v, t);
    let (s, e) = (ps.max(r.start), pe.min(r.end));
    let (dl, dr) = (s - r.start + 1, r.end - e + 1);
    anno.region = if dl.min(dr) <= splicing_len {
        String::from("splicing")
    } else {
        String::from("intronic")
    };
    let neighbour = if dl <= dr {
        idx.checked_sub(1).and_then(|i| t.regions.get(i))
    } else {
        t.regions.get(idx + 1)
    };
    if let Some(n) = neighbour {
        anno.exon = format!("exon{}", n.exon_order);
    }

    // c. positions are only defined for introns between coding bases
    if t.completeness != Completeness::Complete || r.start <= t.cds_start || r.end >= t.cds_end {
        return;
    }
    let ordered = |a: i64, b: i64| {
        if t.is_positive() {
            (a, b)
        } else {
            (b, a)
        }
    };
    let alt = t.orient(&v.alt_seq());
    anno.na_change = match v.kind() {
        MutationKind::Snv => format!(
            "c.{}{}>{}",
            intronic_position(t, r, s),
            t.orient(&v.ref_seq()),
            alt
        ),
        MutationKind::Ins if r.start <= v.start && v.start < r.end => {
            let (a, b) = ordered(v.start, v.start + 1);
            format!(
                "c.{}_{}ins{}",
                intronic_position(t, r, a),
                intronic_position(t, r, b),
                alt
            )
        }
        MutationKind::Ins => String::new(),
        MutationKind::Del if s == e => format!("c.{}del", intronic_position(t, r, s)),
        MutationKind::Del | MutationKind::Delins => {
            let (a, b) = ordered(s, e);
            let op = if v.kind() == MutationKind::Del {
                String::from("del")
            } else {
                format!("delins{}", alt)
            };
            format!(
                "c.{}_{}{}",
                intronic_position(t, r, a),
                intronic_position(t, r, b),
                op
            )
        }
    };
}

/// Builds the post-variant coding sequence, in genomic order, of a variant touching
/// the CDS. `None` if the edit cannot be expressed on the CDS alone.
fn edit_coding(v: &Variant, t: &Transcript, placement: &Placement, genomic: &Sequence) -> Option<Sequence> {
    match v.kind() {
        MutationKind::Snv => {
            let o = t.genomic_coding_offset(v.start)?;
            Some(genomic.replace(o, o + 1, &v.alt_seq()))
        }
        MutationKind::Ins => {
            let (anchor, _) = placed_span(v, t);
            let o = t.genomic_coding_offset(anchor)?;
            // the inserted bases follow the anchor in transcript orientation
            let at = if t.is_positive() { o + 1 } else { o };
            Some(genomic.insert(at, &v.alt_seq()))
        }
        MutationKind::Del => {
            let (a, b) = t.genomic_coding_range(v.start, v.end)?;
            Some(genomic.delete(a, b))
        }
        MutationKind::Delins => {
            if placement.touched.len() != 1 {
                return None;
            }
            let (a, b) = t.genomic_coding_range(v.start, v.end)?;
            Some(genomic.replace(a, b, &v.alt_seq()))
        }
    }
}

fn describe_coding(v: &Variant, t: &Transcript, placement: &Placement, anno: &mut Annotation) {
    let (Some(coding), Some(protein), Some(genomic)) = (&t.coding, &t.protein, t.genomic_coding())
    else {
        return;
    };
    let Some(new_genomic) = edit_coding(v, t, placement, &genomic) else {
        return;
    };
    let new_coding = t.orient(&new_genomic);
    let new_protein = new_coding.translate(t.is_mitochondrial());

    match v.kind() {
        MutationKind::Snv => describe_snv(coding, &new_coding, protein, &new_protein, anno),
        MutationKind::Ins => {
            if let Some(i) = coding.first_difference(&new_coding) {
                let inserted = new_coding.sub_seq(i, new_coding.len() - coding.len());
                anno.na_change = format!("c.{}_{}ins{}", i, i + 1, inserted);
            }
            describe_indel("ins", coding, &new_coding, protein, &new_protein, anno);
        }
        MutationKind::Del => {
            if let Some(i) = coding.first_difference(&new_coding) {
                let n = coding.len() - new_coding.len();
                let removed = coding.sub_seq(i, n);
                anno.na_change = if n == 1 {
                    format!("c.{}del{}", i + 1, removed)
                } else {
                    format!("c.{}_{}del{}", i + 1, i + n, removed)
                };
            }
            describe_indel("del", coding, &new_coding, protein, &new_protein, anno);
        }
        MutationKind::Delins => {
            if let Some((a, b)) = t.genomic_coding_range(v.start, v.end) {
                let (s, e) = if t.is_positive() {
                    (a + 1, b)
                } else {
                    (coding.len() - b + 1, coding.len() - a)
                };
                let alt = t.orient(&v.alt_seq());
                anno.na_change = if s == e {
                    format!("c.{}delins{}", s, alt)
                } else {
                    format!("c.{}_{}delins{}", s, e, alt)
                };
            }
            describe_indel("delins", coding, &new_coding, protein, &new_protein, anno);
        }
    }
}

fn describe_snv(
    coding: &Sequence,
    new_coding: &Sequence,
    protein: &Sequence,
    new_protein: &Sequence,
    anno: &mut Annotation,
) {
    let Some(i) = coding.first_difference(new_coding) else {
        anno.event = String::from("synonymous_snv");
        return;
    };
    let (na1, na2) = (coding.sub_seq(i, 1), new_coding.sub_seq(i, 1));
    anno.na_change = format!("c.{}{}>{}", i + 1, na1, na2);

    let j = i / 3;
    let (Some(aa1), Some(aa2)) = (protein.get(j), new_protein.get(j)) else {
        return;
    };
    anno.event = String::from(if aa1 == aa2 {
        "synonymous_snv"
    } else if j == 0 && aa1 == b'M' {
        "startloss"
    } else if aa1 == b'*' {
        "stoploss"
    } else if aa2 == b'*' {
        "stopgain"
    } else {
        "nonsynonymous_snv"
    });
    anno.aa_change = format!(
        "p.{}{}{}",
        protein.three_letter(j, j + 1),
        j + 1,
        new_protein.three_letter(j, j + 1)
    );
}

/// `Aaa<n>` or `Aaa<n>_Bbb<m>` for the residues `[start, end)`.
fn residue_range(protein: &Sequence, start: usize, end: usize) -> String {
    if end - start <= 1 {
        format!("{}{}", protein.three_letter(start, start + 1), start + 1)
    } else {
        format!(
            "{}{}_{}{}",
            protein.three_letter(start, start + 1),
            start + 1,
            protein.three_letter(end - 1, end),
            end
        )
    }
}

/// Classifies an insertion, deletion or substitution from the old and new protein and
/// names the protein change.
///
/// The protein is compared from both ends: `L` leading residues and `R` trailing residues
/// are shared, with `R` capped so that neither window has a negative length. In-frame
/// changes name the residue window `[L, old_len - R)`; frameshifts name the first changed
/// residue. The event is `<op>_nonframeshift` or `<op>_frameshift`, refined with
/// `_stoploss` (no stop left), `_stopgain` (a stop before the end of the shorter protein)
/// or `_startloss` (the first residue changed), checked in that order.
fn describe_indel(
    op: &str,
    coding: &Sequence,
    new_coding: &Sequence,
    protein: &Sequence,
    new_protein: &Sequence,
    anno: &mut Annotation,
) {
    let in_frame = coding.len().abs_diff(new_coding.len()) % 3 == 0;
    let frame = if in_frame { "nonframeshift" } else { "frameshift" };

    let old_len = protein.len();
    let new_len = new_protein.len();
    let l = protein.common_prefix_len(new_protein);
    if l >= old_len {
        anno.event = format!("{}_{}", op, frame);
        return;
    }
    let r = protein
        .common_suffix_len(new_protein)
        .min(old_len - l)
        .min(new_len.saturating_sub(l));

    // a stop before the last residue of the shorter protein is premature
    let suffix = match new_protein.find(b'*') {
        None => "_stoploss",
        Some(k) if k + 1 < old_len.min(new_len) => "_stopgain",
        _ if protein.get(0) != new_protein.get(0) => "_startloss",
        _ => "",
    };
    anno.event = format!("{}_{}{}", op, frame, suffix);

    if !in_frame {
        anno.aa_change = format!(
            "p.{}{}{}fs",
            protein.three_letter(l, l + 1),
            l + 1,
            new_protein.three_letter(l, l + 1)
        );
        return;
    }

    let (start, mut end, mut var_end) = (l, old_len - r, new_len - r);
    if start == end && start == 0 {
        // residues inserted in front of the first one: name it as replaced
        end += 1;
        var_end += 1;
    }
    let alt = new_protein.three_letter(start, var_end);
    anno.aa_change = if start == end {
        format!(
            "p.{}{}_{}{}ins{}",
            protein.three_letter(start - 1, start),
            start,
            protein.three_letter(start, start + 1),
            start + 1,
            alt
        )
    } else if var_end <= start {
        format!("p.{}del", residue_range(protein, start, end))
    } else {
        format!("p.{}delins{}", residue_range(protein, start, end), alt)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{GeneModelRecord, Strand};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    // exon1 [1,12], exon2 [23,40]; CDS [4,34]
    // coding: ATG GCC AAA | GGG CTG TAC TAA -> M A K G L Y *
    const GENOMIC: &str = "CCCATGGCCAAAGTAAGTCCAGGGGCTGTACTAAGGGGGG";

    fn transcript(strand: Strand) -> Transcript {
        transcript_on("1", strand)
    }

    fn transcript_on(chrom: &str, strand: Strand) -> Transcript {
        let positive = strand.is_positive();
        let mirror = |p: i64| if positive { p } else { 41 - p };
        let (cs, ce) = (mirror(4).min(mirror(34)), mirror(4).max(mirror(34)));
        let rec = GeneModelRecord {
            transcript_id: String::from("NM_test"),
            chrom: chrom.to_string(),
            strand,
            tx_start: 1,
            tx_end: 40,
            cds_start: cs,
            cds_end: ce,
            exons: if positive {
                vec![(1, 12), (23, 40)]
            } else {
                vec![(1, 18), (29, 40)]
            },
            gene_symbol: String::from("TEST"),
            tag: Completeness::Complete,
        };
        let t = Transcript::build(rec, 100);
        let genomic = if positive {
            Sequence::from(GENOMIC)
        } else {
            Sequence::from(GENOMIC).reverse_complement()
        };
        let coding = t.extract_coding(&genomic).unwrap();
        let t = t.with_coding(coding);
        assert_eq!(t.protein.as_ref().unwrap().to_string(), "MAKGLY*");
        t
    }

    fn call(t: &Transcript, pos: i64, r: &str, a: &str) -> Annotation {
        call_consequence(&Variant::normalize("1", pos, r, a), t, 2)
    }

    #[test]
    fn test_snv() {
        let t = transcript(Strand::Positive);
        // GCC -> GAC: Ala2Asp
        let a = call(&t, 8, "C", "A");
        assert_eq!(a.region, "exonic");
        assert_eq!(a.exon, "exon1");
        assert_eq!(a.na_change, "c.5C>A");
        assert_eq!(a.aa_change, "p.Ala2Asp");
        assert_eq!(a.event, "nonsynonymous_snv");

        // GCC -> GCT
        assert_eq!(call(&t, 9, "C", "T").event, "synonymous_snv");
        // ATG -> ATA
        assert_eq!(call(&t, 6, "G", "A").event, "startloss");
        // TAC -> TAA at c.18
        let a = call(&t, 31, "C", "A");
        assert_eq!(a.exon, "exon2");
        assert_eq!(a.na_change, "c.18C>A");
        assert_eq!(a.event, "stopgain");
        // TAA -> TTA
        assert_eq!(call(&t, 33, "A", "T").event, "stoploss");
    }

    #[test]
    fn test_snv_negative_strand() {
        let t = transcript(Strand::Negative);
        // c.5C>A lies at mirrored position 41 - 8 = 33, complemented base G>T
        let a = call(&t, 33, "G", "T");
        assert_eq!(a.na_change, "c.5C>A");
        assert_eq!(a.aa_change, "p.Ala2Asp");
        assert_eq!(a.exon, "exon1");
    }

    /// The same change on the mirrored genome of the negative-strand fixture.
    fn mirrored(v: &Variant) -> Variant {
        let rc = |s: &str| {
            if s == "-" {
                s.to_string()
            } else {
                Sequence::from(s).reverse_complement().to_string()
            }
        };
        let start = match v.kind() {
            MutationKind::Ins => 40 - v.start,
            _ => 41 - v.end,
        };
        Variant::normalize(&v.chrom, start, &rc(&v.reference), &rc(&v.alt))
    }

    #[rstest]
    #[case::inframe_ins(9, "C", "CTTT", "c.6_7insTTT", "p.Ala2_Lys3insPhe", "ins_nonframeshift")]
    #[case::inframe_ins_stopgain(9, "C", "CTAA", "c.6_7insTAA", "p.Ala2_Lys3insTer", "ins_nonframeshift_stopgain")]
    #[case::inframe_ins_startloss(4, "A", "ACCC", "c.1_2insCCC", "p.Met1delinsThrLeu", "ins_nonframeshift_startloss")]
    #[case::frameshift_ins(9, "C", "CG", "c.6_7insG", "p.Lys3Glufs", "ins_frameshift_stoploss")]
    #[case::frameshift_ins_stopgain(6, "G", "GTA", "c.3_4insTA", "p.Ala2Terfs", "ins_frameshift_stopgain")]
    #[case::inframe_del(9, "CAAA", "C", "c.7_9delAAA", "p.Lys3del", "del_nonframeshift")]
    #[case::inframe_del_startloss(3, "CATG", "C", "c.1_3delATG", "p.Met1del", "del_nonframeshift_startloss")]
    // one base of the AAA run is named at its 3' end
    #[case::frameshift_del(10, "AA", "A", "c.9delA", "p.Leu5Cysfs", "del_frameshift_stoploss")]
    #[case::delins(10, "AAA", "TGG", "c.7_9delinsTGG", "p.Lys3delinsTrp", "delins_nonframeshift")]
    fn test_indel_on_both_strands(
        #[case] pos: i64,
        #[case] r: &str,
        #[case] a: &str,
        #[case] na: &str,
        #[case] aa: &str,
        #[case] event: &str,
    ) {
        let v = Variant::normalize("1", pos, r, a);
        let pairs = [
            (transcript(Strand::Positive), v.clone()),
            (transcript(Strand::Negative), mirrored(&v)),
        ];
        for (t, v) in pairs.iter() {
            let anno = call_consequence(v, t, 2);
            assert_eq!(anno.region, "exonic", "{} strand", t.strand);
            assert_eq!(
                (anno.na_change.as_str(), anno.aa_change.as_str(), anno.event.as_str()),
                (na, aa, event),
                "{} strand",
                t.strand
            );
        }
    }

    // insertions on region boundaries are placed by the base on their transcript-5' side
    #[rstest]
    #[case::utr5_cds_boundary(3, "GGG", "UTR5")]
    #[case::first_coding_base(4, "CCC", "exonic")]
    #[case::exon_intron_boundary(12, "GGG", "exonic")]
    #[case::intron_exon_boundary(22, "GGG", "splicing")]
    #[case::cds_utr3_boundary(34, "GGG", "exonic")]
    #[case::cds_utr3_frameshift(34, "G", "exonic")]
    fn test_insertion_placement_is_strand_symmetric(
        #[case] after: i64,
        #[case] bases: &str,
        #[case] region: &str,
    ) {
        let v = Variant::normalize("1", after, "-", bases);
        let plus = call_consequence(&v, &transcript(Strand::Positive), 2);
        let minus = call_consequence(&mirrored(&v), &transcript(Strand::Negative), 2);
        assert_eq!(plus.region, region);
        assert_eq!(plus, minus);
    }

    #[test]
    fn test_utr5_insertion_has_no_coding_change() {
        // between the last 5' UTR base and c.1; on the negative strand genomically after c.1
        let v = Variant::normalize("1", 37, "-", "CCC");
        let a = call_consequence(&v, &transcript(Strand::Negative), 2);
        assert_eq!(a.region, "UTR5");
        assert!(a.na_change.is_empty());
        assert!(a.event.is_empty());
    }

    #[rstest]
    // GGG -> AGG is a stop codon in the mitochondrial code
    #[case::arg("1", 23, "G", "A", "p.Gly4Arg", "nonsynonymous_snv")]
    #[case::mt_stop("MT", 23, "G", "A", "p.Gly4Ter", "stopgain")]
    // ATG -> ATA still codes for Met on MT
    #[case::ile("1", 6, "G", "A", "p.Met1Ile", "startloss")]
    #[case::mt_met("MT", 6, "G", "A", "p.Met1Met", "synonymous_snv")]
    fn test_mitochondrial_code(
        #[case] chrom: &str,
        #[case] pos: i64,
        #[case] r: &str,
        #[case] a: &str,
        #[case] aa: &str,
        #[case] event: &str,
    ) {
        let t = transcript_on(chrom, Strand::Positive);
        let anno = call_consequence(&Variant::normalize(chrom, pos, r, a), &t, 2);
        assert_eq!(anno.aa_change, aa);
        assert_eq!(anno.event, event);
    }

    #[test]
    fn test_intronic_and_utr() {
        let t = transcript(Strand::Positive);
        // intron [13,22]; the last coding base before it is c.9
        let a = call(&t, 14, "T", "C");
        assert_eq!(a.region, "splicing");
        assert_eq!(a.exon, "exon1");
        assert_eq!(a.na_change, "c.9+2T>C");

        let a = call(&t, 18, "T", "C");
        assert_eq!(a.region, "intronic");
        assert_eq!(a.exon, "exon2");
        assert_eq!(a.na_change, "c.10-5T>C");

        let a = call(&t, 2, "C", "T");
        assert_eq!(a.region, "UTR5");
        assert_eq!(a.exon, "exon1");
        assert!(a.na_change.is_empty());

        let a = call(&t, 36, "G", "T");
        assert_eq!(a.region, "UTR3");

        // a deletion from the CDS into the intron
        let a = call(&t, 10, "AAAGT", "A");
        assert_eq!(a.region, "exonic_splicing");
    }

    #[test]
    fn test_incomplete_transcript() {
        let t = transcript(Strand::Positive).with_coding(Sequence::from("ATGTAAGCC"));
        let a = call(&t, 8, "C", "A");
        assert_eq!(a.region, "exonic");
        assert_eq!(a.exon, "exon1");
        assert!(a.aa_change.is_empty());
        assert!(a.event.is_empty());
    }
}
