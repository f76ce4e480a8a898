use crate::errors::AnnoResult;
use crate::options::ChromTable;
use crate::sequence::Sequence;
use serde::Serialize;
use std::collections::BTreeMap;

/// The placeholder for an empty allele in a normalized variant.
pub const EMPTY_ALLELE: &str = "-";

/// The passthrough `key=value` annotations of an input record.
pub type OtherInfo = BTreeMap<String, String>;

/// Parses a passthrough column of comma-separated `key=value` pairs. Pairs
/// without a `=` are dropped; a repeated key keeps its last value.
pub fn parse_other_info(text: &str) -> OtherInfo {
    text.split(',')
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn is_empty_allele(allele: &str) -> bool {
    matches!(allele.trim(), "" | "-" | ".")
}

/// Maps the mitochondrial alias `M` to its canonical name `MT`.
pub fn canonical_chrom(chrom: &str) -> String {
    if chrom == "M" {
        String::from("MT")
    } else {
        chrom.to_string()
    }
}

/// Anything that occupies a closed interval `[start, end]` on a chromosome and can
/// therefore be placed in the global digital position space of a [ChromTable].
pub trait GenomicSpan {
    fn chrom(&self) -> &str;
    fn start(&self) -> i64;
    fn end(&self) -> i64;

    /// The secondary ordering key used to break ties between records that share a span.
    fn alleles(&self) -> (&str, &str) {
        ("", "")
    }

    fn digital_start(&self, table: &ChromTable) -> AnnoResult<i64> {
        table.digital_position(self.chrom(), self.start())
    }

    fn digital_end(&self, table: &ChromTable) -> AnnoResult<i64> {
        table.digital_position(self.chrom(), self.end())
    }

    fn overlaps(&self, start: i64, end: i64) -> bool {
        self.start() <= end && start <= self.end()
    }
}

/// Sorts records by (chromosome rank, start, end, alleles). The chromosome rank comes from
/// the configured table rather than from the lexical order of the names.
///
/// # Returns
///
/// * `Ok(())`: if every record is on a configured chromosome.
/// * `Err(AnnoError::UnknownChromosome)`: otherwise; `items` is left untouched.
pub fn sort_by_position<T: GenomicSpan>(items: &mut [T], table: &ChromTable) -> AnnoResult<()> {
    for it in items.iter() {
        table.rank(it.chrom())?;
    }
    items.sort_by(|a, b| {
        let ka = (table.rank(a.chrom()).ok(), a.start(), a.end(), a.alleles());
        let kb = (table.rank(b.chrom()).ok(), b.start(), b.end(), b.alleles());
        ka.cmp(&kb)
    });
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The closed set of small-variant shapes, derived from a normalized [Variant].
pub enum MutationKind {
    /// one base replaced by one base
    Snv,
    /// bases inserted after `start`
    Ins,
    /// `ref` removed
    Del,
    /// several bases replaced by several bases
    Delins,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
/// A small variant in canonical minimal form.
///
/// Coordinates are 1-based and inclusive. A pure insertion has `reference == "-"` and
/// `start == end`, the inserted bases following position `start`. A pure deletion has
/// `alt == "-"`.
pub struct Variant {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    #[serde(rename = "ref")]
    pub reference: String,
    pub alt: String,
}

impl Variant {
    /// Reduces a raw `(chrom, pos, ref, alt)` call to its canonical minimal form.
    ///
    /// `-`, `.` and the empty string are accepted as empty alleles. Identical alleles and
    /// calls with an empty allele are left untrimmed. Otherwise, in order:
    ///
    /// 1. if `ref` starts (or ends) with `alt`, the matched `alt` is removed from `ref` and a
    ///    prefix match moves the position forward by `len(alt)`;
    /// 2. else if `alt` starts (or ends) with `ref`, the matched `ref` is removed from `alt` and
    ///    the position moves by `len(ref) - 1` for a prefix match or by `len(ref) - len(alt)` for
    ///    a suffix match;
    /// 3. else the common suffix and then the common prefix are trimmed, and the position moves
    ///    forward by the prefix length (one less if the prefix trim empties `ref`).
    ///
    /// The end is `start` for insertions and `start + len(ref) - 1` otherwise, and a `M`
    /// chromosome becomes `MT`.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let v = Variant::normalize("1", 100, "AT", "A");
    /// assert_eq!((v.start, v.end, v.reference.as_str(), v.alt.as_str()), (101, 101, "T", "-"));
    /// ```
    pub fn normalize(chrom: &str, pos: i64, reference: &str, alt: &str) -> Variant {
        let mut start = pos;
        let mut r = if is_empty_allele(reference) {
            Sequence::default()
        } else {
            Sequence::from(reference.trim())
        };
        let mut a = if is_empty_allele(alt) {
            Sequence::default()
        } else {
            Sequence::from(alt.trim())
        };

        if r != a && !r.is_empty() && !a.is_empty() {
            let (rl, al) = (r.len(), a.len());
            if r.starts_with(&a) {
                start += al as i64;
                r = r.delete(0, al);
                a = Sequence::default();
            } else if r.ends_with(&a) {
                r = r.delete(rl - al, rl);
                a = Sequence::default();
            } else if a.starts_with(&r) {
                start += rl as i64 - 1;
                a = a.delete(0, rl);
                r = Sequence::default();
            } else if a.ends_with(&r) {
                start += rl as i64 - al as i64;
                a = a.delete(al - rl, al);
                r = Sequence::default();
            } else {
                let suffix = r.common_suffix_len(&a);
                r = r.delete(rl - suffix, rl);
                a = a.delete(al - suffix, al);
                let prefix = r.common_prefix_len(&a);
                r = r.delete(0, prefix);
                a = a.delete(0, prefix);
                if prefix > 0 && r.is_empty() {
                    start += prefix as i64 - 1;
                } else {
                    start += prefix as i64;
                }
            }
        }

        let end = if r.is_empty() {
            start
        } else {
            start + r.len() as i64 - 1
        };
        let allele = |s: Sequence| {
            if s.is_empty() {
                EMPTY_ALLELE.to_string()
            } else {
                s.to_string()
            }
        };
        Variant {
            chrom: canonical_chrom(chrom),
            start,
            end,
            reference: allele(r),
            alt: allele(a),
        }
    }

    pub fn kind(&self) -> MutationKind {
        if self.reference == EMPTY_ALLELE {
            MutationKind::Ins
        } else if self.alt == EMPTY_ALLELE {
            MutationKind::Del
        } else if self.reference.len() == 1 && self.alt.len() == 1 {
            MutationKind::Snv
        } else {
            MutationKind::Delins
        }
    }

    /// The reference allele as a sequence, empty for insertions.
    pub fn ref_seq(&self) -> Sequence {
        if self.reference == EMPTY_ALLELE {
            Sequence::default()
        } else {
            Sequence::from(self.reference.as_str())
        }
    }

    /// The alternative allele as a sequence, empty for deletions.
    pub fn alt_seq(&self) -> Sequence {
        if self.alt == EMPTY_ALLELE {
            Sequence::default()
        } else {
            Sequence::from(self.alt.as_str())
        }
    }
}

impl GenomicSpan for Variant {
    fn chrom(&self) -> &str {
        &self.chrom
    }
    fn start(&self) -> i64 {
        self.start
    }
    fn end(&self) -> i64 {
        self.end
    }
    fn alleles(&self) -> (&str, &str) {
        (&self.reference, &self.alt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
/// The direction of a copy-number change.
pub enum CnvKind {
    Dup,
    Del,
    Dip,
}

impl CnvKind {
    /// `> 1` copies is a duplication, `< 1` a deletion and exactly one copy is diploid-neutral.
    pub fn from_copy_number(copy_number: u32) -> CnvKind {
        match copy_number {
            0 => CnvKind::Del,
            1 => CnvKind::Dip,
            _ => CnvKind::Dup,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CnvKind::Dup => "DUP",
            CnvKind::Del => "DEL",
            CnvKind::Dip => "DIP",
        }
    }
}

impl std::fmt::Display for CnvKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
/// A copy-number change over `[start, end]`.
pub struct Cnv {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    pub copy_number: u32,
    pub kind: CnvKind,
}

impl Cnv {
    pub fn new(chrom: &str, start: i64, end: i64, copy_number: u32) -> Cnv {
        Cnv {
            chrom: canonical_chrom(chrom),
            start,
            end,
            copy_number,
            kind: CnvKind::from_copy_number(copy_number),
        }
    }
}

impl GenomicSpan for Cnv {
    fn chrom(&self) -> &str {
        &self.chrom
    }
    fn start(&self) -> i64 {
        self.start
    }
    fn end(&self) -> i64 {
        self.end
    }
    fn alleles(&self) -> (&str, &str) {
        ("DIP", self.kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AnnoConfig;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn tuple(v: &Variant) -> (i64, i64, &str, &str) {
        (v.start, v.end, v.reference.as_str(), v.alt.as_str())
    }

    #[rstest]
    #[case(100, "AT", "A", (101, 101, "T", "-"))]
    #[case(50, "-", "GG", (50, 50, "-", "GG"))]
    #[case(100, "A", "G", (100, 100, "A", "G"))]
    #[case(100, "A", "AG", (100, 100, "-", "G"))]
    #[case(100, "A", "GA", (99, 99, "-", "G"))]
    #[case(100, "TA", "A", (100, 100, "T", "-"))]
    #[case(100, "ACGT", "AGGT", (101, 101, "C", "G"))]
    #[case(100, "AC", "ATC", (100, 100, "-", "T"))]
    #[case(100, "ACCT", "AT", (101, 102, "CC", "-"))]
    #[case(100, "C", "C", (100, 100, "C", "C"))]
    #[case(100, "TTA", ".", (100, 102, "TTA", "-"))]
    fn test_normalize(
        #[case] pos: i64,
        #[case] reference: &str,
        #[case] alt: &str,
        #[case] expected: (i64, i64, &str, &str),
    ) {
        let v = Variant::normalize("1", pos, reference, alt);
        assert_eq!(tuple(&v), expected);
    }

    #[rstest]
    #[case(100, "AT", "A")]
    #[case(100, "A", "AG")]
    #[case(100, "ACGT", "AGGT")]
    #[case(100, "ACCT", "AT")]
    #[case(100, "GGCA", "TTGCA")]
    #[case(7, "-", "GG")]
    fn test_normalize_is_idempotent(#[case] pos: i64, #[case] reference: &str, #[case] alt: &str) {
        let once = Variant::normalize("1", pos, reference, alt);
        let twice = Variant::normalize(&once.chrom, once.start, &once.reference, &once.alt);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_kind_and_chrom() {
        assert_eq!(Variant::normalize("M", 10, "A", "T").chrom, "MT");
        assert_eq!(Variant::normalize("1", 10, "A", "T").kind(), MutationKind::Snv);
        assert_eq!(Variant::normalize("1", 10, "A", "AT").kind(), MutationKind::Ins);
        assert_eq!(Variant::normalize("1", 10, "AT", "A").kind(), MutationKind::Del);
        assert_eq!(Variant::normalize("1", 10, "AT", "GC").kind(), MutationKind::Delins);
    }

    #[test]
    fn test_sort_by_position() {
        let table = AnnoConfig::default().chrom_table();
        let mut vars = vec![
            Variant::normalize("10", 5, "A", "T"),
            Variant::normalize("2", 9, "A", "T"),
            Variant::normalize("2", 9, "A", "C"),
            Variant::normalize("X", 1, "A", "T"),
            Variant::normalize("2", 3, "A", "T"),
        ];
        sort_by_position(&mut vars, &table).unwrap();
        let order: Vec<(String, i64, String)> = vars
            .iter()
            .map(|v| (v.chrom.clone(), v.start, v.alt.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                (String::from("2"), 3, String::from("T")),
                (String::from("2"), 9, String::from("C")),
                (String::from("2"), 9, String::from("T")),
                (String::from("10"), 5, String::from("T")),
                (String::from("X"), 1, String::from("T")),
            ]
        );

        let mut bad = vec![Variant::normalize("chrUn", 1, "A", "T")];
        assert!(sort_by_position(&mut bad, &table).is_err());
    }

    #[test]
    fn test_cnv_and_other_info() {
        assert_eq!(Cnv::new("1", 1, 10, 3).kind, CnvKind::Dup);
        assert_eq!(Cnv::new("1", 1, 10, 0).kind, CnvKind::Del);
        assert_eq!(Cnv::new("1", 1, 10, 1).kind, CnvKind::Dip);
        let info = parse_other_info("DP=10,AF=0.5,flag, GT=0/1");
        assert_eq!(info.len(), 3);
        assert_eq!(info.get("GT"), Some(&String::from("0/1")));
    }
}
