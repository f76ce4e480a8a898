use lazy_static::lazy_static;
use std::collections::HashMap;

// the standard and the vertebrate mitochondrial genetic code. They
// differ in four codons: TGA (W), ATA (M), AGA and AGG (stop).
lazy_static! {
    static ref STANDARD_CODONS: HashMap<&'static [u8], u8> = codon_table(&[]);
    static ref MITOCHONDRIAL_CODONS: HashMap<&'static [u8], u8> =
        codon_table(&[(b"TGA", b'W'), (b"ATA", b'M'), (b"AGA", b'*'), (b"AGG", b'*')]);
}

const BASES: [u8; 4] = [b'T', b'C', b'A', b'G'];
// amino acids in TCAG codon order
const STANDARD_AAS: &[u8; 64] =
    b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

fn codon_table(overrides: &[(&'static [u8; 3], u8)]) -> HashMap<&'static [u8], u8> {
    lazy_static! {
        static ref CODONS: Vec<[u8; 3]> = BASES
            .iter()
            .flat_map(|a| {
                BASES
                    .iter()
                    .flat_map(move |b| BASES.iter().map(move |c| [*a, *b, *c]))
            })
            .collect();
    }
    let mut table: HashMap<&'static [u8], u8> = CODONS
        .iter()
        .zip(STANDARD_AAS.iter())
        .map(|(codon, aa)| (&codon[..], *aa))
        .collect();
    for (codon, aa) in overrides {
        table.insert(&codon[..], *aa);
    }
    table
}

/// Returns the three-letter name of a one-letter amino acid code. Stops
/// (`*`) are named `Ter` and anything unrecognized `Xaa`.
pub fn aa_three_letter(aa: u8) -> &'static str {
    match aa {
        b'A' => "Ala",
        b'R' => "Arg",
        b'N' => "Asn",
        b'D' => "Asp",
        b'C' => "Cys",
        b'Q' => "Gln",
        b'E' => "Glu",
        b'G' => "Gly",
        b'H' => "His",
        b'I' => "Ile",
        b'L' => "Leu",
        b'K' => "Lys",
        b'M' => "Met",
        b'F' => "Phe",
        b'P' => "Pro",
        b'S' => "Ser",
        b'T' => "Thr",
        b'W' => "Trp",
        b'Y' => "Tyr",
        b'V' => "Val",
        b'*' => "Ter",
        _ => "Xaa",
    }
}

fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'U' => b'A',
        other => other,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// An immutable nucleotide or protein sequence.
///
/// The bytes are upper-cased on construction, so soft-masked genome sequence and
/// lower-case alleles compare equal to their upper-case forms. All operations return new
/// sequences; positions are 0-based and ranges are half-open unless stated otherwise.
///
/// # Examples
///
/// ```ignore
/// let cds = Sequence::from("atgGCCtaa");
/// assert_eq!(cds.translate(false).to_string(), "MA*");
/// assert_eq!(cds.reverse_complement().to_string(), "TTAGGCCAT");
/// ```
pub struct Sequence(Vec<u8>);

impl Sequence {
    pub fn new(bytes: Vec<u8>) -> Sequence {
        let mut bytes = bytes;
        bytes.make_ascii_uppercase();
        Sequence(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the residue at `idx`, if any.
    pub fn get(&self, idx: usize) -> Option<u8> {
        self.0.get(idx).copied()
    }

    pub fn starts_with(&self, other: &Sequence) -> bool {
        self.0.starts_with(&other.0)
    }

    pub fn ends_with(&self, other: &Sequence) -> bool {
        self.0.ends_with(&other.0)
    }

    pub fn reversed(&self) -> Sequence {
        Sequence(self.0.iter().rev().copied().collect())
    }

    pub fn reverse_complement(&self) -> Sequence {
        Sequence(self.0.iter().rev().map(|b| complement(*b)).collect())
    }

    /// Returns the bases in `[start, end)`, or `None` if the range is out of bounds.
    pub fn slice(&self, start: usize, end: usize) -> Option<Sequence> {
        self.0.get(start..end).map(|s| Sequence(s.to_vec()))
    }

    /// Returns up to `len` bases starting at `start`, truncated at the end of the
    /// sequence.
    pub fn sub_seq(&self, start: usize, len: usize) -> Sequence {
        let start = start.min(self.0.len());
        let end = start.saturating_add(len).min(self.0.len());
        Sequence(self.0[start..end].to_vec())
    }

    /// Inserts `bases` in front of the residue at `pos` (`pos == len` appends).
    pub fn insert(&self, pos: usize, bases: &Sequence) -> Sequence {
        self.replace(pos, pos, bases)
    }

    /// Removes the residues in `[start, end)`.
    pub fn delete(&self, start: usize, end: usize) -> Sequence {
        self.replace(start, end, &Sequence::default())
    }

    /// Replaces the residues in `[start, end)` by `bases`. Out of range bounds are
    /// clamped to the sequence.
    pub fn replace(&self, start: usize, end: usize, bases: &Sequence) -> Sequence {
        let start = start.min(self.0.len());
        let end = end.clamp(start, self.0.len());
        let mut out = Vec::with_capacity(self.0.len() - (end - start) + bases.len());
        out.extend_from_slice(&self.0[..start]);
        out.extend_from_slice(&bases.0);
        out.extend_from_slice(&self.0[end..]);
        Sequence(out)
    }

    /// Concatenates `self` and `other`.
    pub fn concat(&self, other: &Sequence) -> Sequence {
        let mut out = self.0.clone();
        out.extend_from_slice(&other.0);
        Sequence(out)
    }

    /// The length of the longest common prefix of the two sequences.
    pub fn common_prefix_len(&self, other: &Sequence) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// The length of the longest common suffix of the two sequences.
    pub fn common_suffix_len(&self, other: &Sequence) -> usize {
        self.0
            .iter()
            .rev()
            .zip(other.0.iter().rev())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// The first index at which the two sequences differ, counting the end of the shorter
    /// one as a difference. `None` if they are identical.
    pub fn first_difference(&self, other: &Sequence) -> Option<usize> {
        let common = self.common_prefix_len(other);
        if common == self.len() && common == other.len() {
            None
        } else {
            Some(common)
        }
    }

    /// The index of the first occurrence of `residue`.
    pub fn find(&self, residue: u8) -> Option<usize> {
        self.0.iter().position(|b| *b == residue)
    }

    /// Translates the sequence codon by codon, using the vertebrate mitochondrial code if
    /// `mitochondrial` is set and the standard code otherwise. Codons that are not in the
    /// table (e.g. containing `N`) become `X`; a trailing partial codon is dropped.
    pub fn translate(&self, mitochondrial: bool) -> Sequence {
        let table: &HashMap<&'static [u8], u8> = if mitochondrial {
            &MITOCHONDRIAL_CODONS
        } else {
            &STANDARD_CODONS
        };
        Sequence(
            self.0
                .chunks_exact(3)
                .map(|codon| *table.get(codon).unwrap_or(&b'X'))
                .collect(),
        )
    }

    /// Spells the residues in `[start, end)` with three-letter amino acid names.
    pub fn three_letter(&self, start: usize, end: usize) -> String {
        self.0
            .get(start..end.min(self.0.len()))
            .unwrap_or_default()
            .iter()
            .map(|aa| aa_three_letter(*aa))
            .collect()
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<&str> for Sequence {
    fn from(s: &str) -> Sequence {
        Sequence::new(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Sequence {
    fn from(s: &[u8]) -> Sequence {
        Sequence::new(s.to_vec())
    }
}

impl From<Vec<u8>> for Sequence {
    fn from(s: Vec<u8>) -> Sequence {
        Sequence::new(s)
    }
}

impl AsRef<[u8]> for Sequence {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_codon_tables() {
        assert_eq!(STANDARD_CODONS.len(), 64);
        assert_eq!(STANDARD_CODONS.get(&b"ATG"[..]), Some(&b'M'));
        assert_eq!(STANDARD_CODONS.get(&b"TGA"[..]), Some(&b'*'));
        assert_eq!(STANDARD_CODONS.get(&b"GGC"[..]), Some(&b'G'));
        assert_eq!(MITOCHONDRIAL_CODONS.get(&b"TGA"[..]), Some(&b'W'));
        assert_eq!(MITOCHONDRIAL_CODONS.get(&b"AGG"[..]), Some(&b'*'));
        assert_eq!(MITOCHONDRIAL_CODONS.get(&b"ATA"[..]), Some(&b'M'));
    }

    #[rstest]
    #[case("ATGGCCTAA", false, "MA*")]
    #[case("ATGTGATAA", false, "M**")]
    #[case("ATATGATAA", true, "MW*")]
    #[case("ATGNNNTAAG", false, "MX*")]
    fn test_translate(#[case] cds: &str, #[case] mt: bool, #[case] protein: &str) {
        assert_eq!(Sequence::from(cds).translate(mt).to_string(), protein);
    }

    #[test]
    fn test_edits() {
        let s = Sequence::from("acgtac");
        assert_eq!(s.to_string(), "ACGTAC");
        assert_eq!(s.reverse_complement().to_string(), "GTACGT");
        assert_eq!(s.reversed().to_string(), "CATGCA");
        assert_eq!(s.sub_seq(4, 10).to_string(), "AC");
        assert_eq!(s.slice(1, 3), Some(Sequence::from("CG")));
        assert_eq!(s.slice(4, 9), None);
        assert_eq!(s.insert(2, &Sequence::from("TT")).to_string(), "ACTTGTAC");
        assert_eq!(s.delete(1, 3).to_string(), "ATAC");
        assert_eq!(s.replace(1, 3, &Sequence::from("G")).to_string(), "AGTAC");
        assert_eq!(s.insert(6, &Sequence::from("G")).to_string(), "ACGTACG");
    }

    #[test]
    fn test_comparisons() {
        let a = Sequence::from("ATGGCC");
        let b = Sequence::from("ATGACC");
        assert_eq!(a.common_prefix_len(&b), 3);
        assert_eq!(a.common_suffix_len(&b), 2);
        assert_eq!(a.first_difference(&b), Some(3));
        assert_eq!(a.first_difference(&a.clone()), None);
        assert_eq!(a.first_difference(&Sequence::from("ATGGCCA")), Some(6));
        assert!(a.starts_with(&Sequence::from("ATG")));
        assert!(a.ends_with(&Sequence::from("GCC")));
        assert_eq!(Sequence::from("MA*").find(b'*'), Some(2));
    }

    #[test]
    fn test_three_letter() {
        let p = Sequence::from("MA*");
        assert_eq!(p.three_letter(0, 3), "MetAlaTer");
        assert_eq!(p.three_letter(1, 10), "AlaTer");
        assert_eq!(aa_three_letter(b'?'), "Xaa");
    }
}
