use crate::errors::{AnnoError, AnnoResult};
use crate::reader::variant::SnvRecord;
use crate::reader::Parsed;
use crate::utils::{get_text_reader_from_path, strip_chr_prefix};
use crate::variant::{OtherInfo, Variant};
use noodles::vcf;
use std::io::{self, BufRead};
use std::path::Path;
use tracing::{debug, info, warn};

/// `true` for a plain base-sequence allele. Symbolic alleles (`<DEL>`), breakends, the
/// overlapping deletion `*` and the missing allele `.` are not annotated.
fn is_sequence_allele(allele: &str) -> bool {
    !allele.is_empty()
        && allele
            .bytes()
            .all(|b| matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'N'))
}

/// Picks the value of one alternative allele out of a per-allele (`Number=A`) list. Values
/// that are not per-allele are returned as they are.
fn allele_value(value: &str, alt_index: usize, alt_count: usize) -> &str {
    if alt_count < 2 {
        return value;
    }
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() == alt_count {
        parts[alt_index]
    } else {
        value
    }
}

/// Builds the other-info of the `alt_index`-th alternative allele of a VCF data line split
/// into its columns.
///
/// It holds `ID`, `QUAL` and `FILTER` when present, every INFO field (flags with an empty
/// value, per-allele lists reduced to this allele's value) and the FORMAT fields of every
/// sample as `<sample>:<key>`.
pub(crate) fn vcf_other_info(
    columns: &[&str],
    alt_index: usize,
    alt_count: usize,
    samples: &[String],
) -> OtherInfo {
    let mut other = OtherInfo::new();
    for (col, key) in [(2, "ID"), (5, "QUAL"), (6, "FILTER")] {
        if let Some(v) = columns.get(col).filter(|v| **v != ".") {
            other.insert(key.to_string(), v.to_string());
        }
    }

    let info = columns.get(7).filter(|v| **v != ".");
    for field in info.into_iter().flat_map(|v| v.split(';')) {
        let (key, value) = field.split_once('=').unwrap_or((field, ""));
        other.insert(
            key.to_string(),
            allele_value(value, alt_index, alt_count).to_string(),
        );
    }

    if let Some(format) = columns.get(8) {
        let keys: Vec<&str> = format.split(':').collect();
        for (i, name) in samples.iter().enumerate() {
            let Some(values) = columns.get(9 + i) else {
                break;
            };
            for (key, value) in keys.iter().zip(values.split(':')) {
                other.insert(format!("{}:{}", name, key), value.to_string());
            }
        }
    }
    other
}

fn record_to_snvs(record: &vcf::Record, samples: &[String]) -> Vec<SnvRecord> {
    let chrom = record.chromosome().to_string();
    let chrom = strip_chr_prefix(&chrom);
    let pos = usize::from(record.position()) as i64;
    let reference = record.reference_bases().to_string();
    let alts = record.alternate_bases().to_string();
    let alts: Vec<&str> = alts.split(',').collect();

    let line = record.to_string();
    let columns: Vec<&str> = line.split('\t').collect();
    alts.iter()
        .enumerate()
        .filter(|(_, alt)| {
            let keep = is_sequence_allele(alt);
            if !keep {
                debug!("skipping allele {} at {}:{}", alt, chrom, pos);
            }
            keep
        })
        .map(|(i, alt)| SnvRecord {
            variant: Variant::normalize(chrom, pos, &reference, alt),
            other_info: vcf_other_info(&columns, i, alts.len(), samples),
        })
        .collect()
}

/// Reads the small variants of a VCF stream.
///
/// Every base-sequence alternative allele of a data record becomes one normalized variant,
/// with the record's QUAL, FILTER, INFO and sample fields in its other-info
/// ([vcf_other_info]). A data record noodles cannot parse is skipped and collected as a
/// [AnnoError::MalformedRecord] numbered by its position among the data records. A
/// malformed header aborts the read.
pub fn read_vcf<R: BufRead>(reader: R) -> AnnoResult<Parsed<SnvRecord>> {
    let mut reader = vcf::Reader::new(reader);
    let header = reader.read_header()?;
    let samples: Vec<String> = header.sample_names().iter().cloned().collect();

    let mut parsed = Parsed {
        records: Vec::new(),
        skipped: Vec::new(),
    };
    for (idx, result) in reader.records(&header).enumerate() {
        match result {
            Ok(record) => parsed.records.extend(record_to_snvs(&record, &samples)),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => parsed
                .skipped
                .push(AnnoError::malformed(idx + 1, format!("VCF data record: {}", e))),
            Err(e) => return Err(e.into()),
        }
    }
    if !parsed.skipped.is_empty() {
        warn!(
            "skipped {} malformed VCF records; the first one was: {}",
            parsed.skipped.len(),
            parsed.skipped[0]
        );
    }
    Ok(parsed)
}

/// Reads a plain, gzipped or bgzipped VCF file.
pub fn read_vcf_from_path<T: AsRef<Path>>(file_path: T) -> AnnoResult<Parsed<SnvRecord>> {
    let parsed = read_vcf(get_text_reader_from_path(file_path.as_ref())?)?;
    info!(
        "read {} variants from VCF {:?}",
        parsed.len(),
        file_path.as_ref()
    );
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VCF: &str = "\
##fileformat=VCFv4.3
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total depth\">
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">
##INFO=<ID=DB,Number=0,Type=Flag,Description=\"dbSNP membership\">
##FILTER=<ID=q10,Description=\"Quality below 10\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FORMAT=<ID=AD,Number=R,Type=Integer,Description=\"Allelic depths\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1
chr1\t100\trs1\tAT\tA\t50\tPASS\tDP=12;DB\tGT:AD\t0/1:3,9
1\t200\t.\tA\tG,T\t.\tq10\tDP=3;AF=0.5,0.25\tGT:AD\t1/2:0,1,2
1\t300\t.\tC\t*,CTT\t20\tPASS\tDP=8\tGT:AD\t1/2:0,4,4
chrM\t7\t.\tC\tT\t.\t.\t.\tGT\t1
1\tabc\t.\tA\tG\t.\t.\t.\tGT\t0/1
";

    #[test]
    fn test_read_vcf() {
        let parsed = read_vcf(VCF.as_bytes()).unwrap();
        assert_eq!(parsed.len(), 5);
        assert_eq!(parsed.skipped.len(), 1);
        assert!(parsed.skipped[0].is_recoverable());

        let del = &parsed.records[0];
        assert_eq!(del.variant, Variant::normalize("1", 100, "AT", "A"));
        assert_eq!(del.other_info.get("ID").map(|s| s.as_str()), Some("rs1"));
        assert_eq!(
            del.other_info.get("QUAL").and_then(|q| q.parse::<f32>().ok()),
            Some(50.0)
        );
        assert_eq!(del.other_info.get("FILTER").map(|s| s.as_str()), Some("PASS"));
        assert_eq!(del.other_info.get("DP").map(|s| s.as_str()), Some("12"));
        assert_eq!(del.other_info.get("DB").map(|s| s.as_str()), Some(""));
        assert_eq!(del.other_info.get("S1:GT").map(|s| s.as_str()), Some("0/1"));
        assert_eq!(del.other_info.get("S1:AD").map(|s| s.as_str()), Some("3,9"));

        // one variant per alternative allele, each with its own allele frequency
        let (g, t) = (&parsed.records[1], &parsed.records[2]);
        assert_eq!((g.variant.alt.as_str(), t.variant.alt.as_str()), ("G", "T"));
        assert_eq!(g.other_info.get("AF").map(|s| s.as_str()), Some("0.5"));
        assert_eq!(t.other_info.get("AF").map(|s| s.as_str()), Some("0.25"));
        assert!(!g.other_info.contains_key("QUAL"));

        // the overlapping deletion allele is dropped
        let ins = &parsed.records[3];
        assert_eq!(ins.variant, Variant::normalize("1", 300, "C", "CTT"));

        assert_eq!(parsed.records[4].variant.chrom, "MT");
        assert_eq!(
            parsed.records[4].other_info.get("S1:GT").map(|s| s.as_str()),
            Some("1")
        );
    }

    #[test]
    fn test_vcf_other_info() {
        let columns = vec![
            "1", "5", ".", "A", "C,G", "7.5", ".", "AC=1,2;NS=3", "GT:DP", "1/2:11", "0/0",
        ];
        let samples = vec![String::from("tumor"), String::from("normal")];
        let other = vcf_other_info(&columns, 1, 2, &samples);
        assert_eq!(other.get("AC").map(|s| s.as_str()), Some("2"));
        assert_eq!(other.get("NS").map(|s| s.as_str()), Some("3"));
        assert_eq!(other.get("QUAL").map(|s| s.as_str()), Some("7.5"));
        assert!(!other.contains_key("ID"));
        assert!(!other.contains_key("FILTER"));
        assert_eq!(other.get("tumor:DP").map(|s| s.as_str()), Some("11"));
        assert_eq!(other.get("normal:GT").map(|s| s.as_str()), Some("0/0"));
        assert!(!other.contains_key("normal:DP"));

        assert!(is_sequence_allele("acgtN"));
        assert!(!is_sequence_allele("*"));
        assert!(!is_sequence_allele("<DEL>"));
        assert!(!is_sequence_allele("."));
    }
}
