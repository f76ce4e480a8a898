use crate::errors::{AnnoError, AnnoResult};
use crate::reader::{parse_int, parse_lines, split_fields, Parsed};
use crate::utils::{get_text_reader_from_path, strip_chr_prefix};
use crate::variant::{parse_other_info, Cnv, GenomicSpan, OtherInfo, Variant};
use std::io::BufRead;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A normalized small variant with the passthrough column of its input line.
pub struct SnvRecord {
    pub variant: Variant,
    pub other_info: OtherInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A copy-number change with the passthrough column of its input line.
pub struct CnvRecord {
    pub cnv: Cnv,
    pub other_info: OtherInfo,
}

impl GenomicSpan for SnvRecord {
    fn chrom(&self) -> &str {
        &self.variant.chrom
    }
    fn start(&self) -> i64 {
        self.variant.start
    }
    fn end(&self) -> i64 {
        self.variant.end
    }
    fn alleles(&self) -> (&str, &str) {
        self.variant.alleles()
    }
}

impl GenomicSpan for CnvRecord {
    fn chrom(&self) -> &str {
        &self.cnv.chrom
    }
    fn start(&self) -> i64 {
        self.cnv.start
    }
    fn end(&self) -> i64 {
        self.cnv.end
    }
    fn alleles(&self) -> (&str, &str) {
        self.cnv.alleles()
    }
}

/// Parses one small-variant line: `chrom, start, end, ref, alt[, info]`.
///
/// The end column is ignored, as the end is derived from the normalized alleles. Comma
/// separated alternative alleles are split into independent variants that share the
/// passthrough column.
pub fn parse_snv_line(line: &str, line_no: usize) -> AnnoResult<Vec<SnvRecord>> {
    let fields = split_fields(line, line_no, 5)?;
    let chrom = strip_chr_prefix(fields[0].trim());
    let pos = parse_int::<i64>(fields[1], "start", line_no)?;
    let other_info = fields.get(5).map(|s| parse_other_info(s)).unwrap_or_default();

    let alts: Vec<&str> = fields[4].split(',').collect();
    if alts.iter().any(|a| a.trim().is_empty()) && alts.len() > 1 {
        return Err(AnnoError::malformed(
            line_no,
            format!("empty alternative allele in {:?}", fields[4]),
        ));
    }
    Ok(alts
        .into_iter()
        .map(|alt| SnvRecord {
            variant: Variant::normalize(chrom, pos, fields[3], alt),
            other_info: other_info.clone(),
        })
        .collect())
}

/// Parses one copy-number line: `chrom, start, end, copy_number[, info]`.
pub fn parse_cnv_line(line: &str, line_no: usize) -> AnnoResult<Vec<CnvRecord>> {
    let fields = split_fields(line, line_no, 4)?;
    let chrom = strip_chr_prefix(fields[0].trim());
    let start = parse_int::<i64>(fields[1], "start", line_no)?;
    let end = parse_int::<i64>(fields[2], "end", line_no)?;
    let copy_number = parse_int::<u32>(fields[3], "copy number", line_no)?;
    if start > end {
        return Err(AnnoError::malformed(
            line_no,
            format!("start {} is after end {}", start, end),
        ));
    }
    Ok(vec![CnvRecord {
        cnv: Cnv::new(chrom, start, end, copy_number),
        other_info: fields.get(4).map(|s| parse_other_info(s)).unwrap_or_default(),
    }])
}

pub fn read_snvs<R: BufRead>(reader: R) -> AnnoResult<Parsed<SnvRecord>> {
    parse_lines(reader, "variant", parse_snv_line)
}

pub fn read_cnvs<R: BufRead>(reader: R) -> AnnoResult<Parsed<CnvRecord>> {
    parse_lines(reader, "copy number", parse_cnv_line)
}

/// Reads a plain or gzipped small-variant file.
pub fn read_snvs_from_path<T: AsRef<Path>>(file_path: T) -> AnnoResult<Parsed<SnvRecord>> {
    let parsed = read_snvs(get_text_reader_from_path(file_path.as_ref())?)?;
    info!("read {} variants from {:?}", parsed.len(), file_path.as_ref());
    Ok(parsed)
}

/// Reads a plain or gzipped copy-number file.
pub fn read_cnvs_from_path<T: AsRef<Path>>(file_path: T) -> AnnoResult<Parsed<CnvRecord>> {
    let parsed = read_cnvs(get_text_reader_from_path(file_path.as_ref())?)?;
    info!(
        "read {} copy number changes from {:?}",
        parsed.len(),
        file_path.as_ref()
    );
    Ok(parsed)
}
