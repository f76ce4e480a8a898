use crate::errors::{AnnoError, AnnoResult};
use crate::reader::{parse_int, parse_lines, split_fields, Parsed};
use crate::transcript::{Completeness, GeneModelRecord, Strand};
use crate::utils::{get_text_reader_from_path, strip_chr_prefix, VALIDSTRANDS};
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, info};

// bin, name, chrom, strand, txStart, txEnd, cdsStart, cdsEnd, exonCount,
// exonStarts, exonEnds, score, name2, cdsStartStat
const MIN_FIELDS: usize = 13;

fn parse_coordinate_list(field: &str, name: &str, line_no: usize) -> AnnoResult<Vec<i64>> {
    field
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_int::<i64>(s, name, line_no))
        .collect()
}

/// Parses one line of a gene model in the UCSC refGene layout.
///
/// The 0-based half-open coordinates of the file are converted to 1-based inclusive ones
/// and the `chr` prefix is stripped from the chromosome name.
///
/// # Returns
///
/// * `Ok(Some(record))`: a parsed record.
/// * `Ok(None)`: the record is on `M` or on an alternative contig (a chromosome name longer
///   than two characters) and is discarded.
/// * `Err(AnnoError::MalformedRecord)`: a column is missing or cannot be parsed.
pub fn parse_refgene_line(line: &str, line_no: usize) -> AnnoResult<Option<GeneModelRecord>> {
    let fields = split_fields(line, line_no, MIN_FIELDS)?;

    let chrom = strip_chr_prefix(fields[2].trim());
    if chrom == "M" || chrom.len() > 2 {
        return Ok(None);
    }

    let strand = fields[3].trim();
    if !VALIDSTRANDS.contains(&strand) {
        return Err(AnnoError::malformed(
            line_no,
            format!("invalid strand {:?}", strand),
        ));
    }
    let strand = if strand == "+" {
        Strand::Positive
    } else {
        Strand::Negative
    };

    let tx_start = parse_int::<i64>(fields[4], "txStart", line_no)? + 1;
    let tx_end = parse_int::<i64>(fields[5], "txEnd", line_no)?;
    let cds_start = parse_int::<i64>(fields[6], "cdsStart", line_no)? + 1;
    let cds_end = parse_int::<i64>(fields[7], "cdsEnd", line_no)?;
    let exon_count = parse_int::<usize>(fields[8], "exonCount", line_no)?;
    let starts = parse_coordinate_list(fields[9], "exonStarts", line_no)?;
    let ends = parse_coordinate_list(fields[10], "exonEnds", line_no)?;

    if starts.len() != exon_count || ends.len() != exon_count || exon_count == 0 {
        return Err(AnnoError::malformed(
            line_no,
            format!(
                "exonCount is {} but {} starts and {} ends are listed",
                exon_count,
                starts.len(),
                ends.len()
            ),
        ));
    }
    let exons: Vec<(i64, i64)> = starts.iter().map(|s| s + 1).zip(ends).collect();
    if exons.iter().any(|(s, e)| s > e)
        || exons.windows(2).any(|w| w[0].1 >= w[1].0)
        || tx_start > tx_end
    {
        return Err(AnnoError::malformed(
            line_no,
            "exons are empty, unsorted or overlapping",
        ));
    }
    if exons[0].0 != tx_start || exons[exon_count - 1].1 != tx_end {
        return Err(AnnoError::malformed(
            line_no,
            "the exons do not span the transcript",
        ));
    }

    let tag = fields
        .get(13)
        .map(|t| Completeness::from_tag(t.trim()))
        .unwrap_or(Completeness::Incomplete);

    Ok(Some(GeneModelRecord {
        transcript_id: fields[1].trim().to_string(),
        chrom: chrom.to_string(),
        strand,
        tx_start,
        tx_end,
        cds_start,
        cds_end,
        exons,
        gene_symbol: fields[12].trim().to_string(),
        tag,
    }))
}

/// Reads a gene model from any buffered reader. See [parse_refgene_line].
pub fn read_refgene<R: BufRead>(reader: R) -> AnnoResult<Parsed<GeneModelRecord>> {
    let mut discarded = 0usize;
    let parsed = parse_lines(reader, "gene model", |line, no| {
        let rec = parse_refgene_line(line, no)?;
        if rec.is_none() {
            discarded += 1;
        }
        Ok(rec.into_iter().collect())
    })?;
    if discarded > 0 {
        debug!(
            "discarded {} gene model records on M or on alternative contigs",
            discarded
        );
    }
    Ok(parsed)
}

/// Reads a gene model from a plain or gzipped file.
pub fn read_refgene_from_path<T: AsRef<Path>>(file_path: T) -> AnnoResult<Parsed<GeneModelRecord>> {
    let parsed = read_refgene(get_text_reader_from_path(file_path.as_ref())?)?;
    info!(
        "read {} transcripts from {:?}",
        parsed.len(),
        file_path.as_ref()
    );
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LINE: &str = "585\tNM_0001\tchr1\t-\t100\t400\t120\t330\t3\t100,200,300,\t150,250,400,\t0\tGENE1\tcmpl\tcmpl\t0,1,0,";

    #[test]
    fn test_parse_refgene_line() {
        let rec = parse_refgene_line(LINE, 1).unwrap().unwrap();
        assert_eq!(
            rec,
            GeneModelRecord {
                transcript_id: String::from("NM_0001"),
                chrom: String::from("1"),
                strand: Strand::Negative,
                tx_start: 101,
                tx_end: 400,
                cds_start: 121,
                cds_end: 330,
                exons: vec![(101, 150), (201, 250), (301, 400)],
                gene_symbol: String::from("GENE1"),
                tag: Completeness::Complete,
            }
        );
    }

    #[test]
    fn test_discarded_and_malformed() {
        let alt = LINE.replace("chr1", "chr6_apd_hap1");
        assert_eq!(parse_refgene_line(&alt, 1).unwrap(), None);
        let mito = LINE.replace("chr1", "chrM");
        assert_eq!(parse_refgene_line(&mito, 1).unwrap(), None);

        let bad_count = LINE.replace("\t3\t", "\t2\t");
        assert!(matches!(
            parse_refgene_line(&bad_count, 7),
            Err(AnnoError::MalformedRecord { line: 7, .. })
        ));
        let bad_strand = LINE.replace("\t-\t", "\t.\t");
        assert!(parse_refgene_line(&bad_strand, 1).is_err());

        let text = format!("#bin\tname\n{}\n{}\n", LINE, bad_count);
        let parsed = read_refgene(text.as_bytes()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.skipped.len(), 1);
    }
}
