use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::trace;

/// Type alias for a noodles FASTA reader that can read from
/// a `dyn BufRead`. It is used to allow reading from either
/// a compressed or uncompressed FASTA file.
pub type FastaReader = noodles::fasta::Reader<Box<dyn BufRead>>;

/// Type alias for a buffered line reader over either a compressed or an
/// uncompressed text file.
pub type TextReader = Box<dyn BufRead>;

pub(crate) const VALIDSTRANDS: [&str; 2] = ["+", "-"];

/// Peeks at the first two bytes of `reader` and reports whether they are the gzip magic
/// number. Nothing is consumed, so `reader` must be positioned at the start of the stream.
///
/// Returns the [std::io::Error] raised while filling the buffer, if any.
pub fn is_gzipped<T: BufRead>(reader: &mut T) -> std::io::Result<bool> {
    const GZIP_MAGIC_NUMBER: [u8; 2] = [0x1f, 0x8b];

    let src = reader.fill_buf()?;
    Ok(src.get(..2) == Some(&GZIP_MAGIC_NUMBER))
}

/// Wraps any reader into a buffered reader, transparently decompressing it if the
/// stream starts with the gzip magic bytes. Multi-member streams (bgzip) are read to the end.
///
/// **Note** : the function *takes ownership* of the underlying reader, which
/// is the reason behind the `'static` lifetime bound.
pub fn get_text_reader_from_reader(r: impl Read + 'static) -> std::io::Result<TextReader> {
    let mut inner_rdr = BufReader::new(r);
    if is_gzipped(&mut inner_rdr)? {
        trace!("auto-detected gzipped input - reading via decompression");
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(inner_rdr))))
    } else {
        Ok(Box::new(inner_rdr))
    }
}

/// Opens a line-oriented text file (gene model, variant list, gene_info, index file). Gzip
/// compressed files are detected from their content, not from their extension.
pub fn get_text_reader_from_path<T: AsRef<Path>>(p: T) -> std::io::Result<TextReader> {
    let file = File::open(p.as_ref())?;
    get_text_reader_from_reader(file)
}

/// Creates a [FastaReader] from the provided path. This function will automatically
/// determine if the provided path points to a gzip compressed or an uncompressed FASTA
/// file, and will return the appropriate reader accordingly.
///
/// It returns [Ok]`(`[FastaReader]`)` on success and an [std::io::Error] on failure.
pub fn get_noodles_reader_from_path<T: AsRef<Path>>(p: T) -> std::io::Result<FastaReader> {
    Ok(noodles::fasta::Reader::new(get_text_reader_from_path(p)?))
}

/// Creates a [FastaReader] from the provided reader, detecting gzip compression as
/// [get_noodles_reader_from_path] does.
pub fn get_noodles_reader_from_reader(r: impl Read + 'static) -> std::io::Result<FastaReader> {
    Ok(noodles::fasta::Reader::new(get_text_reader_from_reader(r)?))
}

/// Creates a buffered writer for the given path, or for stdout if the path is `None` or `-`.
pub fn get_writer<T: AsRef<Path>>(p: Option<T>) -> std::io::Result<Box<dyn Write>> {
    match p {
        Some(path) if path.as_ref() != Path::new("-") => {
            Ok(Box::new(BufWriter::new(File::create(path.as_ref())?)))
        }
        _ => Ok(Box::new(BufWriter::new(std::io::stdout()))),
    }
}

/// Returns `true` if the line carries no record: it is empty or it is a `#` comment.
pub(crate) fn is_skippable_line(line: &str) -> bool {
    let t = line.trim();
    t.is_empty() || t.starts_with('#')
}

/// Strips a leading `chr` from a chromosome name.
pub fn strip_chr_prefix(chrom: &str) -> &str {
    chrom.strip_prefix("chr").unwrap_or(chrom)
}
