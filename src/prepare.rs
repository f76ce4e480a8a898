use crate::genome_index::GenomeIndex;
use crate::options::AnnoConfig;
use crate::reader::entrez::EntrezIndex;
use crate::reader::fasta::{for_each_chromosome, get_chromsize, SequenceStore};
use crate::reader::refgene::read_refgene_from_path;
use crate::transcript::TranscriptSet;
use crate::utils::{get_writer, strip_chr_prefix};
use crate::variant::canonical_chrom;
use anyhow::Context;
use std::path::Path;
use tracing::{debug, info, warn};

/// Cuts the positive-strand genomic sequence of every transcript out of a genome FASTA.
///
/// The genome is streamed one chromosome at a time. Transcripts whose span runs past
/// the end of their chromosome, or whose chromosome is absent from the genome, get no
/// entry.
pub fn build_sequence_store<T: AsRef<Path>>(
    transcripts: &TranscriptSet,
    genome: T,
) -> anyhow::Result<SequenceStore> {
    let start_time = std::time::Instant::now();
    let by_chrom = transcripts.by_chrom();
    let mut store = SequenceStore::default();
    let mut truncated = 0usize;

    for_each_chromosome(genome.as_ref(), |name, seq| {
        let chrom = canonical_chrom(strip_chr_prefix(name));
        if let Some(ts) = by_chrom.get(chrom.as_str()) {
            debug!("extracting {} transcripts from chr{}", ts.len(), chrom);
            for t in ts {
                match seq.slice((t.exon_start - 1).max(0) as usize, t.exon_end as usize) {
                    Some(s) => {
                        store.insert(t.key(), s);
                    }
                    None => truncated += 1,
                }
            }
        }
        Ok(())
    })?;

    if truncated > 0 {
        warn!(
            "{} transcripts run past the end of their chromosome and have no sequence",
            truncated
        );
    }
    let missing = transcripts.len().saturating_sub(store.len() + truncated);
    if missing > 0 {
        warn!(
            "{} transcripts are on chromosomes missing from the genome",
            missing
        );
    }
    info!(
        "extracted {} transcript sequences in {:?}",
        store.len(),
        start_time.elapsed()
    );
    Ok(store)
}

/// Derives the sequence store and the Genome Index file from a gene model and a genome.
///
/// The chromosome lengths of `config` are replaced by those observed in the genome before
/// the index is built.
///
/// # Arguments
///
/// * `config`: the configuration; its flank length and window step are used.
/// * `refgene`: the gene model (refGene layout, plain or gzipped).
/// * `genome`: the genome FASTA (plain or gzipped).
/// * `mrna_out`: where to write the sequence store FASTA.
/// * `index_out`: where to write the Genome Index.
pub fn prepare<P: AsRef<Path>>(
    config: &mut AnnoConfig,
    refgene: P,
    genome: P,
    mrna_out: P,
    index_out: P,
) -> anyhow::Result<()> {
    let parsed = read_refgene_from_path(refgene.as_ref())
        .with_context(|| format!("could not read {:?}", refgene.as_ref()))?;
    if !parsed.skipped.is_empty() {
        warn!("skipped {} malformed gene model records", parsed.skipped.len());
    }
    let transcripts = TranscriptSet::from_records(parsed.records, config.param.up_down_stream);

    let chromsize = get_chromsize(genome.as_ref())
        .with_context(|| format!("could not read {:?}", genome.as_ref()))?;
    config.update_lengths(&chromsize);

    let store = build_sequence_store(&transcripts, genome.as_ref())?;
    let w = get_writer(Some(mrna_out.as_ref()))
        .with_context(|| format!("could not create {:?}", mrna_out.as_ref()))?;
    store.write(w)?;
    info!("wrote the sequence store to {:?}", mrna_out.as_ref());

    let index = GenomeIndex::build(&transcripts, config)?;
    let w = get_writer(Some(index_out.as_ref()))
        .with_context(|| format!("could not create {:?}", index_out.as_ref()))?;
    index.write(w)?;
    info!("wrote the genome index to {:?}", index_out.as_ref());
    Ok(())
}

/// The read-only reference data of an annotation run.
pub struct Database {
    pub transcripts: TranscriptSet,
    pub index: GenomeIndex,
}

impl Database {
    /// Loads the gene model, attaches Entrez ids (if a `gene_info` file is given) and
    /// sequences, and reads the Genome Index.
    ///
    /// # Arguments
    ///
    /// * `config`: the configuration; its flank length and chromosome table are used.
    /// * `refgene`: the gene model the database was prepared from.
    /// * `mrna`: the sequence store written by [prepare].
    /// * `index`: the Genome Index written by [prepare].
    /// * `gene_info`: an optional NCBI `gene_info` file.
    pub fn load<P: AsRef<Path>>(
        config: &AnnoConfig,
        refgene: P,
        mrna: P,
        index: P,
        gene_info: Option<P>,
    ) -> anyhow::Result<Database> {
        let start_time = std::time::Instant::now();
        let parsed = read_refgene_from_path(refgene.as_ref())
            .with_context(|| format!("could not read {:?}", refgene.as_ref()))?;
        if !parsed.skipped.is_empty() {
            warn!("skipped {} malformed gene model records", parsed.skipped.len());
        }
        let mut transcripts =
            TranscriptSet::from_records(parsed.records, config.param.up_down_stream);

        if let Some(p) = gene_info {
            let entrez = EntrezIndex::from_path(p.as_ref())
                .with_context(|| format!("could not read {:?}", p.as_ref()))?;
            transcripts = transcripts.with_entrez_ids(&entrez);
        }

        let store = SequenceStore::from_path(mrna.as_ref())?;
        let (transcripts, _report) = transcripts.enrich(&store);

        let index = GenomeIndex::from_path(index.as_ref(), &config.chrom_table())
            .with_context(|| format!("could not read {:?}", index.as_ref()))?;
        debug!("loaded the database in {:?}", start_time.elapsed());
        Ok(Database { transcripts, index })
    }
}
