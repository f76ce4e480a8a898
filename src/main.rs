use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use peak_alloc::PeakAlloc;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};
use varanno::annotation::Annotator;
use varanno::options::AnnoConfig;
use varanno::output::write_json_lines_to_path;
use varanno::prepare::{prepare, Database};
use varanno::reader::variant::{read_cnvs_from_path, read_snvs_from_path};
use varanno::reader::vcf::read_vcf_from_path;

#[global_allocator]
static PEAK_ALLOC: PeakAlloc = PeakAlloc;

#[derive(Parser)]
#[command(name = "varanno")]
#[command(about = "Annotate genomic variants against a reference transcript model", long_about = None)]
#[command(version)]
struct Cli {
    /// Print debug messages
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DatabaseArgs {
    /// YAML configuration file; the built-in GRCh37 defaults are used if omitted
    #[arg(short, long, value_name = "CONFIG.YAML")]
    config: Option<PathBuf>,

    /// Gene model in the UCSC refGene layout
    #[arg(short = 'g', long, value_name = "REFGENE")]
    refgene: PathBuf,

    /// Transcript sequence store written by `prepare`
    #[arg(short, long, value_name = "MRNA.FA")]
    mrna: PathBuf,

    /// Genome Index written by `prepare`
    #[arg(short, long, value_name = "INDEX")]
    index: PathBuf,

    /// NCBI gene_info file used to fill in Entrez gene ids
    #[arg(short = 'e', long, value_name = "GENE_INFO")]
    gene_info: Option<PathBuf>,

    /// Output JSON lines file (default: stdout)
    #[arg(short, long, value_name = "OUT.JSONL")]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the transcript sequence store and the Genome Index
    Prepare {
        /// YAML configuration file; the built-in GRCh37 defaults are used if omitted
        #[arg(short, long, value_name = "CONFIG.YAML")]
        config: Option<PathBuf>,

        /// Gene model in the UCSC refGene layout
        #[arg(short = 'g', long, value_name = "REFGENE")]
        refgene: PathBuf,

        /// Genome FASTA file
        #[arg(short = 'r', long, value_name = "GENOME.FA")]
        reference: PathBuf,

        /// Output transcript sequence store
        #[arg(short, long, value_name = "MRNA.FA")]
        mrna: PathBuf,

        /// Output Genome Index
        #[arg(short, long, value_name = "INDEX")]
        index: PathBuf,
    },

    /// Annotate small variants (chrom, start, end, ref, alt, info, or VCF with --vcf)
    Snv {
        /// Input variant file
        #[arg(value_name = "VARIANTS")]
        input: PathBuf,

        /// Read the input as VCF
        #[arg(long)]
        vcf: bool,

        #[command(flatten)]
        db: DatabaseArgs,
    },

    /// Annotate copy-number changes (chrom, start, end, copy_number, info)
    Cnv {
        /// Input copy-number file
        #[arg(value_name = "CNVS")]
        input: PathBuf,

        #[command(flatten)]
        db: DatabaseArgs,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AnnoConfig> {
    let config = match path {
        Some(p) => AnnoConfig::from_yaml(p).with_context(|| format!("could not load {:?}", p))?,
        None => AnnoConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn load_database(config: &AnnoConfig, db: &DatabaseArgs) -> anyhow::Result<Database> {
    Database::load(
        config,
        &db.refgene,
        &db.mrna,
        &db.index,
        db.gene_info.as_ref(),
    )
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        LevelFilter::DEBUG
    } else if cli.quiet {
        LevelFilter::WARN
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();

    let start_time = std::time::Instant::now();
    match cli.command {
        Commands::Prepare {
            config,
            refgene,
            reference,
            mrna,
            index,
        } => {
            let mut config = load_config(config.as_ref())?;
            prepare(&mut config, &refgene, &reference, &mrna, &index)?;
        }
        Commands::Snv { input, vcf, db } => {
            let config = load_config(db.config.as_ref())?;
            let database = load_database(&config, &db)?;
            let parsed = if vcf {
                read_vcf_from_path(&input)
            } else {
                read_snvs_from_path(&input)
            }
            .with_context(|| format!("could not read {:?}", input))?;
            for e in parsed.skipped.iter() {
                debug!("skipped: {}", e);
            }
            let annotator = Annotator::new(&config, &database.transcripts, &database.index);
            let records = annotator.annotate_snvs(parsed.records)?;
            write_json_lines_to_path(db.output.as_ref(), &records)?;
        }
        Commands::Cnv { input, db } => {
            let config = load_config(db.config.as_ref())?;
            let database = load_database(&config, &db)?;
            let parsed = read_cnvs_from_path(&input)
                .with_context(|| format!("could not read {:?}", input))?;
            for e in parsed.skipped.iter() {
                debug!("skipped: {}", e);
            }
            let annotator = Annotator::new(&config, &database.transcripts, &database.index);
            let records = annotator.annotate_cnvs(parsed.records)?;
            write_json_lines_to_path(db.output.as_ref(), &records)?;
        }
    }

    info!(
        "finished in {:?}; peak memory usage {:.2} GB",
        start_time.elapsed(),
        PEAK_ALLOC.peak_usage_as_gb()
    );
    Ok(())
}
