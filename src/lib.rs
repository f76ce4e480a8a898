//! varanno annotates genomic variants (point substitutions, insertions, deletions, multi-base
//! substitutions and copy-number changes) against a reference transcript model in the
//! [UCSC refGene](https://genome.ucsc.edu/cgi-bin/hgTables) layout. For every variant and every
//! transcript it hits, it reports the affected region, the nucleotide and protein change in
//! HGVS-like nomenclature and an event class, and it resolves which transcripts are worth
//! reporting when several of them overlap.
//!
//! The database is prepared once ([prepare::prepare]) from a gene model and a genome FASTA: a
//! store of transcript sequences and a windowed [genome_index::GenomeIndex] of the transcripts.
//! Variants are then normalized ([variant::Variant::normalize]), looked up in the index and
//! annotated by the [annotation::Annotator].

pub mod annotation;
pub mod consequence;
pub mod errors;
pub mod genome_index;
pub mod options;
pub mod output;
pub mod prepare;
pub mod reader;
pub mod sequence;
pub mod transcript;
pub mod utils;
pub mod variant;

pub use annotation::{AnnotatedRecord, Annotation, Annotator};
pub use errors::{AnnoError, AnnoResult};
pub use options::AnnoConfig;
pub use sequence::Sequence;
pub use transcript::{Transcript, TranscriptSet};
pub use variant::{Cnv, MutationKind, Variant};
