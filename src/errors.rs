use thiserror::Error;

/// The error taxonomy of the annotation pipeline.
///
/// Only some of these are fatal. A [AnnoError::MalformedRecord] is collected by the record
/// readers and the offending line is skipped, and a [AnnoError::SequenceUnavailable] only
/// degrades the completeness of the affected transcript. Everything else aborts the run.
#[derive(Error, Debug)]
pub enum AnnoError {
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
    #[error("chromosome `{0}` is not in the configured chromosome table")]
    UnknownChromosome(String),
    #[error("no sequence available for transcript `{0}`")]
    SequenceUnavailable(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AnnoError {
    /// Builds a [AnnoError::MalformedRecord] for the given 1-based line number.
    pub fn malformed<T: ToString>(line: usize, reason: T) -> AnnoError {
        AnnoError::MalformedRecord {
            line,
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if the pipeline can skip past this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnnoError::MalformedRecord { .. } | AnnoError::SequenceUnavailable(_)
        )
    }
}

pub type AnnoResult<T> = std::result::Result<T, AnnoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable() {
        assert!(AnnoError::malformed(3, "bad start").is_recoverable());
        assert!(AnnoError::SequenceUnavailable(String::from("NM_1")).is_recoverable());
        assert!(!AnnoError::UnknownChromosome(String::from("chrUn")).is_recoverable());
        assert_eq!(
            AnnoError::malformed(3, "bad start").to_string(),
            "malformed record at line 3: bad start"
        );
    }
}
