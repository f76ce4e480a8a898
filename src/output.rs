use crate::utils::get_writer;
use anyhow::Context;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Writes one JSON object per record and line.
pub fn write_json_lines<W: Write, T: Serialize>(mut w: W, records: &[T]) -> anyhow::Result<()> {
    for rec in records {
        serde_json::to_writer(&mut w, rec)?;
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

/// Writes JSON lines to `file_path`, or to stdout if it is `None` or `-`.
pub fn write_json_lines_to_path<P: AsRef<Path>, T: Serialize>(
    file_path: Option<P>,
    records: &[T],
) -> anyhow::Result<()> {
    let name = file_path
        .as_ref()
        .map(|p| p.as_ref().display().to_string())
        .unwrap_or_else(|| String::from("-"));
    let w = get_writer(file_path).with_context(|| format!("could not create {}", name))?;
    write_json_lines(w, records)?;
    info!("wrote {} records to {}", records.len(), name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotatedRecord, Annotation};
    use crate::variant::{parse_other_info, Variant};

    #[test]
    fn test_json_lines() {
        let rec = AnnotatedRecord {
            variant: Variant::normalize("1", 100, "AT", "A"),
            annotations: vec![Annotation::intergenic()],
            other_info: parse_other_info("DP=10"),
        };
        let mut buf = Vec::new();
        write_json_lines(&mut buf, &[rec.clone(), rec]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let v: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(v["variant"]["ref"], "T");
        assert_eq!(v["variant"]["start"], 101);
        assert_eq!(v["annotations"][0]["region"], "intergenic");
        assert_eq!(v["annotations"][0]["gene_entrez_id"], "");
        assert_eq!(v["other_info"]["DP"], "10");
    }
}
