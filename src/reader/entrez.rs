use crate::errors::AnnoResult;
use crate::reader::{parse_lines, split_fields};
use crate::utils::get_text_reader_from_path;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use tracing::info;

// tax_id, GeneID, Symbol, LocusTag, Synonyms, dbXrefs, chromosome, map_location,
// description, type_of_gene, Symbol_from_nomenclature_authority
const MIN_FIELDS: usize = 11;

#[derive(Debug, Clone, Default)]
/// Gene symbol to Entrez gene id lookup, built from an NCBI `gene_info` file.
///
/// A symbol is resolved against the official symbols first, then against the symbols
/// from the nomenclature authority and finally against the synonyms. Within each
/// table the first record listing a name wins.
pub struct EntrezIndex {
    by_symbol: HashMap<String, String>,
    by_nomenclature: HashMap<String, String>,
    by_synonym: HashMap<String, String>,
}

impl EntrezIndex {
    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    /// Returns the Entrez id of `symbol`, if known.
    pub fn lookup(&self, symbol: &str) -> Option<&str> {
        self.by_symbol
            .get(symbol)
            .or_else(|| self.by_nomenclature.get(symbol))
            .or_else(|| self.by_synonym.get(symbol))
            .map(|s| s.as_str())
    }

    /// Reads a `gene_info` table from any buffered reader. Malformed lines are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> AnnoResult<EntrezIndex> {
        let parsed = parse_lines(reader, "gene_info", |line, no| {
            let fields = split_fields(line, no, MIN_FIELDS)?;
            Ok(vec![(
                fields[1].trim().to_string(),
                fields[2].trim().to_string(),
                fields[4].trim().to_string(),
                fields[10].trim().to_string(),
            )])
        })?;

        let mut index = EntrezIndex::default();
        for (id, symbol, synonyms, nomenclature) in parsed.records {
            index.by_symbol.entry(symbol).or_insert_with(|| id.clone());
            if nomenclature != "-" && !nomenclature.is_empty() {
                index
                    .by_nomenclature
                    .entry(nomenclature)
                    .or_insert_with(|| id.clone());
            }
            for syn in synonyms.split('|').filter(|s| *s != "-" && !s.is_empty()) {
                index
                    .by_synonym
                    .entry(syn.to_string())
                    .or_insert_with(|| id.clone());
            }
        }
        Ok(index)
    }

    /// Reads a plain or gzipped `gene_info` file.
    pub fn from_path<T: AsRef<Path>>(file_path: T) -> AnnoResult<EntrezIndex> {
        let index = EntrezIndex::from_reader(get_text_reader_from_path(file_path.as_ref())?)?;
        info!(
            "read {} gene symbols from {:?}",
            index.len(),
            file_path.as_ref()
        );
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_order() {
        let text = "#tax_id\tGeneID\tSymbol\tLocusTag\tSynonyms\tdbXrefs\tchromosome\tmap_location\tdescription\ttype_of_gene\tSymbol_from_nomenclature_authority\n\
9606\t7157\tTP53\t-\tBCC7|LFS1|P53\t-\t17\t17p13.1\ttumor protein p53\tprotein-coding\tTP53\n\
9606\t1\tA1BG\t-\tA1B|ABG|P53\t-\t19\t19q13.43\talpha-1-B glycoprotein\tprotein-coding\tA1BG-X\n\
9606\tbroken\n";
        let index = EntrezIndex::from_reader(text.as_bytes()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("TP53"), Some("7157"));
        assert_eq!(index.lookup("A1BG-X"), Some("1"));
        // the first record listing a synonym wins
        assert_eq!(index.lookup("P53"), Some("7157"));
        assert_eq!(index.lookup("NOPE"), None);
    }
}
