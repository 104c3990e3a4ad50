//! # Sample-metadata table
//!
//! Ordered list of samples with structured attributes, queryable by name or
//! predicate (§3.1 "Sample row", §6.1 `.spl`). Reader shape grounded on
//! `constrain::io::bed`, which parses BED3+ rows with `csv::ReaderBuilder`
//! configured for a headerless, tab-delimited format; here the same builder
//! parses a different delimited shape (`name\tkey=value\tkey=value...`).
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use log::info;

use crate::error::{Error, Result};

/// One entry in the sample-metadata table (§3.1 "Sample row").
///
/// Attributes are kept in a `BTreeMap` rather than a `HashMap` so that
/// predicate evaluation and any debug/serialization of a `SampleRow` is
/// order-stable across runs, matching the teacher's preference for simple,
/// debuggable containers (`RepeatReferenceInfo`, `Karyotype`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRow {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
}

impl SampleRow {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }
}

/// Ordered sample-metadata table. Position in `rows` is the sample index
/// (§3.1), used directly as `2*i`/`2*i+1` haplotype columns.
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    rows: Vec<SampleRow>,
}

impl SampleTable {
    pub fn new(rows: Vec<SampleRow>) -> Self {
        SampleTable { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[SampleRow] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> &SampleRow {
        &self.rows[idx]
    }

    /// Sample index for a given name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.name == name)
    }

    /// Read a `.spl` sample table: one row per line, tab-delimited,
    /// `name\tkey=value\tkey=value...`.
    pub fn read_spl<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .flexible(true)
            .from_path(path)
            .map_err(|e| Error::StoreOpen {
                prefix: path.display().to_string(),
                source: io::Error::new(io::ErrorKind::Other, e),
            })?;

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| Error::Format {
                prefix: path.display().to_string(),
                message: format!("malformed .spl row: {e}"),
            })?;
            let mut fields = record.iter();
            let name = fields
                .next()
                .ok_or_else(|| Error::Format {
                    prefix: path.display().to_string(),
                    message: "empty .spl row, expected a sample name".to_string(),
                })?
                .to_string();

            let mut attrs = BTreeMap::new();
            for field in fields {
                if field.is_empty() {
                    continue;
                }
                let (key, value) = field.split_once('=').ok_or_else(|| Error::Format {
                    prefix: path.display().to_string(),
                    message: format!("malformed attribute '{field}' for sample '{name}'"),
                })?;
                attrs.insert(key.to_string(), value.to_string());
            }

            rows.push(SampleRow { name, attrs });
        }

        info!("read {} samples from {}", rows.len(), path.display());
        Ok(SampleTable::new(rows))
    }
}

/// Opaque capability for evaluating a structured-attribute predicate over a
/// sample row (§9 "Opaque pointer to external BED and predicate
/// evaluators"). The core holds this by shared reference and owns no
/// expression-language parser: no crate in the retrieval pack grounds one,
/// and §1 names it an external collaborator.
pub trait SamplePredicate {
    fn test(&self, row: &SampleRow) -> bool;
}

impl<F> SamplePredicate for F
where
    F: Fn(&SampleRow) -> bool,
{
    fn test(&self, row: &SampleRow) -> bool {
        self(row)
    }
}

/// A minimal, concrete predicate: attribute `key` equals `value`. Provided so
/// the crate is usable end-to-end without every caller writing their own
/// `SamplePredicate` impl; this is not the structured-predicate expression
/// language named in §6.5(c), just the simplest possible instance of the
/// trait.
pub struct AttrEquals {
    pub key: String,
    pub value: String,
}

impl SamplePredicate for AttrEquals {
    fn test(&self, row: &SampleRow) -> bool {
        row.attr(&self.key) == Some(self.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_spl(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn reads_names_and_attrs() {
        let f = write_spl("A\tpop=EUR\tsex=F\nB\tpop=AFR\nC\n");
        let table = SampleTable::read_spl(f.path()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.row(0).name, "A");
        assert_eq!(table.row(0).attr("pop"), Some("EUR"));
        assert_eq!(table.row(0).attr("sex"), Some("F"));
        assert_eq!(table.row(1).attr("pop"), Some("AFR"));
        assert!(table.row(2).attrs.is_empty());
    }

    #[test]
    fn index_of_finds_sample() {
        let f = write_spl("A\nB\nC\n");
        let table = SampleTable::read_spl(f.path()).unwrap();
        assert_eq!(table.index_of("B"), Some(1));
        assert_eq!(table.index_of("Z"), None);
    }

    #[test]
    fn attr_equals_predicate() {
        let f = write_spl("A\tpop=EUR\nB\tpop=AFR\n");
        let table = SampleTable::read_spl(f.path()).unwrap();
        let pred = AttrEquals {
            key: "pop".to_string(),
            value: "EUR".to_string(),
        };
        assert!(pred.test(table.row(0)));
        assert!(!pred.test(table.row(1)));
    }
}
