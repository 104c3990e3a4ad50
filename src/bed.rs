//! # BED-interval filtering
//!
//! Modeled as an opaque `overlap(chr, beg, end) -> bool` capability (§9); the
//! core holds it by shared reference and owns no BED format of its own.
//! `BedFile` is a concrete, minimal reference implementation reusing `csv`
//! exactly as `constrain::io::bed::BedFile` reads BED3+ rows (headerless,
//! tab-delimited), since a BED reader is a reasonable convenience to ship
//! rather than part of the core the spec forbids reimplementing.
use std::collections::HashMap;
use std::io;
use std::path::Path;

use log::info;

use crate::error::{Error, Result};

/// Opaque capability: does `[beg, end)` on `chr` overlap anything this
/// filter knows about?
pub trait IntervalFilter {
    fn overlaps(&self, chr: &str, beg: i64, end: i64) -> bool;
}

#[derive(Debug, Clone, serde::Deserialize)]
struct BedRecord {
    chr: String,
    start: i64,
    end: i64,
}

/// A simple in-memory BED3 interval set, grounded on
/// `constrain::io::bed::BedFile`'s `csv::ReaderBuilder` configuration.
#[derive(Debug, Clone, Default)]
pub struct BedFile {
    intervals: HashMap<String, Vec<(i64, i64)>>,
}

impl BedFile {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .from_path(path)
            .map_err(|e| Error::StoreOpen {
                prefix: path.display().to_string(),
                source: io::Error::new(io::ErrorKind::Other, e),
            })?;

        let mut intervals: HashMap<String, Vec<(i64, i64)>> = HashMap::new();
        for result in reader.deserialize() {
            let record: BedRecord = result.map_err(|e| Error::Format {
                prefix: path.display().to_string(),
                message: format!("malformed BED row: {e}"),
            })?;
            intervals
                .entry(record.chr)
                .or_default()
                .push((record.start, record.end));
        }

        let n: usize = intervals.values().map(Vec::len).sum();
        info!("read {n} BED intervals from {}", path.display());
        Ok(BedFile { intervals })
    }
}

impl IntervalFilter for BedFile {
    fn overlaps(&self, chr: &str, beg: i64, end: i64) -> bool {
        match self.intervals.get(chr) {
            Some(ivs) => ivs.iter().any(|&(s, e)| beg < e && s < end),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detects_overlap() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "chr1\t100\t200").unwrap();
        writeln!(f, "chr2\t0\t10").unwrap();
        let bed = BedFile::from_path(f.path()).unwrap();

        assert!(bed.overlaps("chr1", 150, 160));
        assert!(bed.overlaps("chr1", 50, 101)); // touches [100,200)
        assert!(!bed.overlaps("chr1", 50, 100)); // half-open, no touch
        assert!(!bed.overlaps("chr3", 0, 1000));
    }
}
