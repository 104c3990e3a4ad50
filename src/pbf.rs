//! # Genotype-matrix reader (`.pbf`)
//!
//! Random-access reader for the 2-bit-per-haplotype column matrix (§3.1
//! "Genotype code", §6.1 `.pbf`, §6.2). No crate in the retrieval pack
//! implements a packed genotype matrix — the closest teacher code is the
//! low-level, `unsafe`-free I/O style of `constrain::utils::io_utils`, which
//! this follows (plain `std::fs`/`std::io`, explicit byte layout) rather than
//! the one `unsafe`-heavy module the teacher carries
//! (`rhtslib_reimplements`, which is BAM-iterator specific).
//!
//! On-disk layout (fixed-stride, uncompressed — §1 leaves the block
//! compression scheme of this file unspecified, so a concrete but simple
//! scheme is chosen; see DESIGN.md Open Question #2):
//!
//! ```text
//! magic: b"PBF1"            (4 bytes)
//! num_samples: u32 LE       (4 bytes)
//! num_rows: u32 LE          (4 bytes)
//! rows: num_rows * row_len bytes, row_len = 2 * ceil(2*num_samples / 8)
//!   each row is plane0 (packed bits, LSB-first) followed by plane1
//! ```
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::Haplotypes;

const MAGIC: &[u8; 4] = b"PBF1";
const HEADER_LEN: u64 = 12;

fn packed_len(num_columns: usize) -> usize {
    num_columns.div_ceil(8)
}

/// Random-access reader over a `.pbf` genotype matrix.
pub struct PbfReader<R> {
    inner: R,
    num_samples: usize,
    num_rows: u32,
    row_len: u64,
    /// Column selection set by `subset_columns` (§4.2 Prepare): global
    /// haplotype-column indices in `[0, 2*num_samples)`, in output order.
    columns: Vec<usize>,
}

impl PbfReader<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::StoreOpen {
            prefix: path.display().to_string(),
            source: e,
        })?;
        Self::from_reader(file, path.display().to_string())
    }
}

impl<R: Read + Seek> PbfReader<R> {
    fn from_reader(mut inner: R, prefix: String) -> Result<Self> {
        let mut header = [0u8; HEADER_LEN as usize];
        inner.read_exact(&mut header).map_err(|e| Error::Format {
            prefix: prefix.clone(),
            message: format!("truncated .pbf header: {e}"),
        })?;
        if &header[0..4] != MAGIC {
            return Err(Error::Format {
                prefix,
                message: "bad .pbf magic".to_string(),
            });
        }
        let num_samples = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;
        let num_rows = u32::from_le_bytes(header[8..12].try_into().unwrap());
        let row_len = 2 * packed_len(2 * num_samples) as u64;

        Ok(PbfReader {
            inner,
            num_samples,
            num_rows,
            row_len,
            columns: (0..2 * num_samples).collect(),
        })
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn num_rows(&self) -> u32 {
        self.num_rows
    }

    /// Restrict subsequent `read()` calls to these haplotype columns, in the
    /// given order (§4.2 "a column-selection for the genotype-matrix
    /// reader").
    pub fn subset_columns(&mut self, columns: Vec<usize>) {
        self.columns = columns;
    }

    /// Seek to the row for a given row-id (§3.2 invariant 2).
    pub fn seek(&mut self, row_id: i64) -> Result<()> {
        let offset = HEADER_LEN + row_id as u64 * self.row_len;
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Read the two bit-planes at the current row, restricted to the
    /// selected columns (§3.2 invariant 3: exactly `2*|samples|` bits per
    /// plane, in declared sample order).
    pub fn read(&mut self) -> Result<Haplotypes> {
        let packed = packed_len(2 * self.num_samples);
        let mut raw = vec![0u8; 2 * packed];
        self.inner.read_exact(&mut raw)?;

        let (raw0, raw1) = raw.split_at(packed);
        let mut plane0 = Vec::with_capacity(self.columns.len());
        let mut plane1 = Vec::with_capacity(self.columns.len());
        for &col in &self.columns {
            plane0.push(bit_at(raw0, col));
            plane1.push(bit_at(raw1, col));
        }
        Ok(Haplotypes { plane0, plane1 })
    }
}

fn bit_at(packed: &[u8], col: usize) -> u8 {
    (packed[col / 8] >> (col % 8)) & 1
}

fn set_bit(packed: &mut [u8], col: usize, value: u8) {
    if value != 0 {
        packed[col / 8] |= 1 << (col % 8);
    }
}

/// Writes a `.pbf` fixture from row-major `(plane0, plane1)` full-matrix
/// data. This is test-only: there is no ingestion path in this crate (§1
/// Non-goals), but in-memory/temp-file fixtures are needed to exercise the
/// reader without real on-disk stores.
#[cfg(test)]
pub(crate) fn write_fixture<P: AsRef<Path>>(
    path: P,
    num_samples: usize,
    rows: &[(Vec<u8>, Vec<u8>)],
) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(MAGIC)?;
    file.write_all(&(num_samples as u32).to_le_bytes())?;
    file.write_all(&(rows.len() as u32).to_le_bytes())?;

    let packed = packed_len(2 * num_samples);
    for (p0, p1) in rows {
        assert_eq!(p0.len(), 2 * num_samples);
        assert_eq!(p1.len(), 2 * num_samples);
        let mut raw = vec![0u8; 2 * packed];
        let (raw0, raw1) = raw.split_at_mut(packed);
        for (col, &bit) in p0.iter().enumerate() {
            set_bit(raw0, col, bit);
        }
        for (col, &bit) in p1.iter().enumerate() {
            set_bit(raw1, col, bit);
        }
        file.write_all(&raw)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_two_samples_two_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.pbf");
        // E1 from the spec: codes 00,01,00,10 -> planes [0,1,0,0] / [0,0,0,1]
        let rows = vec![
            (vec![0, 1, 0, 0], vec![0, 0, 0, 1]),
            (vec![1, 1, 1, 1], vec![1, 1, 1, 1]),
        ];
        write_fixture(&path, 2, &rows).unwrap();

        let mut reader = PbfReader::open(&path).unwrap();
        assert_eq!(reader.num_samples(), 2);
        assert_eq!(reader.num_rows(), 2);

        reader.seek(0).unwrap();
        let h = reader.read().unwrap();
        assert_eq!(h.plane0, vec![0, 1, 0, 0]);
        assert_eq!(h.plane1, vec![0, 0, 0, 1]);

        reader.seek(1).unwrap();
        let h = reader.read().unwrap();
        assert_eq!(h.plane0, vec![1, 1, 1, 1]);
        assert_eq!(h.plane1, vec![1, 1, 1, 1]);
    }

    #[test]
    fn subset_columns_reorders_and_restricts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.pbf");
        let rows = vec![(vec![0, 1, 1, 0], vec![0, 0, 1, 1])];
        write_fixture(&path, 2, &rows).unwrap();

        let mut reader = PbfReader::open(&path).unwrap();
        // select sample 1 only: columns 2,3
        reader.subset_columns(vec![2, 3]);
        reader.seek(0).unwrap();
        let h = reader.read().unwrap();
        assert_eq!(h.plane0, vec![1, 0]);
        assert_eq!(h.plane1, vec![1, 1]);
    }

    #[test]
    fn random_access_seek_out_of_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.pbf");
        let rows = vec![
            (vec![0, 0], vec![0, 0]),
            (vec![1, 1], vec![0, 0]),
            (vec![0, 1], vec![1, 0]),
        ];
        write_fixture(&path, 1, &rows).unwrap();

        let mut reader = PbfReader::open(&path).unwrap();
        reader.seek(2).unwrap();
        assert_eq!(reader.read().unwrap().plane0, vec![0, 1]);
        reader.seek(0).unwrap();
        assert_eq!(reader.read().unwrap().plane0, vec![0, 0]);
    }
}
