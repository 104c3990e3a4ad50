//! # Store (§4.1)
//!
//! Binds one variant-metadata stream, its coordinate index, the genotype
//! matrix, and the sample table under a single filesystem prefix (§3.1
//! "Store", §6.1). Grounded on `constrain::io::vcf::read_trs`'s open-one-VCF
//! call (`Reader::from_path(...)`, `.header().to_owned()`), generalized from
//! "one artifact opened for one call site" to "four co-located artifacts
//! held together, immutably, for the lifetime of a `Reader`".
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use rust_htslib::bcf;

use crate::error::{Error, Result};
use crate::pbf::PbfReader;
use crate::sample::SampleTable;

fn sibling(prefix: &Path, ext: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// An open handle to one on-disk cohort store (§3.1, §4.1). Immutable after
/// open; the four artifacts are released when this value is dropped.
pub struct Store {
    prefix: String,
    reader: bcf::IndexedReader,
    pbf: PbfReader<std::fs::File>,
    samples: SampleTable,
}

impl Store {
    /// Open the four artifacts sharing `prefix`: `{prefix}.bcf`,
    /// `{prefix}.csi`, `{prefix}.pbf`, `{prefix}.spl`. Fails with
    /// `Error::StoreOpen` if any is missing; no partial open is observable
    /// (the error is returned before any artifact is touched).
    pub fn open<P: AsRef<Path>>(prefix: P) -> Result<Self> {
        let prefix = prefix.as_ref();
        let prefix_str = prefix.display().to_string();

        let bcf_path = sibling(prefix, "bcf");
        let csi_path = sibling(prefix, "csi");
        let pbf_path = sibling(prefix, "pbf");
        let spl_path = sibling(prefix, "spl");

        for (path, suffix) in [
            (&bcf_path, "bcf"),
            (&csi_path, "csi"),
            (&pbf_path, "pbf"),
            (&spl_path, "spl"),
        ] {
            if !path.exists() {
                return Err(Error::StoreOpen {
                    prefix: prefix_str.clone(),
                    source: io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("missing .{suffix} artifact at {}", path.display()),
                    ),
                });
            }
        }

        let reader = bcf::IndexedReader::from_path(&bcf_path).map_err(|e| Error::StoreOpen {
            prefix: prefix_str.clone(),
            source: io::Error::new(io::ErrorKind::Other, e.to_string()),
        })?;
        let pbf = PbfReader::open(&pbf_path)?;
        let samples = SampleTable::read_spl(&spl_path)?;

        info!(
            "opened store at '{prefix_str}': {} samples, {} genotype-matrix rows",
            samples.len(),
            pbf.num_rows(),
        );

        Ok(Store {
            prefix: prefix_str,
            reader,
            pbf,
            samples,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn header(&self) -> &bcf::header::HeaderView {
        self.reader.header()
    }

    pub fn samples(&self) -> &SampleTable {
        &self.samples
    }

    pub(crate) fn bcf_reader_mut(&mut self) -> &mut bcf::IndexedReader {
        &mut self.reader
    }

    pub(crate) fn pbf_mut(&mut self) -> &mut PbfReader<std::fs::File> {
        &mut self.pbf
    }
}
