//! # Single-cohort reader (§4.2)
//!
//! Produces `(site, haplotype-bits)` pairs filtered by region, BED, and
//! sample subset, and can materialize them into [`OutputRecord`]s. Grounded
//! on `constrain::io::vcf::read_trs`'s per-record loop
//! (`for record in bcf.records() { ... }`) and its INFO-field extraction
//! helpers (`get_info_int`), generalized to a stateful pull reader with
//! sample-subset bookkeeping; the `SetRegion`/`SetStart` mutual-exclusion
//! state machine follows `constrain::cli`'s pattern of small setter methods
//! validating and mutating `self` in place.
use log::{debug, trace};
use rust_htslib::bcf::{self, Read as BcfRead};

use crate::bed::IntervalFilter;
use crate::error::{Error, Result};
use crate::group::{GroupMask, GroupSpec, MAX_GROUPS};
use crate::store::Store;
use crate::types::{Haplotypes, OutputRecord, Site};

/// Mutually-exclusive position constraint (§4.2 "SetRegion / SetStart"):
/// setting one clears the other.
enum Position {
    None,
    Region { rid: u32, start: i64, end: Option<i64> },
    StartRow(i64),
}

struct Prepared {
    samples: Vec<usize>,
    group: Vec<GroupMask>,
}

/// A single-cohort reader bound to one [`Store`] (§4.2). `'a` is the
/// lifetime of any BED/predicate capability handed to it — the reader holds
/// these by shared reference and owns none of them (§9).
pub struct Reader<'a> {
    store: Store,
    masks: Vec<GroupMask>,
    num_groups: usize,
    position: Position,
    bed: Option<(&'a dyn IntervalFilter, bool)>,
    no_gt: bool,
    prepared: Option<Prepared>,
    fetch_active: bool,
}

impl<'a> Reader<'a> {
    pub fn new(store: Store) -> Self {
        let n = store.samples().len();
        Reader {
            store,
            masks: vec![GroupMask::empty(); n],
            num_groups: 0,
            position: Position::None,
            bed: None,
            no_gt: false,
            prepared: None,
            fetch_active: false,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    /// Suppress FORMAT/sample columns in materialized output (§6.4 `NO_GT`).
    pub fn set_no_gt(&mut self, no_gt: bool) {
        self.no_gt = no_gt;
    }

    /// Append one sample group (§4.2 "AddGroup"). `g` is the current group
    /// count; fails with `TooManyGroups` if it would exceed 8 (§3.2
    /// invariant 4).
    pub fn add_group(&mut self, spec: &GroupSpec) -> Result<()> {
        if self.num_groups >= MAX_GROUPS {
            return Err(Error::TooManyGroups);
        }
        spec.apply(self.store.samples(), self.num_groups, &mut self.masks);
        self.num_groups += 1;
        self.prepared = None;
        Ok(())
    }

    /// Constrain subsequent reads to a region (§4.2 "SetRegion"). Fails with
    /// `BadRegion` if `region` does not parse against the header's contig
    /// dictionary.
    pub fn set_region(&mut self, region: &str) -> Result<()> {
        let (chrom, start, end) = parse_region(region)?;
        let rid = self
            .store
            .header()
            .name2rid(chrom.as_bytes())
            .map_err(|_| Error::BadRegion {
                region: region.to_string(),
                message: format!("unknown contig '{chrom}'"),
            })?;
        self.position = Position::Region { rid, start, end };
        self.fetch_active = false;
        Ok(())
    }

    /// Constrain subsequent reads to rows whose `_row` is `>= row_id`
    /// (§4.2 "SetStart").
    pub fn set_start(&mut self, row_id: i64) {
        self.position = Position::StartRow(row_id);
        self.fetch_active = false;
    }

    /// Attach a BED interval filter (§4.2 "SetBed"). A site is kept iff
    /// `overlap(...) XOR exclude` is true.
    pub fn set_bed(&mut self, filter: &'a dyn IntervalFilter, exclude: bool) {
        self.bed = Some((filter, exclude));
    }

    /// Compute the selected-sample subset and column mapping (§4.2
    /// "Prepare"). Idempotent; called lazily by `read`/`read_raw` if the
    /// caller never calls it directly. Implicitly adds "all samples" as
    /// group 0 if no group was declared.
    pub fn prepare(&mut self) -> Result<()> {
        if self.prepared.is_some() {
            return Ok(());
        }
        if self.num_groups == 0 {
            self.add_group(&GroupSpec::All)?;
        }
        let samples: Vec<usize> = self
            .masks
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_empty())
            .map(|(i, _)| i)
            .collect();
        let group: Vec<GroupMask> = samples.iter().map(|&i| self.masks[i]).collect();

        let mut columns = Vec::with_capacity(samples.len() * 2);
        for &s in &samples {
            columns.push(2 * s);
            columns.push(2 * s + 1);
        }
        self.store.pbf_mut().subset_columns(columns);

        self.prepared = Some(Prepared { samples, group });
        Ok(())
    }

    /// Sample indices selected after `prepare()`, in output-column order.
    pub fn selected_samples(&self) -> &[usize] {
        self.prepared
            .as_ref()
            .map(|p| p.samples.as_slice())
            .unwrap_or(&[])
    }

    /// Per-selected-sample group mask, parallel to `selected_samples()`.
    pub fn group_masks(&self) -> &[GroupMask] {
        self.prepared
            .as_ref()
            .map(|p| p.group.as_slice())
            .unwrap_or(&[])
    }

    /// Pull the next `(site, haplotype-bits)` for the prepared sample
    /// subset (§4.2 "Read" steps 1-4), or `None` at end-of-stream.
    pub fn read_raw(&mut self) -> Result<Option<(Site, Haplotypes)>> {
        self.prepare()?;
        loop {
            let Some(site) = self.next_site()? else {
                return Ok(None);
            };
            if let Some((filter, exclude)) = self.bed {
                let chr = contig_name(self.store.header(), site.rid)?;
                let overlaps = filter.overlaps(&chr, site.pos, site.pos + site.rlen);
                if overlaps == exclude {
                    debug!(
                        "skipping site at {chr}:{} (row {}), BED filter excludes it",
                        site.pos + 1,
                        site.row_id
                    );
                    continue;
                }
            }
            trace!("seeking genotype matrix to row {}", site.row_id);
            self.store.pbf_mut().seek(site.row_id)?;
            let haplotypes = self.store.pbf_mut().read()?;
            return Ok(Some((site, haplotypes)));
        }
    }

    /// Pull the next materialized output record, synthesizing the FORMAT
    /// block unless `NO_GT` is set (§4.2 final paragraph).
    pub fn read(&mut self) -> Result<Option<OutputRecord>> {
        let Some((site, haplotypes)) = self.read_raw()? else {
            return Ok(None);
        };
        let genotypes = if self.no_gt {
            None
        } else {
            Some(haplotypes.format_bytes())
        };
        let end = OutputRecord::derive_end(site.pos, site.rlen, site.reference());
        Ok(Some(OutputRecord {
            rid: site.rid,
            pos: site.pos,
            rlen: site.rlen,
            alleles: site.alleles,
            end,
            an: None,
            ac: None,
            group_an: Vec::new(),
            group_ac: Vec::new(),
            genotypes,
        }))
    }

    fn next_site(&mut self) -> Result<Option<Site>> {
        match self.position {
            Position::Region { rid, start, end } => {
                if !self.fetch_active {
                    self.store
                        .bcf_reader_mut()
                        .fetch(rid, start.max(0) as u64, end.map(|e| e as u64))?;
                    self.fetch_active = true;
                }
                self.pull_record()
            }
            Position::StartRow(start_row) => loop {
                match self.pull_record()? {
                    Some(site) if site.row_id < start_row => continue,
                    other => return Ok(other),
                }
            },
            Position::None => self.pull_record(),
        }
    }

    fn pull_record(&mut self) -> Result<Option<Site>> {
        let mut record = self.store.bcf_reader_mut().empty_record();
        let has_more = self.store.bcf_reader_mut().read(&mut record)?;
        if !has_more {
            return Ok(None);
        }
        Ok(Some(site_from_record(&record)?))
    }
}

fn contig_name(header: &bcf::header::HeaderView, rid: usize) -> Result<String> {
    let name = header.rid2name(rid as u32).map_err(|e| Error::Format {
        prefix: "header".to_string(),
        message: format!("unknown rid {rid}: {e}"),
    })?;
    Ok(String::from_utf8_lossy(name).into_owned())
}

/// Decode one variant-metadata record into a [`Site`] (§4.2 steps 1-2). The
/// `_row` INFO field is a hard invariant (§6.2): its absence is a
/// `FormatError`, not a silently-missing value.
pub(crate) fn site_from_record(record: &bcf::Record) -> Result<Site> {
    let rid = record
        .rid()
        .ok_or_else(|| Error::Format {
            prefix: "variant-metadata".to_string(),
            message: "record has no rid".to_string(),
        })? as usize;
    let pos = record.pos();
    let rlen = record.end() - pos;
    let alleles = record
        .alleles()
        .iter()
        .map(|a| String::from_utf8_lossy(a).into_owned())
        .collect();

    let row_id = record
        .info(b"_row")
        .integer()
        .map_err(|e| Error::Format {
            prefix: "variant-metadata".to_string(),
            message: format!("failed to decode _row: {e}"),
        })?
        .and_then(|v| v.first().copied())
        .ok_or_else(|| Error::Format {
            prefix: "variant-metadata".to_string(),
            message: "required info field '_row' is missing".to_string(),
        })? as i64;

    Ok(Site {
        rid,
        pos,
        rlen,
        alleles,
        row_id,
    })
}

/// Parse `chrom` or `chrom:start-end` (1-based, inclusive) against the
/// header's contig dictionary (§4.2 "SetRegion").
fn parse_region(region: &str) -> Result<(String, i64, Option<i64>)> {
    let malformed = |message: &str| Error::BadRegion {
        region: region.to_string(),
        message: message.to_string(),
    };
    if region.is_empty() {
        return Err(malformed("empty region string"));
    }
    let Some((chrom, range)) = region.split_once(':') else {
        return Ok((region.to_string(), 0, None));
    };
    let (start_s, end_s) = range
        .split_once('-')
        .ok_or_else(|| malformed("expected 'chrom:start-end'"))?;
    let start: i64 = start_s
        .parse()
        .map_err(|_| malformed("start is not an integer"))?;
    let end: i64 = end_s
        .parse()
        .map_err(|_| malformed("end is not an integer"))?;
    if start < 1 || end < start {
        return Err(malformed("start must be >= 1 and end must be >= start"));
    }
    Ok((chrom.to_string(), start - 1, Some(end)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_without_range_spans_whole_contig() {
        let (chrom, start, end) = parse_region("chr1").unwrap();
        assert_eq!(chrom, "chr1");
        assert_eq!(start, 0);
        assert_eq!(end, None);
    }

    #[test]
    fn region_with_range_is_0_based_half_open_end() {
        let (chrom, start, end) = parse_region("chr1:100-200").unwrap();
        assert_eq!(chrom, "chr1");
        assert_eq!(start, 99);
        assert_eq!(end, Some(200));
    }

    #[test]
    fn rejects_malformed_region() {
        assert!(parse_region("").is_err());
        assert!(parse_region("chr1:100").is_err());
        assert!(parse_region("chr1:200-100").is_err());
        assert!(parse_region("chr1:a-b").is_err());
    }
}
