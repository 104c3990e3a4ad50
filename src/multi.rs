//! # Multi-cohort reader (§4.3)
//!
//! Runs N single-cohort [`Reader`]s in lockstep over genomic coordinate,
//! merges same-position records, tallies population allele counts per group,
//! and applies an optional filter callback. Grounded on the merge/tally loop
//! in `vcfgrpaf::main` (`examples/other_examples/633a8dbb_...-main.rs.rs`):
//! a `HashMap<String, Vec<bool>>` of per-group sample masks reduced into
//! `AC{g}`/`AN{g}` INFO values while walking one VCF; generalized here from
//! one input stream to a pending-slot k-way merge across N stores.
use log::{debug, trace};

use crate::error::{Error, Result};
use crate::group::{GroupMask, GroupSpec, MAX_GROUPS};
use crate::reader::Reader;
use crate::store::Store;
use crate::types::{GtCode, Haplotypes, OutputRecord, Site};

/// Samples below this count use the direct per-sample, per-group loop;
/// at or above it, the precomputed 256-entry mask table is used instead
/// (§9 "Dense vs sparse group counting"). Both paths must agree exactly.
const DENSE_TABLE_THRESHOLD: usize = 512;

type FilterFn<'a> = dyn FnMut(&OutputRecord) -> bool + 'a;

struct Prepared {
    /// `(child index, source sample index within that child)`, in output
    /// column order — length `totalOut` (§4.3 "Prepare").
    sample_idx: Vec<(usize, usize)>,
    /// Per-output-sample group mask, parallel to `sample_idx`.
    group: Vec<GroupMask>,
}

/// Synthesized output header fields (§4.3 "Prepare", §6.3). A plain data
/// description, not a constructed htslib `Header` — header text rendering is
/// an external collaborator (§1).
#[derive(Debug, Clone)]
pub struct MergedHeader {
    pub info_lines: Vec<String>,
    pub format_lines: Vec<String>,
    pub alt_lines: Vec<String>,
    pub contig_lines: Vec<String>,
    pub sample_names: Vec<String>,
}

fn build_header(children: &[Reader<'_>]) -> Result<MergedHeader> {
    let mut info_lines = vec![
        r#"##INFO=<ID=AC,Number=A,Type=Integer,Description="Allele count">"#.to_string(),
        r#"##INFO=<ID=AN,Number=1,Type=Integer,Description="Total allele count">"#.to_string(),
    ];
    for g in 1..=MAX_GROUPS {
        info_lines.push(format!(
            r#"##INFO=<ID=AC{g},Number=A,Type=Integer,Description="Allele count in group {g}">"#
        ));
        info_lines.push(format!(
            r#"##INFO=<ID=AN{g},Number=1,Type=Integer,Description="Total allele count in group {g}">"#
        ));
    }
    info_lines.push(r#"##INFO=<ID=END,Number=1,Type=Integer,Description="End position">"#.to_string());
    let format_lines = vec![r#"##FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype">"#.to_string()];
    let alt_lines = ["M", "DEL", "DUP", "INS", "INV", "DUP:TANDEM", "DEL:ME", "INS:ME"]
        .iter()
        .map(|id| format!(r#"##ALT=<ID={id},Description="{id}">"#))
        .collect();

    let contig_lines = if let Some(first) = children.first() {
        let header = first.store().header();
        let mut lines = Vec::with_capacity(header.contig_count() as usize);
        for rid in 0..header.contig_count() {
            let name = header.rid2name(rid).map_err(|e| Error::Format {
                prefix: first.store().prefix().to_string(),
                message: format!("unreadable contig name for rid {rid}: {e}"),
            })?;
            lines.push(format!("##contig=<ID={}>", String::from_utf8_lossy(name)));
        }
        for other in &children[1..] {
            let other_header = other.store().header();
            if other_header.contig_count() != header.contig_count() {
                return Err(Error::Format {
                    prefix: other.store().prefix().to_string(),
                    message: "contig dictionary disagrees with the first store".to_string(),
                });
            }
            for rid in 0..header.contig_count() {
                let a = header.rid2name(rid).map_err(|e| Error::Format {
                    prefix: first.store().prefix().to_string(),
                    message: e.to_string(),
                })?;
                let b = other_header.rid2name(rid).map_err(|e| Error::Format {
                    prefix: other.store().prefix().to_string(),
                    message: e.to_string(),
                })?;
                if a != b {
                    return Err(Error::Format {
                        prefix: other.store().prefix().to_string(),
                        message: format!(
                            "contig dictionary disagrees with the first store at rid {rid}"
                        ),
                    });
                }
            }
        }
        lines
    } else {
        Vec::new()
    };

    let mut sample_names = Vec::new();
    for child in children {
        for &s in child.selected_samples() {
            sample_names.push(child.store().samples().row(s).name.clone());
        }
    }

    Ok(MergedHeader {
        info_lines,
        format_lines,
        alt_lines,
        contig_lines,
        sample_names,
    })
}

/// Merges N single-cohort readers into one population-annotated stream
/// (§4.3).
pub struct MultiReader<'a> {
    children: Vec<Reader<'a>>,
    pending: Vec<Option<(Site, Haplotypes)>>,
    num_groups: usize,
    no_gt: bool,
    compute_ac: bool,
    prepared: Option<Prepared>,
    header: Option<MergedHeader>,
    filter: Option<Box<FilterFn<'a>>>,
}

impl<'a> MultiReader<'a> {
    pub fn new(children: Vec<Reader<'a>>) -> Self {
        let n = children.len();
        MultiReader {
            children,
            pending: (0..n).map(|_| None).collect(),
            num_groups: 0,
            no_gt: false,
            compute_ac: false,
            prepared: None,
            header: None,
            filter: None,
        }
    }

    pub fn set_no_gt(&mut self, no_gt: bool) {
        self.no_gt = no_gt;
    }

    /// `SET_AC` (§6.4): compute AN/AC and per-group AN/AC.
    pub fn set_compute_ac(&mut self, compute_ac: bool) {
        self.compute_ac = compute_ac;
    }

    /// Install the discard filter (§4.3 step 8): returning `true` drops the
    /// record before it reaches the caller.
    pub fn set_filter<F>(&mut self, f: F)
    where
        F: FnMut(&OutputRecord) -> bool + 'a,
    {
        self.filter = Some(Box::new(f));
    }

    /// Forwards to every child Reader; increments the shared group counter
    /// (§4.3 "AddGroup").
    pub fn add_group(&mut self, spec: &GroupSpec) -> Result<()> {
        if self.num_groups >= MAX_GROUPS {
            return Err(Error::TooManyGroups);
        }
        for child in &mut self.children {
            child.add_group(spec)?;
        }
        self.num_groups += 1;
        self.prepared = None;
        self.header = None;
        Ok(())
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn header(&self) -> Option<&MergedHeader> {
        self.header.as_ref()
    }

    /// The first child's store, for callers that need contig-name lookups
    /// (e.g. rendering output) without reopening a store the merge already
    /// holds open.
    pub fn first_store(&self) -> Option<&Store> {
        self.children.first().map(Reader::store)
    }

    /// Calls `Prepare` on each child, then computes `sampleIdx[]`, `group[]`,
    /// and the synthesized output header (§4.3 "Prepare").
    pub fn prepare(&mut self) -> Result<()> {
        if self.prepared.is_some() {
            return Ok(());
        }
        if self.num_groups == 0 {
            self.add_group(&GroupSpec::All)?;
        }
        for child in &mut self.children {
            child.prepare()?;
        }

        let mut sample_idx = Vec::new();
        let mut group = Vec::new();
        for (ci, child) in self.children.iter().enumerate() {
            for (j, &s) in child.selected_samples().iter().enumerate() {
                sample_idx.push((ci, s));
                group.push(child.group_masks()[j]);
            }
        }

        self.header = Some(build_header(&self.children)?);
        self.prepared = Some(Prepared { sample_idx, group });
        Ok(())
    }

    fn total_out(&self) -> usize {
        self.prepared.as_ref().map_or(0, |p| p.sample_idx.len())
    }

    fn child_offset(&self, child: usize) -> usize {
        self.prepared
            .as_ref()
            .map(|p| p.sample_idx.iter().take_while(|&&(c, _)| c != child).count())
            .unwrap_or(0)
    }

    fn fill_pending(&mut self) -> Result<()> {
        for i in 0..self.children.len() {
            if self.pending[i].is_none() {
                self.pending[i] = self.children[i].read_raw()?;
            }
        }
        Ok(())
    }

    /// Pulls and merges the next record (§4.3 "ReadOne" steps 1-9). Applies
    /// the installed filter, looping to the next candidate on discard.
    pub fn read(&mut self) -> Result<Option<OutputRecord>> {
        self.prepare()?;
        loop {
            self.fill_pending()?;
            trace!(
                "polled {} children, {} pending",
                self.children.len(),
                self.pending.iter().filter(|s| s.is_some()).count()
            );
            let Some(chosen_idx) = self
                .pending
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| slot.as_ref().map(|(site, _)| (i, site.sort_key_owned())))
                .min_by(|(_, a), (_, b)| a.cmp(b))
                .map(|(i, _)| i)
            else {
                return Ok(None);
            };

            let chosen_site = self.pending[chosen_idx].as_ref().unwrap().0.clone();
            let identity = (
                chosen_site.rid,
                chosen_site.pos,
                chosen_site.rlen,
                chosen_site.reference().to_string(),
            );

            let mut max_alleles = chosen_site.allele_count();
            for slot in &self.pending {
                if let Some((site, _)) = slot {
                    let key = (site.rid, site.pos, site.rlen, site.reference().to_string());
                    if key == identity {
                        max_alleles = max_alleles.max(site.allele_count());
                    }
                }
            }

            let total_out = self.total_out();
            let missing = Haplotypes::missing(2 * total_out);
            let mut plane0 = missing.plane0;
            let mut plane1 = missing.plane1;

            for (ci, _) in self.children.iter().enumerate() {
                let matches = self.pending[ci].as_ref().is_some_and(|(site, _)| {
                    (site.rid, site.pos, site.rlen, site.reference().to_string()) == identity
                });
                if !matches {
                    continue;
                }
                let (_, haplotypes) = self.pending[ci].take().unwrap();
                let offset = 2 * self.child_offset(ci);
                plane0[offset..offset + haplotypes.len()].copy_from_slice(&haplotypes.plane0);
                plane1[offset..offset + haplotypes.len()].copy_from_slice(&haplotypes.plane1);
            }

            let haplotypes = Haplotypes { plane0, plane1 };

            let mut alleles = vec![chosen_site.reference().to_string()];
            if let Some(alt1) = chosen_site.alts().first() {
                alleles.push(alt1.clone());
            }
            if max_alleles > 2 {
                alleles.push("<M>".to_string());
            }
            let end = OutputRecord::derive_end(
                chosen_site.pos,
                chosen_site.rlen,
                &alleles[0],
            );

            let (an, ac, group_an, group_ac) = if self.compute_ac {
                let counts = tally_global(&haplotypes);
                let an = counts[0] + counts[1] + counts[3];
                let ac = if max_alleles > 2 {
                    vec![counts[1], counts[3]]
                } else {
                    vec![counts[1]]
                };
                let (group_an, group_ac) = if self.num_groups > 1 {
                    self.tally_groups(&haplotypes, max_alleles > 2)
                } else {
                    (Vec::new(), Vec::new())
                };
                (Some(an), Some(ac), group_an, group_ac)
            } else {
                (None, None, Vec::new(), Vec::new())
            };

            let genotypes = if self.no_gt {
                None
            } else {
                Some(haplotypes.format_bytes())
            };

            let record = OutputRecord {
                rid: chosen_site.rid,
                pos: chosen_site.pos,
                rlen: chosen_site.rlen,
                alleles,
                end,
                an,
                ac,
                group_an,
                group_ac,
                genotypes,
            };

            let discard = self
                .filter
                .as_mut()
                .map(|f| f(&record))
                .unwrap_or(false);
            if discard {
                debug!(
                    "discarding record at rid {} pos {} (filter callback)",
                    record.rid,
                    record.pos + 1
                );
                continue;
            }
            return Ok(Some(record));
        }
    }

    fn tally_groups(&self, haplotypes: &Haplotypes, synthetic_m: bool) -> (Vec<u32>, Vec<u32>) {
        let masks = &self.prepared.as_ref().unwrap().group;
        let codes: Vec<(GtCode, GtCode)> = (0..masks.len())
            .map(|j| (haplotypes.code_at(2 * j), haplotypes.code_at(2 * j + 1)))
            .collect();

        let (an_g, alt1_g, other_g) = if masks.len() < DENSE_TABLE_THRESHOLD {
            tally_groups_dense(self.num_groups, masks, &codes)
        } else {
            tally_groups_table(self.num_groups, masks, &codes)
        };

        let mut group_ac = Vec::with_capacity(self.num_groups);
        for g in 0..self.num_groups {
            if synthetic_m {
                group_ac.push(vec![alt1_g[g], other_g[g]]);
            } else {
                group_ac.push(vec![alt1_g[g]]);
            }
        }
        (an_g, group_ac)
    }
}

fn tally_global(haplotypes: &Haplotypes) -> [u32; 4] {
    let mut counts = [0u32; 4];
    for c in 0..haplotypes.len() {
        counts[haplotypes.code_at(c).bucket()] += 1;
    }
    counts
}

/// Direct per-sample, per-group loop (§9 "Dense vs sparse group counting").
fn tally_groups_dense(
    num_groups: usize,
    masks: &[GroupMask],
    codes: &[(GtCode, GtCode)],
) -> (Vec<u32>, Vec<u32>, Vec<u32>) {
    let mut an_g = vec![0u32; num_groups];
    let mut alt1_g = vec![0u32; num_groups];
    let mut other_g = vec![0u32; num_groups];
    for (mask, &(c0, c1)) in masks.iter().zip(codes) {
        for g in 0..num_groups {
            if !mask.contains(g) {
                continue;
            }
            for c in [c0, c1] {
                match c.bucket() {
                    0 => an_g[g] += 1,
                    1 => {
                        an_g[g] += 1;
                        alt1_g[g] += 1;
                    }
                    2 => {}
                    3 => {
                        an_g[g] += 1;
                        other_g[g] += 1;
                    }
                    _ => unreachable!(),
                }
            }
        }
    }
    (an_g, alt1_g, other_g)
}

/// Precomputed 256-entry mask-byte table, reduced into per-group totals
/// (§9 "Dense vs sparse group counting"). Must agree exactly with
/// `tally_groups_dense`.
fn tally_groups_table(
    num_groups: usize,
    masks: &[GroupMask],
    codes: &[(GtCode, GtCode)],
) -> (Vec<u32>, Vec<u32>, Vec<u32>) {
    let mut table_an = [0u32; 256];
    let mut table_alt1 = [0u32; 256];
    let mut table_other = [0u32; 256];
    for (mask, &(c0, c1)) in masks.iter().zip(codes) {
        let byte = mask.0 as usize;
        for c in [c0, c1] {
            match c.bucket() {
                0 => table_an[byte] += 1,
                1 => {
                    table_an[byte] += 1;
                    table_alt1[byte] += 1;
                }
                2 => {}
                3 => {
                    table_an[byte] += 1;
                    table_other[byte] += 1;
                }
                _ => unreachable!(),
            }
        }
    }

    let mut an_g = vec![0u32; num_groups];
    let mut alt1_g = vec![0u32; num_groups];
    let mut other_g = vec![0u32; num_groups];
    for byte in 0..256usize {
        if table_an[byte] == 0 && table_alt1[byte] == 0 && table_other[byte] == 0 {
            continue;
        }
        for g in 0..num_groups {
            if byte & (1 << g) != 0 {
                an_g[g] += table_an[byte];
                alt1_g[g] += table_alt1[byte];
                other_g[g] += table_other[byte];
            }
        }
    }
    (an_g, alt1_g, other_g)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GroupMask;
    use crate::types::GtCode;

    fn mask(bits: u8) -> GroupMask {
        GroupMask(bits)
    }

    #[test]
    fn dense_and_table_strategies_agree() {
        let masks = vec![mask(0b001), mask(0b011), mask(0b010), mask(0b111), mask(0b100)];
        let codes = vec![
            (GtCode::Ref, GtCode::Alt1),
            (GtCode::Missing, GtCode::AltOther),
            (GtCode::Alt1, GtCode::Alt1),
            (GtCode::Ref, GtCode::Ref),
            (GtCode::AltOther, GtCode::Missing),
        ];
        let dense = tally_groups_dense(3, &masks, &codes);
        let table = tally_groups_table(3, &masks, &codes);
        assert_eq!(dense, table);
    }
}
