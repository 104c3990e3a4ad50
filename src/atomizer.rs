//! # Allele atomization (§4.4)
//!
//! Decomposes a multi-allelic, multi-nucleotide site into per-position
//! "atoms" and rewrites per-sample genotype codes to refer to the atomized
//! alleles. The CIGAR-walk shape (running ref/alt cursors, per-op-kind
//! branches, early emission) is grounded on
//! `constrain::allele_length_from_cigar` (`lib.rs`) and the op-classifier
//! helpers in `constrain::utils::cigar` (`consumes_ref`/`consumes_query`);
//! both walk a SAM CIGAR over a read, this walks a REF/ALT alignment CIGAR
//! instead, so a private `CigarOp` replaces `rust_htslib::bam::record::Cigar`.
use crate::error::{Error, Result};
use crate::types::Site;

/// A REF/ALT alignment CIGAR operation (not a read-alignment CIGAR — see
/// module docs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CigarOp {
    /// Match/mismatch block (covers CIGAR `M`, `=`, and `X`: §4.4 step 2
    /// treats all three as one walk case).
    Match(u32),
    Ins(u32),
    Del(u32),
}

fn parse_one_cigar(s: &str) -> Result<Vec<CigarOp>> {
    let malformed = || Error::Format {
        prefix: "atomizer".to_string(),
        message: format!("malformed CIGAR string '{s}'"),
    };

    let mut ops = Vec::new();
    let mut num = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            num.push(c);
            continue;
        }
        let len: u32 = num.parse().map_err(|_| malformed())?;
        num.clear();
        let op = match c {
            'M' | '=' | 'X' => CigarOp::Match(len),
            'I' => CigarOp::Ins(len),
            'D' => CigarOp::Del(len),
            _ => return Err(malformed()),
        };
        ops.push(op);
    }
    if !num.is_empty() {
        return Err(malformed());
    }
    Ok(ops)
}

/// Alignment source priority (§4.4 step 1 a-c), applied when no per-site
/// CIGAR info and no symbolic/rlen-mismatch escape hatch (step 1d) apply.
fn heuristic_cigar(reflen: usize, altlen: usize) -> Vec<CigarOp> {
    if reflen == altlen {
        return vec![CigarOp::Match(reflen as u32)];
    }
    let delta = altlen as i64 - reflen as i64;
    let mut ops = vec![CigarOp::Match(1)];
    let rest = if delta > 0 {
        ops.push(CigarOp::Ins(delta as u32));
        reflen as i64 - 1
    } else {
        ops.push(CigarOp::Del((-delta) as u32));
        altlen as i64 - 1
    };
    if rest > 0 {
        ops.push(CigarOp::Match(rest as u32));
    }
    ops
}

/// One decomposition entity (§3.1 "Atom").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub rid: usize,
    pub pos: i64,
    pub rlen: i64,
    pub reference: String,
    pub alt: String,
    /// Source allele index (1..A-1) in the originating site.
    pub anum: usize,
    /// Per-sample, per-ploidy codes: 0=REF-for-atom, 1=ALT-for-atom,
    /// 2=missing, 3=overlapping-other-atom.
    pub gt: Vec<u8>,
}

impl Atom {
    fn sort_key(&self) -> (usize, i64, i64, &str, &str) {
        (self.rid, self.pos, self.rlen, &self.reference, &self.alt)
    }

    fn overlaps(&self, other: &Atom) -> bool {
        self.pos < other.pos + other.rlen && other.pos < self.pos + self.rlen
    }
}

/// Per-site sample genotype calls at full allele fidelity (not the 2-bit
/// store code, which deliberately loses exact non-first-ALT identity — see
/// §3.1 "Genotype code"). `calls[s * ploidy + p]` is the allele index
/// (`0..allele_count`) called for sample `s`, ploidy slot `p`, or `-1` for
/// missing.
#[derive(Debug, Clone)]
pub struct SiteGenotypes {
    pub ploidy: usize,
    pub calls: Vec<i32>,
}

impl SiteGenotypes {
    pub fn num_samples(&self) -> usize {
        self.calls.len() / self.ploidy.max(1)
    }
}

/// Decompose `site` into atoms, rewriting `genotypes` per atom (§4.4).
/// `cigars`, if given, is one CIGAR string per ALT (index 0 == ALT 1, ...),
/// the per-site info field named in step 1a.
pub fn atomize(site: &Site, genotypes: &SiteGenotypes, cigars: Option<&[String]>) -> Result<Vec<Atom>> {
    let reference = site.reference();
    let num_slots = genotypes.calls.len();
    let mut atoms: Vec<Atom> = Vec::new();

    for (alt_offset, alt) in site.alts().iter().enumerate() {
        let anum = alt_offset + 1;

        let symbolic = alt.starts_with('<') && alt.ends_with('>');
        let rlen_mismatch = site.rlen != reference.len() as i64;
        if symbolic || rlen_mismatch {
            // §4.4 step 1d: skip alignment, whole-allele atom.
            atoms.push(Atom {
                rid: site.rid,
                pos: site.pos,
                rlen: site.rlen,
                reference: reference.to_string(),
                alt: alt.clone(),
                anum,
                gt: vec![0; num_slots],
            });
            continue;
        }

        let ops = match cigars.and_then(|c| c.get(alt_offset)) {
            Some(cigar_str) => parse_one_cigar(cigar_str)?,
            None => heuristic_cigar(reference.len(), alt.len()),
        };

        let ref_bytes = reference.as_bytes();
        let alt_bytes = alt.as_bytes();
        let (mut x, mut y) = (0usize, 0usize);

        for op in ops {
            match op {
                CigarOp::Match(len) => {
                    for j in 0..len as usize {
                        if ref_bytes[x + j] != alt_bytes[y + j] {
                            atoms.push(Atom {
                                rid: site.rid,
                                pos: site.pos + (x + j) as i64,
                                rlen: 1,
                                reference: (ref_bytes[x + j] as char).to_string(),
                                alt: (alt_bytes[y + j] as char).to_string(),
                                anum,
                                gt: vec![0; num_slots],
                            });
                        }
                    }
                    x += len as usize;
                    y += len as usize;
                }
                CigarOp::Ins(len) => {
                    let anchor_ref = ref_bytes[x - 1];
                    let mut alt_seq = vec![anchor_ref];
                    alt_seq.extend_from_slice(&alt_bytes[y..y + len as usize]);
                    atoms.push(Atom {
                        rid: site.rid,
                        pos: site.pos + (x - 1) as i64,
                        rlen: 1,
                        reference: (anchor_ref as char).to_string(),
                        alt: String::from_utf8(alt_seq).expect("ASCII alleles"),
                        anum,
                        gt: vec![0; num_slots],
                    });
                    y += len as usize;
                }
                CigarOp::Del(len) => {
                    let ref_seq = &ref_bytes[x - 1..x + len as usize];
                    atoms.push(Atom {
                        rid: site.rid,
                        pos: site.pos + (x - 1) as i64,
                        rlen: len as i64 + 1,
                        reference: String::from_utf8(ref_seq.to_vec()).expect("ASCII alleles"),
                        alt: (ref_bytes[x - 1] as char).to_string(),
                        anum,
                        gt: vec![0; num_slots],
                    });
                    x += len as usize;
                }
            }
        }
    }

    // §4.4 step 3: stable-sort, compute eq[k].
    atoms.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    let n = atoms.len();
    let mut eq = vec![0usize; n];
    for k in 0..n {
        eq[k] = (0..k)
            .find(|&i| atoms[i].sort_key() == atoms[k].sort_key())
            .unwrap_or(k);
    }
    // anum per atom, captured before the gt rewrite below mutates atoms.
    let anums: Vec<usize> = atoms.iter().map(|a| a.anum).collect();

    // §4.4 step 4: per-sample rewriting, one representative atom at a time.
    let mut allele_count = site.allele_count();
    if allele_count == 0 {
        allele_count = 1;
    }
    for k in 0..n {
        if eq[k] != k {
            continue;
        }
        let mut tr = vec![0u8; allele_count];
        for i in 0..n {
            if eq[i] == k {
                tr[anums[i]] = 1;
            } else if atoms[i].overlaps(&atoms[k]) {
                tr[anums[i]] = 3;
            }
        }

        let ploidy = genotypes.ploidy.max(1);
        for s in 0..genotypes.num_samples() {
            for p in 0..ploidy {
                let idx = s * ploidy + p;
                let c = genotypes.calls[idx];
                atoms[k].gt[idx] = if c < 0 { 2 } else { tr[c as usize] };
            }
        }
    }

    // §4.4 step 5: keep only representatives.
    let representatives: Vec<Atom> = (0..n)
        .zip(atoms)
        .filter(|(k, _)| eq[*k] == *k)
        .map(|(_, a)| a)
        .collect();

    Ok(representatives)
}
