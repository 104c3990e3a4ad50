//! # Core record types
//!
//! `Site` and the 2-bit genotype code, shared by the single-cohort and
//! multi-cohort readers. Grounded on the shape of
//! `constrain::repeat::RepeatReferenceInfo`: a plain, debuggable struct that
//! carries reference-genome coordinates and nothing else.

/// One variant-metadata record (§3.1 "Site").
#[derive(Debug, Clone)]
pub struct Site {
    /// Contig index into the store's header.
    pub rid: usize,
    /// 0-based start position.
    pub pos: i64,
    /// Reference length (may differ from `alleles[0].len()` for symbolic
    /// or structural ALTs).
    pub rlen: i64,
    /// REF at index 0, ALT at indices 1..
    pub alleles: Vec<String>,
    /// The row-id decoded from the `_row` INFO field: the key used to seek
    /// the genotype matrix.
    pub row_id: i64,
}

impl Site {
    pub fn allele_count(&self) -> usize {
        self.alleles.len()
    }

    pub fn reference(&self) -> &str {
        &self.alleles[0]
    }

    pub fn alts(&self) -> &[String] {
        &self.alleles[1..]
    }

    /// Total order used for merge alignment and output ordering (§4.3 step 3,
    /// §8 invariant 4): `(rid, pos, rlen, REF, each ALT)`.
    pub fn sort_key(&self) -> (usize, i64, i64, &str, &[String]) {
        (self.rid, self.pos, self.rlen, self.reference(), self.alts())
    }

    /// Owned form of [`Site::sort_key`], used where the comparison key must
    /// outlive a mutable borrow of the `Site` it was taken from (§4.3 step 3:
    /// the k-way merge compares pending sites across readers while later
    /// consuming them).
    pub fn sort_key_owned(&self) -> (usize, i64, i64, String, Vec<String>) {
        (
            self.rid,
            self.pos,
            self.rlen,
            self.reference().to_string(),
            self.alts().to_vec(),
        )
    }
}

/// A 2-bit genotype code (§3.1 "Genotype code").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GtCode {
    /// `00`
    Ref,
    /// `01`
    Alt1,
    /// `10` — missing
    Missing,
    /// `11` — some non-REF, non-first-ALT allele
    AltOther,
}

impl GtCode {
    /// Decode from the two bit-planes at a given haplotype column:
    /// `(a[0][c], a[1][c])`.
    pub fn from_bits(a0: u8, a1: u8) -> Self {
        match (a0, a1) {
            (0, 0) => GtCode::Ref,
            (1, 0) => GtCode::Alt1,
            (0, 1) => GtCode::Missing,
            (1, 1) => GtCode::AltOther,
            _ => panic!("genotype bit planes must be 0 or 1, got ({a0}, {a1})"),
        }
    }

    pub fn to_bits(self) -> (u8, u8) {
        match self {
            GtCode::Ref => (0, 0),
            GtCode::Alt1 => (1, 0),
            GtCode::Missing => (0, 1),
            GtCode::AltOther => (1, 1),
        }
    }

    /// True if this code counts as missing for AN/AC tallying (§4.3 step 6).
    pub fn is_missing(self) -> bool {
        matches!(self, GtCode::Missing)
    }

    /// Index into a 4-bucket `[ref, alt1, missing, alt_other]` histogram
    /// (§4.3 step 6: "tally the `2*totalOut` haplotype codes into a 4-bucket
    /// histogram").
    pub fn bucket(self) -> usize {
        match self {
            GtCode::Ref => 0,
            GtCode::Alt1 => 1,
            GtCode::Missing => 2,
            GtCode::AltOther => 3,
        }
    }

    /// The fixed FORMAT-byte mapping from §4.2: `{00->(0+1)<<1, 01->(1+1)<<1,
    /// 10->0<<1, 11->(2+1)<<1}`. The result is a typed allele-index byte in
    /// the output record's convention, with the phasing bit left clear.
    pub fn to_format_byte(self) -> u8 {
        match self {
            GtCode::Ref => 1 << 1,
            GtCode::Alt1 => 2 << 1,
            GtCode::Missing => 0 << 1,
            GtCode::AltOther => 3 << 1,
        }
    }
}

/// Two parallel bit-planes for a single site, one byte (0 or 1) per
/// haplotype column, after column subsetting (§3.1, §6.2).
#[derive(Debug, Clone, Default)]
pub struct Haplotypes {
    pub plane0: Vec<u8>,
    pub plane1: Vec<u8>,
}

impl Haplotypes {
    pub fn len(&self) -> usize {
        self.plane0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plane0.is_empty()
    }

    pub fn code_at(&self, col: usize) -> GtCode {
        GtCode::from_bits(self.plane0[col], self.plane1[col])
    }

    /// All-missing haplotypes for `n` columns (§4.3 step 5, absent child).
    pub fn missing(n: usize) -> Self {
        Haplotypes {
            plane0: vec![0; n],
            plane1: vec![1; n],
        }
    }

    /// FORMAT-byte-encoded genotypes for every column, per §4.2's fixed
    /// mapping.
    pub fn format_bytes(&self) -> Vec<u8> {
        (0..self.len())
            .map(|c| self.code_at(c).to_format_byte())
            .collect()
    }
}

/// A fully materialized output record (§3.1 "Output record"): a site plus
/// the annotations a reader or merge can attach. The textual rendering of
/// this (VCF/BCF text) is an external collaborator per §1 — this struct is
/// the core's data contract with that collaborator, not a format.
#[derive(Debug, Clone)]
pub struct OutputRecord {
    pub rid: usize,
    pub pos: i64,
    pub rlen: i64,
    /// REF at index 0, ALTs after. May include the synthetic `<M>` allele
    /// appended by a merge (§4.3 step 4).
    pub alleles: Vec<String>,
    /// Set when `rlen` differs from the length of `alleles[0]` (§3.1).
    pub end: Option<i64>,
    pub an: Option<u32>,
    pub ac: Option<Vec<u32>>,
    /// Per-group AN, indexed by group `g`. Empty unless group counting was
    /// requested and more than one group is active (§4.3 step 7).
    pub group_an: Vec<u32>,
    /// Per-group AC, indexed by group `g`, each entry shaped like `ac`.
    pub group_ac: Vec<Vec<u32>>,
    /// FORMAT-byte-encoded genotypes, `2 * samples` long, in sample order.
    /// `None` when the `NO_GT` flag suppresses genotype output (§6.4).
    pub genotypes: Option<Vec<u8>>,
}

impl OutputRecord {
    /// `END` info value per §3.1: set only when the reported `rlen` differs
    /// from the length of the REF allele.
    pub fn derive_end(pos: i64, rlen: i64, ref_allele: &str) -> Option<i64> {
        if rlen != ref_allele.len() as i64 {
            Some(pos + rlen)
        } else {
            None
        }
    }
}
