//! End-to-end scenarios over real on-disk stores (spec §8 E1-E4, invariants
//! 1-5). E5 (allele-key normalization) and E6 (atomization) are exercised as
//! unit tests in `src/keyparser.rs`/`src/atomizer.rs`; what needs a full
//! `Store`/`Reader`/`MultiReader` stack is covered here.
//!
//! Fixture construction follows `constrain::io::vcf`'s header/record-writing
//! pattern for the `.bcf` side (`bcf::Header::new()`, `push_record`,
//! `Writer::from_path`, `set_rid`/`set_pos`/`set_alleles`/
//! `push_info_integer`) and `pbf::write_fixture`'s on-disk layout (duplicated
//! here since that helper is test-only and crate-private, invisible across
//! the library/integration-test boundary) for the `.pbf` side.
use std::fs::File;
use std::io::Write;
use std::path::Path;

use rust_htslib::bcf;

use gtstore::group::GroupSpec;
use gtstore::multi::MultiReader;
use gtstore::reader::Reader;
use gtstore::store::Store;

const PBF_MAGIC: &[u8; 4] = b"PBF1";

fn packed_len(n: usize) -> usize {
    n.div_ceil(8)
}

fn set_bit(packed: &mut [u8], col: usize, value: u8) {
    if value != 0 {
        packed[col / 8] |= 1 << (col % 8);
    }
}

fn write_pbf(path: &Path, num_samples: usize, rows: &[(Vec<u8>, Vec<u8>)]) {
    let mut file = File::create(path).unwrap();
    file.write_all(PBF_MAGIC).unwrap();
    file.write_all(&(num_samples as u32).to_le_bytes()).unwrap();
    file.write_all(&(rows.len() as u32).to_le_bytes()).unwrap();

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
        file.write_all(&raw).unwrap();
    }
}

fn write_spl(path: &Path, names: &[&str]) {
    let mut file = File::create(path).unwrap();
    for name in names {
        writeln!(file, "{name}").unwrap();
    }
}

/// One fixture site: `(contig, 0-based pos, alleles, _row)`.
struct FixtureSite {
    contig: &'static str,
    pos: i64,
    alleles: Vec<&'static str>,
    row: i32,
}

fn write_bcf(path: &Path, contigs: &[(&str, u64)], sites: &[FixtureSite]) {
    let mut header = bcf::Header::new();
    for (name, len) in contigs {
        header.push_record(format!("##contig=<ID={name},length={len}>").as_bytes());
    }
    header.push_record(
        br#"##INFO=<ID=_row,Number=1,Type=Integer,Description="Genotype-matrix row-id">"#,
    );

    let mut writer = bcf::Writer::from_path(path, &header, false, bcf::Format::Bcf).unwrap();
    for site in sites {
        let mut record = writer.empty_record();
        let rid = writer.header().name2rid(site.contig.as_bytes()).unwrap();
        record.set_rid(Some(rid));
        record.set_pos(site.pos);
        let alleles: Vec<&[u8]> = site.alleles.iter().map(|a| a.as_bytes()).collect();
        record.set_alleles(&alleles).unwrap();
        record.push_info_integer(b"_row", &[site.row]).unwrap();
        writer.write(&record).unwrap();
    }
    drop(writer);
    bcf::index::build(path, None, 14, bcf::index::Type::Csi).unwrap();
}

/// Builds a store at `dir/<name>` with a single contig `chr1` (length
/// 1,000,000) plus a second contig `chr2` when `two_contigs` is set, and
/// returns the store prefix.
fn build_store(
    dir: &Path,
    name: &str,
    samples: &[&str],
    sites: &[FixtureSite],
    rows: &[(Vec<u8>, Vec<u8>)],
    two_contigs: bool,
) -> String {
    let prefix = dir.join(name);
    let mut contigs = vec![("chr1", 1_000_000u64)];
    if two_contigs {
        contigs.push(("chr2", 1_000_000u64));
    }
    write_bcf(&prefix.with_extension("bcf"), &contigs, sites);
    write_pbf(&prefix.with_extension("pbf"), samples.len(), rows);
    write_spl(&prefix.with_extension("spl"), samples);
    prefix.display().to_string()
}

#[test]
fn e1_single_site_two_samples_all_samples_group() {
    let dir = tempfile::tempdir().unwrap();
    let sites = [FixtureSite {
        contig: "chr1",
        pos: 99,
        alleles: vec!["A", "T"],
        row: 0,
    }];
    // codes 00,01,00,10 -> plane0=[0,1,0,0], plane1=[0,0,0,1]
    let rows = vec![(vec![0, 1, 0, 0], vec![0, 0, 0, 1])];
    let prefix = build_store(dir.path(), "cohort", &["A", "B"], &sites, &rows, false);

    let store = Store::open(&prefix).unwrap();
    let mut reader = Reader::new(store);
    let record = reader.read().unwrap().expect("one record");

    assert_eq!(record.alleles, vec!["A".to_string(), "T".to_string()]);
    // invariant 1: FORMAT columns == sample rows when "all samples" is used
    assert_eq!(reader.selected_samples().len(), 2);
    let genotypes = record.genotypes.expect("genotypes present");
    assert_eq!(genotypes.len(), 4);
    // REF/REF, REF/ALT, REF/REF, missing, decoded via the fixed FORMAT-byte table
    assert_eq!(genotypes, vec![1 << 1, 2 << 1, 1 << 1, 0 << 1]);

    assert!(reader.read().unwrap().is_none());
}

#[test]
fn e2_region_filter_restricts_to_one_contig() {
    let dir = tempfile::tempdir().unwrap();
    let sites = [
        FixtureSite {
            contig: "chr1",
            pos: 99,
            alleles: vec!["A", "T"],
            row: 0,
        },
        FixtureSite {
            contig: "chr2",
            pos: 50,
            alleles: vec!["G", "C"],
            row: 1,
        },
    ];
    let rows = vec![(vec![0, 0], vec![0, 0]), (vec![1, 1], vec![0, 0])];
    let prefix = build_store(dir.path(), "cohort", &["A"], &sites, &rows, true);

    let store = Store::open(&prefix).unwrap();
    let mut reader = Reader::new(store);
    reader.set_region("chr1").unwrap();

    let first = reader.read().unwrap().expect("one record in chr1");
    assert_eq!(first.rid, 0);
    assert!(reader.read().unwrap().is_none());
}

#[test]
fn e3_two_store_merge_at_aligned_position() {
    let dir = tempfile::tempdir().unwrap();
    let site = [FixtureSite {
        contig: "chr1",
        pos: 99,
        alleles: vec!["A", "T"],
        row: 0,
    }];
    let rows = vec![(vec![1, 1], vec![0, 0])]; // one sample, code 01 on both haplotypes
    let prefix_x = build_store(dir.path(), "x", &["S1"], &site, &rows, false);
    let prefix_y = build_store(dir.path(), "y", &["S2"], &site, &rows, false);

    let store_x = Store::open(&prefix_x).unwrap();
    let store_y = Store::open(&prefix_y).unwrap();
    let mut multi = MultiReader::new(vec![Reader::new(store_x), Reader::new(store_y)]);
    multi.set_compute_ac(true);

    let record = multi.read().unwrap().expect("one merged record");
    let genotypes = record.genotypes.expect("genotypes present");
    assert_eq!(genotypes, vec![2 << 1, 2 << 1, 2 << 1, 2 << 1]);
    assert_eq!(record.an, Some(4));
    assert_eq!(record.ac, Some(vec![4]));
    assert!(multi.read().unwrap().is_none());
}

#[test]
fn e4_two_store_merge_at_disjoint_positions() {
    let dir = tempfile::tempdir().unwrap();
    let site_x = [FixtureSite {
        contig: "chr1",
        pos: 99,
        alleles: vec!["A", "T"],
        row: 0,
    }];
    let site_y = [FixtureSite {
        contig: "chr1",
        pos: 200,
        alleles: vec!["G", "C"],
        row: 0,
    }];
    let rows = vec![(vec![1, 1], vec![0, 0])];
    let prefix_x = build_store(dir.path(), "x", &["S1"], &site_x, &rows, false);
    let prefix_y = build_store(dir.path(), "y", &["S2"], &site_y, &rows, false);

    let store_x = Store::open(&prefix_x).unwrap();
    let store_y = Store::open(&prefix_y).unwrap();
    let mut multi = MultiReader::new(vec![Reader::new(store_x), Reader::new(store_y)]);

    // invariant 4/5: non-decreasing order, both sites present, absent child missing
    let first = multi.read().unwrap().expect("pos=99 record");
    assert_eq!(first.pos, 99);
    let first_gt = first.genotypes.unwrap();
    assert_eq!(first_gt[0], 2 << 1); // S1 present
    assert_eq!(first_gt[1], 0 << 1); // S2 missing at this position

    let second = multi.read().unwrap().expect("pos=200 record");
    assert_eq!(second.pos, 200);
    let second_gt = second.genotypes.unwrap();
    assert_eq!(second_gt[0], 0 << 1); // S1 missing at this position
    assert_eq!(second_gt[1], 2 << 1); // S2 present

    assert!(multi.read().unwrap().is_none());
}

#[test]
fn add_group_enforces_eight_group_cap() {
    let dir = tempfile::tempdir().unwrap();
    let sites = [FixtureSite {
        contig: "chr1",
        pos: 99,
        alleles: vec!["A", "T"],
        row: 0,
    }];
    let rows = vec![(vec![0, 0], vec![0, 0])];
    let prefix = build_store(dir.path(), "cohort", &["A"], &sites, &rows, false);

    let store = Store::open(&prefix).unwrap();
    let mut reader = Reader::new(store);
    for _ in 0..8 {
        reader.add_group(&GroupSpec::All).unwrap();
    }
    assert!(reader.add_group(&GroupSpec::All).is_err());
}
