//! `gtstore-query` — open one or more cohort stores and stream records to
//! stdout, optionally restricted by region, BED mask, or sample group.
//!
//! Output is a minimal tab-delimited line per record (`chrom\tpos\tref,alt..
//! \tinfo\tGT...`), not a textual VCF/BCF rendering: that format is an
//! external collaborator this crate does not implement (see spec §1).
use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use gtstore::cli::{check_group_count, load_bed, parse_group_arg, Cli, Commands};
use gtstore::{MultiReader, OutputRecord, Reader, Store};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Query(args) => run_query(args),
        Commands::Merge(args) => run_merge(args),
    }
}

fn print_record(record: &OutputRecord, contig: &str) {
    let alleles = record.alleles.join(",");
    let mut info = Vec::new();
    if let Some(end) = record.end {
        info.push(format!("END={end}"));
    }
    if let Some(an) = record.an {
        info.push(format!("AN={an}"));
    }
    if let Some(ac) = &record.ac {
        let ac_str = ac.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
        info.push(format!("AC={ac_str}"));
    }
    for (g, (an_g, ac_g)) in record
        .group_an
        .iter()
        .zip(record.group_ac.iter())
        .enumerate()
    {
        let idx = g + 1;
        let ac_str = ac_g.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
        info.push(format!("AN{idx}={an_g};AC{idx}={ac_str}"));
    }
    let info_str = if info.is_empty() {
        ".".to_string()
    } else {
        info.join(";")
    };
    let gt_str = match &record.genotypes {
        Some(codes) => codes
            .iter()
            .map(|b| (b >> 1).to_string())
            .collect::<Vec<_>>()
            .join(","),
        None => ".".to_string(),
    };
    println!(
        "{contig}\t{}\t{alleles}\t{info_str}\t{gt_str}",
        record.pos + 1
    );
}

fn contig_name(store: &Store, rid: usize) -> String {
    store
        .header()
        .rid2name(rid as u32)
        .map(|n| String::from_utf8_lossy(n).into_owned())
        .unwrap_or_else(|_| rid.to_string())
}

fn run_query(args: gtstore::cli::QueryArgs) -> Result<()> {
    info!("opening store at prefix '{}'", args.store);
    let store = Store::open(&args.store).with_context(|| format!("opening '{}'", args.store))?;
    let mut reader = Reader::new(store);

    let parsed_groups: Vec<_> = args
        .common
        .groups
        .iter()
        .map(|g| parse_group_arg(g))
        .collect::<Result<_>>()?;
    check_group_count(parsed_groups.len())?;
    for group in &parsed_groups {
        reader.add_group(&group.as_spec())?;
    }

    if let Some(region) = &args.common.region {
        reader.set_region(region)?;
    }
    if let Some(start) = args.common.start {
        reader.set_start(start);
    }
    let bed = args.common.bed.as_ref().map(load_bed).transpose()?;
    if let Some(bed) = &bed {
        reader.set_bed(bed, args.common.exclude_bed);
    }
    reader.set_no_gt(args.common.no_gt);

    while let Some(record) = reader.read()? {
        let contig = contig_name(reader.store(), record.rid);
        print_record(&record, &contig);
    }
    Ok(())
}

fn run_merge(args: gtstore::cli::MergeArgs) -> Result<()> {
    let mut readers = Vec::with_capacity(args.stores.len());
    for prefix in &args.stores {
        info!("opening store at prefix '{prefix}'");
        let store = Store::open(prefix).with_context(|| format!("opening '{prefix}'"))?;
        readers.push(Reader::new(store));
    }

    let mut multi = MultiReader::new(readers);

    let parsed_groups: Vec<_> = args
        .common
        .groups
        .iter()
        .map(|g| parse_group_arg(g))
        .collect::<Result<_>>()?;
    check_group_count(parsed_groups.len())?;
    for group in &parsed_groups {
        multi.add_group(&group.as_spec())?;
    }

    multi.set_no_gt(args.common.no_gt);
    multi.set_compute_ac(args.set_ac);
    multi.prepare()?;

    while let Some(record) = multi.read()? {
        let contig = multi
            .first_store()
            .map(|store| contig_name(store, record.rid))
            .unwrap_or_else(|| record.rid.to_string());
        print_record(&record, &contig);
    }
    Ok(())
}
