//! # Command line interface for `gtstore-query`
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::bed::BedFile;
use crate::group::{GroupSpec, MAX_GROUPS};
use crate::sample::AttrEquals;

#[derive(Parser)]
#[command(
    name = "gtstore-query",
    author,
    version,
    about = "Query a genotype-table cohort store",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read one cohort store
    Query(QueryArgs),
    /// Merge multiple cohort stores into one population-annotated stream
    Merge(MergeArgs),
}

#[derive(Args)]
pub struct QueryArgs {
    /// Filesystem prefix shared by the store's .bcf/.csi/.pbf/.spl files
    #[arg(short, long)]
    pub store: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args)]
pub struct MergeArgs {
    /// Filesystem prefix of a cohort store; may be given more than once
    #[arg(short, long = "store", required = true)]
    pub stores: Vec<String>,

    /// Compute AN/AC and per-group AN/AC annotations
    #[arg(long)]
    pub set_ac: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args)]
pub struct CommonArgs {
    /// Sample-selection group; may be given more than once (at most 8).
    /// Accepts a path to a line-delimited name list, `:name1,name2,...`
    /// for an inline list, or `?key=value` for an attribute predicate.
    #[arg(short, long = "group")]
    pub groups: Vec<String>,

    /// Restrict to a region: `chrom` or `chrom:start-end` (1-based, inclusive)
    #[arg(long)]
    pub region: Option<String>,

    /// Restrict to rows with row-id >= this value
    #[arg(long)]
    pub start: Option<i64>,

    /// BED3 file of intervals to filter against
    #[arg(long)]
    pub bed: Option<PathBuf>,

    /// Invert the BED filter: keep sites that do NOT overlap
    #[arg(long, requires = "bed")]
    pub exclude_bed: bool,

    /// Suppress FORMAT/sample columns in output
    #[arg(long)]
    pub no_gt: bool,
}

/// One parsed `--group` argument (§6.5 "Sample-selection input forms"). Owns
/// its data so it can outlive the borrow `GroupSpec::Predicate` needs.
pub enum ParsedGroup {
    Names(Vec<String>),
    Attr(AttrEquals),
}

impl ParsedGroup {
    pub fn as_spec(&self) -> GroupSpec<'_> {
        match self {
            ParsedGroup::Names(names) => GroupSpec::Names(names.clone()),
            ParsedGroup::Attr(pred) => GroupSpec::Predicate(pred),
        }
    }
}

/// Parses one `--group` value (§6.5): a filesystem path to a line-delimited
/// name list, a `:`-prefixed inline name list, or a `?key=value`
/// structured-attribute predicate.
pub fn parse_group_arg(spec: &str) -> Result<ParsedGroup> {
    if let Some(rest) = spec.strip_prefix(':') {
        let names = rest
            .split(',')
            .map(str::to_string)
            .filter(|s| !s.is_empty())
            .collect();
        return Ok(ParsedGroup::Names(names));
    }
    if let Some(rest) = spec.strip_prefix('?') {
        let (key, value) = rest.split_once('=').with_context(|| {
            format!("malformed predicate group '{spec}', expected '?key=value'")
        })?;
        return Ok(ParsedGroup::Attr(AttrEquals {
            key: key.to_string(),
            value: value.to_string(),
        }));
    }
    let contents = fs::read_to_string(spec)
        .with_context(|| format!("could not read sample-name list at '{spec}'"))?;
    let names = contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    Ok(ParsedGroup::Names(names))
}

pub fn load_bed(path: &PathBuf) -> Result<BedFile> {
    BedFile::from_path(path)
        .with_context(|| format!("could not read BED file '{}'", path.display()))
}

pub fn check_group_count(n: usize) -> Result<()> {
    if n > MAX_GROUPS {
        bail!("at most {MAX_GROUPS} groups may be declared");
    }
    Ok(())
}
