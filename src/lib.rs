//! # gtstore
//!
//! A columnar genotype-table storage and query engine: a store for large
//! cohorts of variant-call records that decouples site metadata (per-variant
//! information common to all samples) from per-sample haploid bits (the
//! genotype matrix). Supports fast range queries by genomic coordinate,
//! selection of arbitrary sample subsets by name or predicate, and
//! merge-queries that combine multiple cohort stores into one synthesized
//! variant stream with population allele-count annotations.
pub mod atomizer;
pub mod bed;
pub mod cli;
pub mod error;
pub mod group;
pub mod keyparser;
pub mod multi;
pub mod pbf;
pub mod reader;
pub mod sample;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use group::{GroupMask, GroupSpec, MAX_GROUPS};
pub use multi::MultiReader;
pub use reader::Reader;
pub use store::Store;
pub use types::{GtCode, Haplotypes, OutputRecord, Site};
