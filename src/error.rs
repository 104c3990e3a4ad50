//! # Error kinds
//!
//! Typed error kinds for the store/reader/merge stack (see §7 of the design
//! document). Library code returns `Result<T, Error>`; the CLI binary wraps
//! these in `anyhow::Error` at the edge, the way the teacher crate does for
//! its own I/O errors.
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One of the four artifacts sharing a store prefix (`.bcf`, `.csi`,
    /// `.pbf`, `.spl`) could not be opened.
    #[error("failed to open store at prefix '{prefix}': {source}")]
    StoreOpen {
        prefix: String,
        #[source]
        source: io::Error,
    },

    /// A header, sample table, or record could not be parsed, or a
    /// hard file-format invariant (e.g. the `_row` INFO field, or the
    /// `_row` strictly-increasing-and-dense invariant) was violated.
    #[error("format error in store at prefix '{prefix}': {message}")]
    Format { prefix: String, message: String },

    /// `SetRegion` was given a string that does not parse against the
    /// header's contig dictionary.
    #[error("bad region '{region}': {message}")]
    BadRegion { region: String, message: String },

    /// The allele-key parser (§4.5) was given a malformed key.
    #[error("malformed variant key '{key}': {message}")]
    MalformedKey { key: String, message: String },

    /// `AddGroup` was called when 8 groups are already active.
    #[error("cannot add group: at most 8 groups may be active at once")]
    TooManyGroups,

    /// An underlying I/O error bubbled up verbatim. The reader that
    /// produced this is left in an undefined state and must be dropped.
    #[error("underlying I/O error: {0}")]
    UnderlyingIo(#[from] io::Error),

    /// The indexed variant reader reported an htslib-level error.
    #[error("htslib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
