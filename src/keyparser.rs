//! # Allele-key parser (§4.5)
//!
//! Parses a textual `chr:pos:ref:alt` or `chr:pos:rlen:alt` key into a
//! normalized `(chr, pos, rlen, alt)` triple. No direct teacher analogue;
//! the small single-purpose parsing-function style (one function, early
//! `Result` returns, a descriptive error message per failure) follows
//! `constrain::utils::sample_name_from_path`.
use crate::error::{Error, Result};

/// A normalized allele key (§3.2 invariant 5): 0-based `pos`, shared
/// REF/ALT prefix shifted into `pos` and stripped, shared suffix stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedKey {
    pub chr: String,
    pub pos: i64,
    pub rlen: i64,
    pub alt: String,
}

/// Parse and normalize a `chr:pos:ref:alt` or `chr:pos:rlen:alt` key (§4.5).
pub fn parse_key(key: &str) -> Result<NormalizedKey> {
    let malformed = |message: &str| Error::MalformedKey {
        key: key.to_string(),
        message: message.to_string(),
    };

    let fields: Vec<&str> = key.split(':').collect();
    if fields.len() != 4 {
        return Err(malformed("expected exactly 4 colon-separated fields"));
    }
    let [chr, pos_s, third, alt] = [fields[0], fields[1], fields[2], fields[3]];

    if chr.is_empty() {
        return Err(malformed("chr field is empty"));
    }
    let pos_1based: i64 = pos_s
        .parse()
        .map_err(|_| malformed("pos field is not a non-negative integer"))?;
    if pos_1based < 1 {
        return Err(malformed("pos field must be 1-based and positive"));
    }
    if alt.is_empty() {
        return Err(malformed("alt field is empty"));
    }

    let symbolic_alt = alt.starts_with('<') && alt.ends_with('>');
    if !symbolic_alt && !alt.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(malformed("alt field must be alphabetic (or a symbolic <...> allele)"));
    }

    let mut pos = pos_1based - 1;

    // third field is `rlen` if it starts with a digit, else it's `ref`.
    if third.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        let rlen: i64 = third
            .parse()
            .map_err(|_| malformed("rlen field is not a non-negative integer"))?;
        return Ok(NormalizedKey {
            chr: chr.to_string(),
            pos,
            rlen,
            alt: alt.to_string(),
        });
    }

    let rf = third;
    if rf.is_empty() || !rf.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(malformed("ref field must be alphabetic"));
    }

    if symbolic_alt {
        // Symbolic ALTs are never trimmed against REF (§4.5 example 3).
        return Ok(NormalizedKey {
            chr: chr.to_string(),
            pos,
            rlen: rf.len() as i64,
            alt: alt.to_string(),
        });
    }

    let mut ref_bytes: Vec<u8> = rf.bytes().collect();
    let mut alt_bytes: Vec<u8> = alt.bytes().collect();

    // (a) trim shared leading characters, case-insensitively.
    let mut prefix = 0usize;
    while prefix < ref_bytes.len()
        && prefix < alt_bytes.len()
        && ref_bytes[prefix].eq_ignore_ascii_case(&alt_bytes[prefix])
    {
        prefix += 1;
    }
    if prefix > 0 {
        ref_bytes.drain(0..prefix);
        alt_bytes.drain(0..prefix);
        pos += prefix as i64;
    }

    // (b) trim shared trailing characters, reducing rlen only (REF was
    // provided, so this step applies per §4.5).
    let mut suffix = 0usize;
    while suffix < ref_bytes.len()
        && suffix < alt_bytes.len()
        && ref_bytes[ref_bytes.len() - 1 - suffix].eq_ignore_ascii_case(
            &alt_bytes[alt_bytes.len() - 1 - suffix],
        )
    {
        suffix += 1;
    }
    if suffix > 0 {
        ref_bytes.truncate(ref_bytes.len() - suffix);
        alt_bytes.truncate(alt_bytes.len() - suffix);
    }

    let rlen = rf.len() as i64 - prefix as i64 - suffix as i64;
    let alt_out = String::from_utf8(alt_bytes).expect("ASCII-only input");

    Ok(NormalizedKey {
        chr: chr.to_string(),
        pos,
        rlen,
        alt: alt_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e5_ref_alt_with_prefix_and_suffix_trim() {
        // "chr1:100:ACGT:ACCT" -> (chr1, 101, 1, C)
        let k = parse_key("chr1:100:ACGT:ACCT").unwrap();
        assert_eq!(k.chr, "chr1");
        assert_eq!(k.pos, 101);
        assert_eq!(k.rlen, 1);
        assert_eq!(k.alt, "C");
    }

    #[test]
    fn e5_rlen_form() {
        // "chr1:100:1:T" -> (chr1, 99, 1, T)
        let k = parse_key("chr1:100:1:T").unwrap();
        assert_eq!(k.chr, "chr1");
        assert_eq!(k.pos, 99);
        assert_eq!(k.rlen, 1);
        assert_eq!(k.alt, "T");
    }

    #[test]
    fn e5_symbolic_alt_untrimmed() {
        // "chr1:100:ACGT:<DEL>" -> symbolic ALT preserved, no trimming
        let k = parse_key("chr1:100:ACGT:<DEL>").unwrap();
        assert_eq!(k.chr, "chr1");
        assert_eq!(k.pos, 99);
        assert_eq!(k.rlen, 4);
        assert_eq!(k.alt, "<DEL>");
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(parse_key("chr1:100:ACGT").is_err()); // too few fields
        assert!(parse_key("chr1:abc:A:T").is_err()); // non-digit pos
        assert!(parse_key("chr1:100:1:").is_err()); // empty alt
        assert!(parse_key("chr1:100:A1:T").is_err()); // non-alphabetic ref
        assert!(parse_key("chr1:0:A:T").is_err()); // pos must be positive
    }

    #[test]
    fn idempotent_under_reserialization() {
        // §8 invariant 6: parsing the serialization of a parsed key yields
        // an equal key.
        let k = parse_key("chr1:100:ACGT:ACCT").unwrap();
        let reserialized = format!("{}:{}:{}:{}", k.chr, k.pos + 1, k.rlen, k.alt);
        let k2 = parse_key(&reserialized).unwrap();
        assert_eq!(k, k2);
    }

    #[test]
    fn no_common_prefix_or_suffix_is_unchanged() {
        let k = parse_key("chrX:5:G:A").unwrap();
        assert_eq!(k.pos, 4);
        assert_eq!(k.rlen, 1);
        assert_eq!(k.alt, "A");
    }
}
