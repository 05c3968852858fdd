//! Compact URIs: the canonical identifier space.
//!
//! Every node and edge endpoint that leaves the merge is a [`Curie`] of the
//! form `prefix:local-part`. Source-local identifiers (row indices, UMLS CUIs,
//! IRIs) only become `Curie`s after passing through the
//! [`IdentifierMapper`](crate::mapping::IdentifierMapper).

use std::fmt;

use serde::{Deserialize, Serialize};

/// A canonical `prefix:local-part` identifier.
///
/// The prefix is never empty and contains no whitespace. The local part may be
/// empty: knowledge-source CURIEs such as `"BIOKDE:"` are valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Curie {
    raw: String,
    colon: usize,
}

impl Curie {
    /// Parse a string as a CURIE. Returns `None` if it has no `:`, an empty
    /// prefix, or is an IRI (`scheme://...`).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let colon = raw.find(':')?;
        if colon == 0
            || raw[..colon].chars().any(char::is_whitespace)
            || raw[colon + 1..].starts_with("//")
        {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            colon,
        })
    }

    /// Build `prefix:local` from parts. Returns `None` for an invalid prefix.
    pub fn from_parts(prefix: &str, local: &str) -> Option<Self> {
        let prefix = prefix.trim().trim_end_matches(':');
        if prefix.is_empty() || prefix.contains(':') {
            return None;
        }
        Self::parse(&format!("{prefix}:{}", local.trim()))
    }

    /// The namespace prefix, without the colon.
    pub fn prefix(&self) -> &str {
        &self.raw[..self.colon]
    }

    /// Everything after the first colon.
    pub fn local_part(&self) -> &str {
        &self.raw[self.colon + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Curie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for Curie {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<String> for Curie {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Curie::parse(&value).ok_or_else(|| format!("not a CURIE: \"{value}\""))
    }
}

impl From<Curie> for String {
    fn from(curie: Curie) -> Self {
        curie.raw
    }
}

/// Return the part of `key` after its first `:`, or the whole key if it has none.
pub fn local_part_of(key: &str) -> &str {
    key.split_once(':').map_or(key, |(_, local)| local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_first_colon() {
        let c = Curie::parse("UMLS:C0011849").unwrap();
        assert_eq!(c.prefix(), "UMLS");
        assert_eq!(c.local_part(), "C0011849");

        let iri_like = Curie::parse("GO:GO:0008150").unwrap();
        assert_eq!(iri_like.prefix(), "GO");
        assert_eq!(iri_like.local_part(), "GO:0008150");
    }

    #[test]
    fn source_curie_with_empty_local_part() {
        let c = Curie::parse("BIOKDE:").unwrap();
        assert_eq!(c.prefix(), "BIOKDE");
        assert_eq!(c.local_part(), "");
    }

    #[test]
    fn rejects_non_curies() {
        assert!(Curie::parse("12345").is_none());
        assert!(Curie::parse(":abc").is_none());
        assert!(Curie::parse("").is_none());
        assert!(Curie::parse("two words:x").is_none());
    }

    #[test]
    fn iris_are_not_curies() {
        assert!(Curie::parse("http://mouse.brain-map.org/atlas#5").is_none());
        assert!(Curie::parse("urn://x").is_none());
        assert!(Curie::from_parts("http", "//example.org/3").is_none());
        assert_eq!(Curie::parse("ABA:ZI").unwrap().local_part(), "ZI");
        assert_eq!(Curie::parse("DOI:10.1/x//y").unwrap().prefix(), "DOI");
    }

    #[test]
    fn from_parts_tolerates_trailing_colon() {
        assert_eq!(
            Curie::from_parts("PRIMEKG:", "9796").unwrap().as_str(),
            "PRIMEKG:9796"
        );
        assert!(Curie::from_parts("", "x").is_none());
    }

    #[test]
    fn serde_is_a_plain_string() {
        let c = Curie::parse("ABA:ZI").unwrap();
        assert_eq!(serde_json::to_string(&c).unwrap(), "\"ABA:ZI\"");
        let back: Curie = serde_json::from_str("\"ABA:ZI\"").unwrap();
        assert_eq!(back, c);
        assert!(serde_json::from_str::<Curie>("\"nope\"").is_err());
    }

    #[test]
    fn local_part_of_plain_key() {
        assert_eq!(local_part_of("NCBIGene:9796"), "9796");
        assert_eq!(local_part_of("9796"), "9796");
    }
}
