//! The subset: canonical ids allowed as edge endpoints.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::curie::Curie;
use crate::error::{MappingError, SourceError};
use crate::mapping::{IdentifierMapper, MappingResult, resolve_column};
use crate::table::{ColumnRef, DelimitedReader};

/// Where the subset comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubsetSpec {
    /// One column of a delimited file.
    Column {
        path: PathBuf,
        #[serde(default = "default_column")]
        column: ColumnRef,
        #[serde(default = "default_delimiter")]
        delimiter: char,
        #[serde(default = "default_true")]
        has_header: bool,
    },
    /// Every canonical value of the loaded mapping tables.
    #[default]
    Mapped,
    /// The ids produced by the node-merge pass.
    Nodes,
}

fn default_column() -> ColumnRef {
    ColumnRef::Name("id".into())
}
fn default_delimiter() -> char {
    ','
}
fn default_true() -> bool {
    true
}

/// Immutable set of in-scope canonical identifiers.
#[derive(Debug, Clone, Default)]
pub struct SubsetIndex {
    ids: HashSet<Curie>,
}

impl SubsetIndex {
    pub fn contains(&self, id: &Curie) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Refuse an empty subset: it would drop every edge.
    pub fn non_empty(self) -> MappingResult<Self> {
        if self.ids.is_empty() {
            Err(MappingError::EmptySubset)
        } else {
            Ok(self)
        }
    }

    /// Build from one column of a delimited file. Cells that are not CURIEs are ignored.
    pub fn from_column(
        path: &std::path::Path,
        column: &ColumnRef,
        delimiter: char,
        has_header: bool,
    ) -> MappingResult<Self> {
        let origin = "subset";
        let mut reader = DelimitedReader::open(path, delimiter, has_header).map_err(|e| {
            SourceError::Unavailable {
                source_name: origin.into(),
                path: path.display().to_string(),
                source: e,
            }
        })?;
        let idx = resolve_column(column, &reader, origin)?;

        let mut ids = HashSet::new();
        let mut skipped = 0u64;
        while let Some(row) = reader.next_row() {
            let row = row.map_err(|e| SourceError::Read {
                source_name: origin.into(),
                path: path.display().to_string(),
                line: reader.line(),
                source: e,
            })?;
            if row.unterminated {
                skipped += 1;
                continue;
            }
            match Curie::parse(row.get(idx)) {
                Some(id) => {
                    ids.insert(id);
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(path = %path.display(), skipped, "subset cells that are not CURIEs were ignored");
        }
        Ok(Self { ids })
    }

    /// Build from a spec. `node_ids` feeds [`SubsetSpec::Nodes`].
    pub fn load(
        spec: &SubsetSpec,
        mapper: &IdentifierMapper,
        node_ids: impl IntoIterator<Item = Curie>,
    ) -> MappingResult<Self> {
        let index = match spec {
            SubsetSpec::Column {
                path,
                column,
                delimiter,
                has_header,
            } => Self::from_column(path, column, *delimiter, *has_header)?,
            SubsetSpec::Mapped => mapper.canonical_ids().collect(),
            SubsetSpec::Nodes => node_ids.into_iter().collect(),
        };
        tracing::info!(size = index.len(), "subset ready");
        index.non_empty()
    }
}

impl FromIterator<Curie> for SubsetIndex {
    fn from_iter<I: IntoIterator<Item = Curie>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MappingMode;
    use crate::mapping::MappingTable;

    fn curie(s: &str) -> Curie {
        Curie::parse(s).unwrap()
    }

    #[test]
    fn membership() {
        let subset: SubsetIndex = [curie("ABA:ZI"), curie("ABA:FF")].into_iter().collect();
        assert!(subset.contains(&curie("ABA:ZI")));
        assert!(!subset.contains(&curie("ABA:XX")));
        assert_eq!(subset.len(), 2);
    }

    #[test]
    fn empty_subset_is_refused() {
        let err = SubsetIndex::default().non_empty().unwrap_err();
        assert!(matches!(err, MappingError::EmptySubset));
    }

    #[test]
    fn from_column_of_csv() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("subset_nodes.csv");
        std::fs::write(
            &path,
            "id,name,category\nNCBIGene:9796,PHYHIP,biolink:Gene\nNCBIGene:7918,\"GPANK1,biolink:Gene\n\
             UMLS:C0011849,Diabetes,biolink:Disease\nbogus,x,y\n",
        )
        .unwrap();
        let spec = SubsetSpec::Column {
            path,
            column: default_column(),
            delimiter: ',',
            has_header: true,
        };
        let mapper = IdentifierMapper::new(MappingMode::Strict);
        let subset = SubsetIndex::load(&spec, &mapper, std::iter::empty()).unwrap();
        assert_eq!(subset.len(), 2);
        assert!(subset.contains(&curie("UMLS:C0011849")));
        assert!(!subset.contains(&curie("NCBIGene:7918")));
    }

    #[test]
    fn mapped_subset_uses_table_values() {
        let mapper = IdentifierMapper::new(MappingMode::Strict).with_table(
            MappingTable::from_pairs("t", [("5", "ABA:ZI"), ("3", "ABA:FF"), ("9", "raw")]),
        );
        let subset = SubsetIndex::load(&SubsetSpec::Mapped, &mapper, std::iter::empty()).unwrap();
        assert_eq!(subset.len(), 2);
    }

    #[test]
    fn nodes_subset_and_empty_nodes() {
        let mapper = IdentifierMapper::new(MappingMode::Strict);
        let subset =
            SubsetIndex::load(&SubsetSpec::Nodes, &mapper, [curie("PRIMEKG:1")]).unwrap();
        assert!(subset.contains(&curie("PRIMEKG:1")));
        assert!(matches!(
            SubsetIndex::load(&SubsetSpec::Nodes, &mapper, std::iter::empty()),
            Err(MappingError::EmptySubset)
        ));
    }

    #[test]
    fn spec_parses_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            subset: SubsetSpec,
        }
        let w: Wrapper = toml::from_str("[subset]\nkind = \"column\"\npath = \"s.csv\"\n").unwrap();
        assert_eq!(
            w.subset,
            SubsetSpec::Column {
                path: PathBuf::from("s.csv"),
                column: ColumnRef::Name("id".into()),
                delimiter: ',',
                has_header: true,
            }
        );
        let w: Wrapper = toml::from_str("[subset]\nkind = \"nodes\"\n").unwrap();
        assert_eq!(w.subset, SubsetSpec::Nodes);
    }
}
