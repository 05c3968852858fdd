//! Canonical edge records and their identity.
//!
//! The record schema is fixed: every field is always serialized, in a stable
//! order, with `null` where a source did not supply a value. The `id` field is
//! a pure function of the [`EdgeIdentity`], so re-running a merge over the same
//! inputs reproduces the same ids.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::config::SourceConfig;
use crate::curie::Curie;
use crate::reader::RawEdgeRecord;

/// Separator between the components of an edge id.
pub const ID_SEPARATOR: &str = "---";

/// Placeholder for an absent qualifier slot in an edge id.
pub const ABSENT_SLOT: &str = "None";

/// Format of `update_date` fields.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in [`DATE_FORMAT`].
pub fn timestamp_now() -> String {
    chrono::Local::now().format(DATE_FORMAT).to_string()
}

/// Edge qualifiers that distinguish otherwise identical edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Qualifiers {
    pub predicate: Option<String>,
    pub object_aspect: Option<String>,
    pub object_direction: Option<String>,
}

/// The deduplication key of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeIdentity {
    pub subject: Curie,
    pub source_predicate: String,
    pub qualifiers: Qualifiers,
    pub object: Curie,
    pub knowledge_source: String,
}

impl EdgeIdentity {
    /// The stable record id:
    /// `subject---source_predicate---qp---aspect---direction---object---knowledge_source`.
    ///
    /// Readers refuse components containing `---` and qualifiers spelled `None`,
    /// so distinct identities never share an id.
    pub fn id(&self) -> String {
        let slot = |q: &Option<String>| q.as_deref().unwrap_or(ABSENT_SLOT).to_string();
        [
            self.subject.to_string(),
            self.source_predicate.clone(),
            slot(&self.qualifiers.predicate),
            slot(&self.qualifiers.object_aspect),
            slot(&self.qualifiers.object_direction),
            self.object.to_string(),
            self.knowledge_source.clone(),
        ]
        .join(ID_SEPARATOR)
    }
}

impl fmt::Display for EdgeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// One output edge. Field order is the serialization order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEdgeRecord {
    pub id: String,
    pub subject: Curie,
    pub object: Curie,
    pub relation_label: String,
    pub source_predicate: String,
    /// Biolink predicate; assigned downstream.
    pub predicate: Option<String>,
    pub qualified_predicate: Option<String>,
    pub qualified_object_aspect: Option<String>,
    pub qualified_object_direction: Option<String>,
    /// `None` when the source does not state negation.
    pub negated: Option<bool>,
    pub frequency: Option<Number>,
    pub probability: Option<Number>,
    pub publications: Vec<String>,
    pub publications_info: BTreeMap<String, serde_json::Value>,
    pub source_attributes: BTreeMap<String, String>,
    pub primary_knowledge_source: String,
    pub domain_range_exclusion: bool,
    pub update_date: String,
}

// update_date is processing metadata and takes no part in equality.
impl PartialEq for CanonicalEdgeRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.subject == other.subject
            && self.object == other.object
            && self.relation_label == other.relation_label
            && self.source_predicate == other.source_predicate
            && self.predicate == other.predicate
            && self.qualified_predicate == other.qualified_predicate
            && self.qualified_object_aspect == other.qualified_object_aspect
            && self.qualified_object_direction == other.qualified_object_direction
            && self.negated == other.negated
            && self.frequency == other.frequency
            && self.probability == other.probability
            && self.publications == other.publications
            && self.publications_info == other.publications_info
            && self.source_attributes == other.source_attributes
            && self.primary_knowledge_source == other.primary_knowledge_source
            && self.domain_range_exclusion == other.domain_range_exclusion
    }
}

impl CanonicalEdgeRecord {
    /// Rebuild the identity this record was emitted under.
    pub fn identity(&self) -> EdgeIdentity {
        EdgeIdentity {
            subject: self.subject.clone(),
            source_predicate: self.source_predicate.clone(),
            qualifiers: Qualifiers {
                predicate: self.qualified_predicate.clone(),
                object_aspect: self.qualified_object_aspect.clone(),
                object_direction: self.qualified_object_direction.clone(),
            },
            object: self.object.clone(),
            knowledge_source: self.primary_knowledge_source.clone(),
        }
    }
}

/// Synthesizes canonical records. One builder per run so every record shares `update_date`.
#[derive(Debug, Clone)]
pub struct EdgeRecordBuilder {
    update_date: String,
}

impl EdgeRecordBuilder {
    pub fn new(update_date: impl Into<String>) -> Self {
        Self {
            update_date: update_date.into(),
        }
    }

    /// A builder stamped with the current local time.
    pub fn now() -> Self {
        Self::new(timestamp_now())
    }

    pub fn update_date(&self) -> &str {
        &self.update_date
    }

    /// The identity `raw` would be emitted under, given resolved endpoints.
    pub fn identity(
        raw: &RawEdgeRecord,
        subject: Curie,
        object: Curie,
        source: &SourceConfig,
    ) -> EdgeIdentity {
        EdgeIdentity {
            subject,
            source_predicate: source.source_predicate(&raw.relation),
            qualifiers: raw.qualifiers.clone(),
            object,
            knowledge_source: source.knowledge_source(),
        }
    }

    pub fn build(
        &self,
        raw: &RawEdgeRecord,
        subject: Curie,
        object: Curie,
        source: &SourceConfig,
    ) -> CanonicalEdgeRecord {
        let identity = Self::identity(raw, subject, object, source);
        self.build_for(raw, &identity, source)
    }

    /// Build the record for an identity computed earlier with [`Self::identity`].
    pub fn build_for(
        &self,
        raw: &RawEdgeRecord,
        identity: &EdgeIdentity,
        source: &SourceConfig,
    ) -> CanonicalEdgeRecord {
        let source_attributes = raw
            .attributes
            .iter()
            .map(|(label, value)| (source.attribute_key(label), value.clone()))
            .collect();

        CanonicalEdgeRecord {
            id: identity.id(),
            subject: identity.subject.clone(),
            object: identity.object.clone(),
            relation_label: source.relation_label(&raw.relation, raw.label.as_deref()),
            source_predicate: identity.source_predicate.clone(),
            predicate: None,
            qualified_predicate: identity.qualifiers.predicate.clone(),
            qualified_object_aspect: identity.qualifiers.object_aspect.clone(),
            qualified_object_direction: identity.qualifiers.object_direction.clone(),
            negated: raw.negated,
            frequency: raw.frequency.clone(),
            probability: raw.probability.clone(),
            publications: raw.publications.clone(),
            publications_info: BTreeMap::new(),
            source_attributes,
            primary_knowledge_source: identity.knowledge_source.clone(),
            domain_range_exclusion: false,
            update_date: self.update_date.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnLayout;
    use crate::table::ColumnRef;

    fn curie(s: &str) -> Curie {
        Curie::parse(s).unwrap()
    }

    fn source(name: &str, prefix: &str) -> SourceConfig {
        SourceConfig::new(
            name,
            prefix,
            vec!["edges.csv".into()],
            ColumnLayout::new(ColumnRef::Index(0), ColumnRef::Index(1), ColumnRef::Index(2)),
            Vec::new(),
        )
    }

    #[test]
    fn biokde_example_record() {
        let builder = EdgeRecordBuilder::new("2026-01-01 00:00:00");
        let raw = RawEdgeRecord::new("3", "5", "SUBCLASS_OF");
        let record = builder.build(&raw, curie("ABA:FF"), curie("ABA:ZI"), &source("BioKDE", "BIOKDE"));

        assert_eq!(record.subject.as_str(), "ABA:FF");
        assert_eq!(record.object.as_str(), "ABA:ZI");
        assert_eq!(record.relation_label, "SUBCLASS_OF");
        assert_eq!(record.source_predicate, "BIOKDE:SUBCLASS_OF");
        assert_eq!(record.primary_knowledge_source, "BIOKDE:");
        assert_eq!(
            record.id,
            "ABA:FF---BIOKDE:SUBCLASS_OF---None---None---None---ABA:ZI---BIOKDE:"
        );
        assert_eq!(record.negated, None);
        assert!(!record.domain_range_exclusion);
    }

    #[test]
    fn serialized_field_order_and_nulls() {
        let builder = EdgeRecordBuilder::new("2026-01-01 00:00:00");
        let raw = RawEdgeRecord::new("3", "5", "SUBCLASS_OF");
        let record = builder.build(&raw, curie("ABA:FF"), curie("ABA:ZI"), &source("BioKDE", "BIOKDE"));
        let json = serde_json::to_string(&record).unwrap();

        let keys = [
            "\"id\"",
            "\"subject\"",
            "\"object\"",
            "\"relation_label\"",
            "\"source_predicate\"",
            "\"predicate\"",
            "\"qualified_predicate\"",
            "\"qualified_object_aspect\"",
            "\"qualified_object_direction\"",
            "\"negated\"",
            "\"frequency\"",
            "\"probability\"",
            "\"publications\"",
            "\"publications_info\"",
            "\"source_attributes\"",
            "\"primary_knowledge_source\"",
            "\"domain_range_exclusion\"",
            "\"update_date\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
        assert!(json.contains("\"negated\":null"));
        assert!(json.contains("\"frequency\":null"));
    }

    #[test]
    fn ids_are_independent_of_update_date() {
        let raw = RawEdgeRecord::new("1", "2", "ppi");
        let src = source("PrimeKG", "PRIMEKG");
        let a = EdgeRecordBuilder::new("2020-01-01 00:00:00").build(
            &raw,
            curie("NCBIGene:1"),
            curie("NCBIGene:2"),
            &src,
        );
        let b = EdgeRecordBuilder::new("2030-12-31 23:59:59").build(
            &raw,
            curie("NCBIGene:1"),
            curie("NCBIGene:2"),
            &src,
        );
        assert_eq!(a.id, b.id);
        assert_eq!(a, b);
        assert_ne!(a.update_date, b.update_date);
    }

    #[test]
    fn qualifiers_extend_identity() {
        let src = source("SemMedDB", "SEMMEDDB");
        let plain = RawEdgeRecord::new("C1", "C2", "AFFECTS");
        let mut qualified = plain.clone();
        qualified.qualifiers.object_direction = Some("increased".into());

        let a = EdgeRecordBuilder::identity(&plain, curie("UMLS:C1"), curie("UMLS:C2"), &src);
        let b = EdgeRecordBuilder::identity(&qualified, curie("UMLS:C1"), curie("UMLS:C2"), &src);
        assert_ne!(a, b);
        assert!(b.id().contains("---increased---"));
    }

    #[test]
    fn patterns_and_namespaced_attributes() {
        let mut src = source("iKraph", "IKRAPH");
        src.predicate_pattern = "RELATION_{relation}".into();
        src.label_pattern = "relation_type_{relation}".into();
        let mut raw = RawEdgeRecord::new("1", "2", "7");
        raw.probability = Number::from_f64(0.93);
        raw.attributes = vec![("source".into(), "PubMed".into())];

        let record = EdgeRecordBuilder::new("d").build(&raw, curie("A:1"), curie("A:2"), &src);
        assert_eq!(record.source_predicate, "IKRAPH:RELATION_7");
        assert_eq!(record.relation_label, "relation_type_7");
        assert_eq!(record.source_attributes.get("ikraph_source").unwrap(), "PubMed");
        assert_eq!(record.identity(), EdgeRecordBuilder::identity(&raw, curie("A:1"), curie("A:2"), &src));
    }
}
