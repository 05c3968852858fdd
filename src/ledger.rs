//! Run-wide record of emitted edge identities.

use std::collections::HashSet;

use crate::record::EdgeIdentity;

/// Exact set of identities already emitted in this run, across all sources.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<EdgeIdentity>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
        }
    }

    pub fn seen(&self, identity: &EdgeIdentity) -> bool {
        self.seen.contains(identity)
    }

    /// Register an identity. Returns `false` if it was already present.
    pub fn record(&mut self, identity: EdgeIdentity) -> bool {
        self.seen.insert(identity)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curie::Curie;
    use crate::record::Qualifiers;

    fn identity(subject: &str, ks: &str) -> EdgeIdentity {
        EdgeIdentity {
            subject: Curie::parse(subject).unwrap(),
            source_predicate: "PRIMEKG:ppi".into(),
            qualifiers: Qualifiers::default(),
            object: Curie::parse("NCBIGene:2").unwrap(),
            knowledge_source: ks.into(),
        }
    }

    #[test]
    fn first_record_wins() {
        let mut ledger = DedupLedger::new();
        let id = identity("NCBIGene:1", "PRIMEKG:");
        assert!(!ledger.seen(&id));
        assert!(ledger.record(id.clone()));
        assert!(ledger.seen(&id));
        assert!(!ledger.record(id));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn knowledge_source_is_part_of_identity() {
        let mut ledger = DedupLedger::with_capacity(4);
        ledger.record(identity("NCBIGene:1", "PRIMEKG:"));
        assert!(!ledger.seen(&identity("NCBIGene:1", "SEMMEDDB:")));
    }
}
