//! Shared on-disk fixture: three small sources, their mapping tables and a subset.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use kg_merge::config::MergeConfig;
use kg_merge::engine::MergeSummary;
use kg_merge::record::CanonicalEdgeRecord;

pub const UPDATE_DATE: &str = "2026-01-01 00:00:00";

pub const CONFIG: &str = r#"
[run]
failure_policy = "continue"

[[tables]]
name = "normalized"
paths = ["node_mappings.json"]
format = "json"
pointer = "/final_mapping"

[[tables]]
name = "subset_local"
paths = ["subset_nodes.csv"]
key = "id"
value = "id"
key_form = "local_part"

[[tables]]
name = "primekg_index"
paths = ["primekg_nodes.csv"]
key = "node_index"
value = "node_id"

[[tables]]
name = "primekg_curie"
paths = ["primekg_nodes.csv"]
key = "node_index"
value = "node_id"
value_prefix = "PRIMEKG"

[subset]
kind = "column"
path = "subset_nodes.csv"

[[sources]]
name = "BioKDE"
curie_prefix = "BIOKDE"
paths = ["biokde_edges.csv"]
mapping = [{ table = "normalized" }, { fragment = "normalized" }]

[sources.columns]
subject = 0
object = 1
relation = 2

[[sources]]
name = "PrimeKG"
curie_prefix = "PRIMEKG"
paths = ["primekg_edges.csv"]
mapping = [
    { table = "normalized" },
    { chain = ["primekg_index", "subset_local"] },
    { table = "primekg_curie" },
]

[sources.columns]
subject = "x_index"
object = "y_index"
relation = "relation"
label = "display_relation"

[[sources]]
name = "SemMedDB"
curie_prefix = "SEMMEDDB"
paths = ["connections.csv.gz"]
mapping = [{ table = "subset_local" }, { passthrough = "UMLS" }]

[sources.columns]
subject = ":START_ID"
object = ":END_ID"
relation = ":TYPE"
frequency = "frequency"

[[nodes]]
name = "PrimeKG"
curie_prefix = "PRIMEKG"
title = "PrimeKG Knowledge Graph"
paths = ["primekg_nodes.csv"]
id = "node_id"
id_prefix = "PRIMEKG"
label = "node_name"
category = "node_type"
vocabulary = "primekg"
"#;

pub const SUBSET: &str = "\
id,name,category
ABA:ZI,Zona incerta,biolink:AnatomicalEntity
ABA:FF,Fields of Forel,biolink:AnatomicalEntity
NCBIGene:9796,PHYHIP,biolink:Gene
NCBIGene:7918,GPANK1,biolink:Gene
UMLS:C0011849,Diabetes Mellitus,biolink:Disease
UMLS:C0020538,Hypertension,biolink:Disease
";

pub const MAPPINGS: &str =
    r#"{"final_mapping": {"3": "ABA:FF", "5": "ABA:ZI", "9": "ABA:OUTSIDE"}, "edge_overlaps": {}}"#;

// emitted, duplicate, unmappable, emitted (IRI fragment), out of subset, malformed
pub const BIOKDE_EDGES: &str = "\
subject,object,relation
3,5,SUBCLASS_OF
3,5,SUBCLASS_OF
3,404,SUBCLASS_OF
http://atlas.brain-map.org/structure#5,3,PART_OF
9,5,SUBCLASS_OF
3,5
";

pub const PRIMEKG_NODES: &str = "\
node_index,node_id,node_type,node_name,node_source
0,9796,gene/protein,PHYHIP,NCBI
1,7918,gene/protein,GPANK1,NCBI
2,5017,disease,asthma,MONDO
";

// emitted through the index chain, out of subset via the PRIMEKG fallback
pub const PRIMEKG_EDGES: &str = "\
relation,display_relation,x_index,y_index
protein_protein,ppi,0,1
disease_protein,associated with,2,0
";

// emitted, out of subset via passthrough, malformed frequency
pub const CONNECTIONS: &str = "\
:START_ID,:END_ID,:TYPE,frequency
C0011849,C0020538,COEXISTS_WITH,12
C0011849,C9999999,TREATS,3
C0020538,C0011849,COEXISTS_WITH,often
";

pub fn write_gz(path: &Path, text: &str) {
    let mut enc = GzEncoder::new(std::fs::File::create(path).unwrap(), Compression::default());
    enc.write_all(text.as_bytes()).unwrap();
    enc.finish().unwrap();
}

/// Write every fixture file into `dir` and return the config path.
pub fn write_fixture(dir: &Path) -> PathBuf {
    std::fs::write(dir.join("subset_nodes.csv"), SUBSET).unwrap();
    std::fs::write(dir.join("node_mappings.json"), MAPPINGS).unwrap();
    std::fs::write(dir.join("biokde_edges.csv"), BIOKDE_EDGES).unwrap();
    std::fs::write(dir.join("primekg_nodes.csv"), PRIMEKG_NODES).unwrap();
    std::fs::write(dir.join("primekg_edges.csv"), PRIMEKG_EDGES).unwrap();
    write_gz(&dir.join("connections.csv.gz"), CONNECTIONS);
    let config = dir.join("merge.toml");
    std::fs::write(&config, CONFIG).unwrap();
    config
}

pub fn load_fixture(dir: &Path) -> MergeConfig {
    MergeConfig::load(&write_fixture(dir)).unwrap()
}

pub fn assert_conserved(summary: &MergeSummary) {
    for stats in &summary.sources {
        assert!(stats.is_conserved(), "counts do not add up: {stats:?}");
    }
}

pub fn find<'a>(edges: &'a [CanonicalEdgeRecord], id: &str) -> &'a CanonicalEdgeRecord {
    edges
        .iter()
        .find(|e| e.id == id)
        .unwrap_or_else(|| panic!("no edge {id}"))
}
