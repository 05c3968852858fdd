//! Source type hints to Biolink categories.

use serde::{Deserialize, Serialize};

/// Biolink categories assigned by the node pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    NamedThing,
    AnatomicalEntity,
    OrganismTaxon,
    ChemicalEntity,
    Disease,
    Drug,
    Gene,
    Protein,
    Pathway,
    PhenotypicFeature,
    Cell,
    SequenceVariant,
    BiologicalProcess,
    CellularComponent,
    MolecularActivity,
    RetrievalSource,
}

impl Category {
    /// Biolink CURIE, e.g. `biolink:Disease`.
    pub fn curie(self) -> &'static str {
        match self {
            Category::NamedThing => "biolink:NamedThing",
            Category::AnatomicalEntity => "biolink:AnatomicalEntity",
            Category::OrganismTaxon => "biolink:OrganismTaxon",
            Category::ChemicalEntity => "biolink:ChemicalEntity",
            Category::Disease => "biolink:Disease",
            Category::Drug => "biolink:Drug",
            Category::Gene => "biolink:Gene",
            Category::Protein => "biolink:Protein",
            Category::Pathway => "biolink:Pathway",
            Category::PhenotypicFeature => "biolink:PhenotypicFeature",
            Category::Cell => "biolink:Cell",
            Category::SequenceVariant => "biolink:SequenceVariant",
            Category::BiologicalProcess => "biolink:BiologicalProcess",
            Category::CellularComponent => "biolink:CellularComponent",
            Category::MolecularActivity => "biolink:MolecularActivity",
            Category::RetrievalSource => "biolink:RetrievalSource",
        }
    }

    /// Snake-case label, e.g. `anatomical_entity`.
    pub fn label(self) -> &'static str {
        match self {
            Category::NamedThing => "named_thing",
            Category::AnatomicalEntity => "anatomical_entity",
            Category::OrganismTaxon => "organism_taxon",
            Category::ChemicalEntity => "chemical_entity",
            Category::Disease => "disease",
            Category::Drug => "drug",
            Category::Gene => "gene",
            Category::Protein => "protein",
            Category::Pathway => "pathway",
            Category::PhenotypicFeature => "phenotypic_feature",
            Category::Cell => "cell",
            Category::SequenceVariant => "sequence_variant",
            Category::BiologicalProcess => "biological_process",
            Category::CellularComponent => "cellular_component",
            Category::MolecularActivity => "molecular_activity",
            Category::RetrievalSource => "retrieval_source",
        }
    }

    /// Inverse of [`Category::curie`].
    pub fn from_curie(curie: &str) -> Option<Self> {
        ALL.iter().copied().find(|c| c.curie() == curie)
    }
}

const ALL: [Category; 16] = [
    Category::NamedThing,
    Category::AnatomicalEntity,
    Category::OrganismTaxon,
    Category::ChemicalEntity,
    Category::Disease,
    Category::Drug,
    Category::Gene,
    Category::Protein,
    Category::Pathway,
    Category::PhenotypicFeature,
    Category::Cell,
    Category::SequenceVariant,
    Category::BiologicalProcess,
    Category::CellularComponent,
    Category::MolecularActivity,
    Category::RetrievalSource,
];

/// How a node source's category cell is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vocabulary {
    /// UMLS semantic-type abbreviations (`dsyn`, `gngm`, ...).
    Semmeddb,
    /// PrimeKG `node_type` values (`gene/protein`, `disease`, ...).
    Primekg,
    /// Substring heuristics over free-form type names.
    Keyword,
    /// The cell already holds a Biolink CURIE.
    Biolink,
    /// Every node is a `biolink:NamedThing`.
    #[default]
    None,
}

impl Vocabulary {
    /// Categorize one type hint. Unknown or empty hints give `NamedThing`.
    pub fn categorize(self, hint: &str) -> Category {
        let hint = hint.trim();
        if hint.is_empty() {
            return Category::NamedThing;
        }
        let found = match self {
            Vocabulary::Semmeddb => semantic_type(&hint.to_lowercase()),
            Vocabulary::Primekg => primekg_type(&hint.to_lowercase()),
            Vocabulary::Keyword => keyword(&hint.to_lowercase()),
            Vocabulary::Biolink => Category::from_curie(hint),
            Vocabulary::None => None,
        };
        found.unwrap_or(Category::NamedThing)
    }
}

fn semantic_type(abbrev: &str) -> Option<Category> {
    let category = match abbrev {
        "aapp" | "bpoc" => Category::AnatomicalEntity,
        "bact" | "orga" | "virs" => Category::OrganismTaxon,
        "chem" => Category::ChemicalEntity,
        "diap" | "dsyn" | "mobd" | "neop" | "sosy" => Category::Disease,
        "drdd" | "imft" | "npop" | "phsu" => Category::Drug,
        "ftcn" | "lbpr" => Category::NamedThing,
        "gngm" => Category::Gene,
        _ => return None,
    };
    Some(category)
}

fn primekg_type(node_type: &str) -> Option<Category> {
    let category = match node_type {
        "gene/protein" => Category::Gene,
        "drug" => Category::Drug,
        "disease" | "side_effect" | "indication" | "contraindication" | "off_label_use"
        | "symptom" => Category::Disease,
        "pathway" => Category::Pathway,
        "protein" => Category::Protein,
        "anatomy" => Category::AnatomicalEntity,
        "phenotype" | "effect/phenotype" => Category::PhenotypicFeature,
        "biological_process" => Category::BiologicalProcess,
        "cellular_component" => Category::CellularComponent,
        "molecular_function" => Category::MolecularActivity,
        _ => return None,
    };
    Some(category)
}

// Checked in order; the first matching substring wins.
const KEYWORDS: &[(&str, Category)] = &[
    ("gene", Category::Gene),
    ("protein", Category::Gene),
    ("disease", Category::Disease),
    ("chemical", Category::ChemicalEntity),
    ("drug", Category::ChemicalEntity),
    ("anatomy", Category::AnatomicalEntity),
    ("pathway", Category::Pathway),
    ("species", Category::OrganismTaxon),
    ("cell", Category::Cell),
    ("mutation", Category::SequenceVariant),
    ("biological process", Category::BiologicalProcess),
    ("molecular function", Category::MolecularActivity),
];

fn keyword(type_name: &str) -> Option<Category> {
    KEYWORDS
        .iter()
        .find(|(needle, _)| type_name.contains(needle))
        .map(|&(_, category)| category)
}
