//! Rich diagnostic error types for kg-merge.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Per-record conditions (unmappable ids,
//! out-of-subset endpoints, duplicates, malformed rows) are not errors: they are
//! tallied in [`crate::engine::SourceStats`] and never surface here.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for kg-merge.
#[derive(Debug, Error, Diagnostic)]
pub enum KgError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Output(#[from] OutputError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read merge config: {path}")]
    #[diagnostic(
        code(kg::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse merge config {path}: {message}")]
    #[diagnostic(
        code(kg::config::parse),
        help("Check the TOML syntax. `kg-merge sources` prints the sources of a valid config.")
    )]
    Parse { path: String, message: String },

    #[error("invalid merge config: {message}")]
    #[diagnostic(
        code(kg::config::invalid),
        help("Fix the offending section of the config file and re-run.")
    )]
    Invalid { message: String },

    #[error("unknown source: \"{name}\"")]
    #[diagnostic(
        code(kg::config::unknown_source),
        help("List configured sources with `kg-merge sources`.")
    )]
    UnknownSource { name: String },

    #[error("source \"{source_name}\" references unknown mapping table \"{table}\"")]
    #[diagnostic(
        code(kg::config::unknown_table),
        help("Declare the table in a [[tables]] section or remove it from the source's mapping chain.")
    )]
    UnknownTable { source_name: String, table: String },
}

// ---------------------------------------------------------------------------
// Source input errors
// ---------------------------------------------------------------------------

/// Source-level input failures. These are fatal for the affected source only;
/// the failure policy decides whether the run continues.
#[derive(Debug, Error, Diagnostic)]
pub enum SourceError {
    #[error("source \"{source_name}\" is unavailable: {path}")]
    #[diagnostic(
        code(kg::source::unavailable),
        help("Check that the input file exists and is readable, or deselect the source with --source.")
    )]
    Unavailable {
        source_name: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed reading source \"{source_name}\" at {path} (line {line})")]
    #[diagnostic(
        code(kg::source::read),
        help(
            "The input stream broke mid-file. For .gz inputs this usually means a truncated \
             or corrupt archive; re-download the file and re-run."
        )
    )]
    Read {
        source_name: String,
        path: String,
        line: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("source \"{source_name}\" has no column \"{column}\" in {path}")]
    #[diagnostic(
        code(kg::source::missing_column),
        help("Check the header of the input file against the [sources.columns] section of the config.")
    )]
    MissingColumn {
        source_name: String,
        path: String,
        column: String,
    },

    #[error("source \"{source_name}\" refers to column \"{column}\" by name but {path} has no header")]
    #[diagnostic(
        code(kg::source::no_header),
        help("Set `has_header = true` or refer to columns by zero-based index.")
    )]
    MissingHeader {
        source_name: String,
        path: String,
        column: String,
    },
}

// ---------------------------------------------------------------------------
// Mapping and subset errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MappingError {
    #[error("mapping table \"{table}\" is empty")]
    #[diagnostic(
        code(kg::mapping::empty_table),
        help(
            "An empty table would silently drop every edge of the sources using it. \
             Check the table's path and key/value columns, or set `mapping_mode = \"passthrough\"` \
             to run without it."
        )
    )]
    EmptyTable { table: String },

    #[error("source \"{source_name}\" has no mapping steps")]
    #[diagnostic(
        code(kg::mapping::no_chain),
        help(
            "Local identifiers are never treated as canonical implicitly. Add a `mapping` chain \
             to the source or set `mapping_mode = \"passthrough\"`."
        )
    )]
    NoChain { source_name: String },

    #[error("subset is empty")]
    #[diagnostic(
        code(kg::mapping::empty_subset),
        help("Every edge would be dropped as out-of-subset. Check the [subset] section of the config.")
    )]
    EmptySubset,

    #[error("mapping table \"{table}\" at {path}: {message}")]
    #[diagnostic(
        code(kg::mapping::table_format),
        help("JSON tables must contain an object of string keys to string values.")
    )]
    TableFormat {
        table: String,
        path: String,
        message: String,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Input(#[from] SourceError),
}

// ---------------------------------------------------------------------------
// Output errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum OutputError {
    #[error("failed to write output: {path}")]
    #[diagnostic(
        code(kg::output::io),
        help("Ensure the output directory exists, is writable, and the disk is not full.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {what}: {message}")]
    #[diagnostic(code(kg::output::serialize), help("This is a bug; please report it."))]
    Serialize { what: String, message: String },
}

/// Convenience alias for kg-merge results.
pub type KgResult<T> = std::result::Result<T, KgError>;
