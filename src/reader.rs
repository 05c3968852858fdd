//! Per-source lazy edge streams.
//!
//! [`SourceEdgeReader`] turns a source's edge files into a single sequence of
//! [`RawRow`]s using the source's declared [`ColumnLayout`]. Files are opened
//! one at a time, on demand; nothing is buffered beyond the current record.

use std::path::PathBuf;

use serde_json::Number;

use crate::config::{ColumnLayout, SourceConfig};
use crate::error::SourceError;
use crate::mapping::resolve_column;
use crate::record::{ABSENT_SLOT, ID_SEPARATOR, Qualifiers};
use crate::table::{ColumnRef, DelimitedReader, Row};

/// One edge as the source wrote it, before identifier resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEdgeRecord {
    /// 1-based line of the record in its file.
    pub line: u64,
    pub subject: String,
    pub object: String,
    pub relation: String,
    pub label: Option<String>,
    pub frequency: Option<Number>,
    pub probability: Option<Number>,
    pub negated: Option<bool>,
    pub qualifiers: Qualifiers,
    pub publications: Vec<String>,
    /// `(column label, value)` pairs of the configured attribute columns.
    pub attributes: Vec<(String, String)>,
}

impl RawEdgeRecord {
    pub fn new(subject: &str, object: &str, relation: &str) -> Self {
        Self {
            subject: subject.to_string(),
            object: object.to_string(),
            relation: relation.to_string(),
            ..Self::default()
        }
    }
}

/// A record pulled from a source: either an edge or a row that could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
    Edge(RawEdgeRecord),
    Malformed { line: u64, reason: String },
}

/// Column indices of a layout, resolved against one file's header.
#[derive(Debug, Clone)]
struct ResolvedLayout {
    subject: usize,
    object: usize,
    relation: usize,
    label: Option<usize>,
    frequency: Option<usize>,
    probability: Option<usize>,
    negated: Option<usize>,
    qualified_predicate: Option<usize>,
    qualified_object_aspect: Option<usize>,
    qualified_object_direction: Option<usize>,
    publications: Option<usize>,
    attributes: Vec<(usize, String)>,
    min_fields: usize,
}

impl ResolvedLayout {
    fn resolve(
        layout: &ColumnLayout,
        reader: &DelimitedReader,
        source: &str,
    ) -> Result<Self, SourceError> {
        let req = |c: &ColumnRef| resolve_column(c, reader, source);
        let opt = |c: &Option<ColumnRef>| c.as_ref().map(|c| req(c)).transpose();

        let mut attributes = Vec::with_capacity(layout.attributes.len());
        for column in &layout.attributes {
            attributes.push((req(column)?, column.label(reader.header())));
        }

        let mut resolved = Self {
            subject: req(&layout.subject)?,
            object: req(&layout.object)?,
            relation: req(&layout.relation)?,
            label: opt(&layout.label)?,
            frequency: opt(&layout.frequency)?,
            probability: opt(&layout.probability)?,
            negated: opt(&layout.negated)?,
            qualified_predicate: opt(&layout.qualified_predicate)?,
            qualified_object_aspect: opt(&layout.qualified_object_aspect)?,
            qualified_object_direction: opt(&layout.qualified_object_direction)?,
            publications: opt(&layout.publications)?,
            attributes,
            min_fields: 0,
        };
        resolved.min_fields = resolved.max_index() + 1;
        Ok(resolved)
    }

    /// Highest referenced column; every record must reach it.
    fn max_index(&self) -> usize {
        [self.subject, self.object, self.relation]
            .into_iter()
            .chain(self.label)
            .chain(self.frequency)
            .chain(self.probability)
            .chain(self.negated)
            .chain(self.qualified_predicate)
            .chain(self.qualified_object_aspect)
            .chain(self.qualified_object_direction)
            .chain(self.publications)
            .chain(self.attributes.iter().map(|(i, _)| *i))
            .max()
            .unwrap_or(0)
    }

    fn parse(&self, row: &Row) -> RawRow {
        match self.parse_edge(row) {
            Ok(edge) => RawRow::Edge(edge),
            Err(reason) => RawRow::Malformed {
                line: row.line,
                reason,
            },
        }
    }

    fn parse_edge(&self, row: &Row) -> Result<RawEdgeRecord, String> {
        if row.unterminated {
            return Err("unterminated quoted field".into());
        }
        if row.fields.len() < self.min_fields {
            return Err(format!(
                "expected at least {} fields, found {}",
                self.min_fields,
                row.fields.len()
            ));
        }
        let required = |idx: usize, what: &str| {
            let value = row.get(idx).trim();
            if value.is_empty() {
                Err(format!("empty {what}"))
            } else {
                Ok(value.to_string())
            }
        };
        let cell = |idx: Option<usize>| {
            idx.map(|i| row.get(i).trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let number = |idx: Option<usize>, what: &str| match cell(idx) {
            None => Ok(None),
            Some(v) => parse_number(&v)
                .map(Some)
                .ok_or_else(|| format!("unparseable {what} \"{v}\"")),
        };

        let negated = match cell(self.negated) {
            None => None,
            Some(v) => Some(parse_flag(&v).ok_or_else(|| format!("unparseable negation \"{v}\""))?),
        };
        let publications = cell(self.publications)
            .map(|v| {
                v.split('|')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let attributes = self
            .attributes
            .iter()
            .filter_map(|(idx, label)| cell(Some(*idx)).map(|v| (label.clone(), v)))
            .collect();

        let subject = required(self.subject, "subject")?;
        let object = required(self.object, "object")?;
        let relation = required(self.relation, "relation")?;
        let qualifiers = Qualifiers {
            predicate: cell(self.qualified_predicate),
            object_aspect: cell(self.qualified_object_aspect),
            object_direction: cell(self.qualified_object_direction),
        };
        check_id_parts(&subject, &object, &relation, &qualifiers)?;

        Ok(RawEdgeRecord {
            line: row.line,
            subject,
            object,
            relation,
            label: cell(self.label),
            frequency: number(self.frequency, "frequency")?,
            probability: number(self.probability, "probability")?,
            negated,
            qualifiers,
            publications,
            attributes,
        })
    }
}

/// Values that end up in the edge id must keep it unambiguous.
fn check_id_parts(
    subject: &str,
    object: &str,
    relation: &str,
    qualifiers: &Qualifiers,
) -> Result<(), String> {
    let slots = [
        ("qualified predicate", &qualifiers.predicate),
        ("qualified object aspect", &qualifiers.object_aspect),
        ("qualified object direction", &qualifiers.object_direction),
    ];
    if let Some((what, _)) = slots
        .iter()
        .find(|(_, q)| q.as_deref() == Some(ABSENT_SLOT))
    {
        return Err(format!("{what} \"{ABSENT_SLOT}\" reads as an absent qualifier"));
    }
    let parts = [("subject", subject), ("object", object), ("relation", relation)]
        .into_iter()
        .chain(slots.iter().filter_map(|(what, q)| q.as_deref().map(|v| (*what, v))));
    for (what, value) in parts {
        if value.contains(ID_SEPARATOR) {
            return Err(format!("{what} contains the edge id separator \"{ID_SEPARATOR}\""));
        }
    }
    Ok(())
}

/// Integers stay integers; anything else must be a finite float.
pub fn parse_number(raw: &str) -> Option<Number> {
    let raw = raw.trim();
    if let Ok(i) = raw.parse::<i64>() {
        return Some(Number::from(i));
    }
    raw.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Parse a negation cell. Unknown spellings are `None`.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "1" => Some(true),
        "false" | "f" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Lazy, single-pass reader over all edge files of one source.
///
/// Yields `Err` at most once: after a source-level failure the reader is fused.
pub struct SourceEdgeReader<'a> {
    source: &'a SourceConfig,
    pending: std::slice::Iter<'a, PathBuf>,
    current: Option<(DelimitedReader, ResolvedLayout)>,
    limit: Option<u64>,
    read: u64,
    done: bool,
}

impl<'a> SourceEdgeReader<'a> {
    /// Prepare to read `source`. No file is opened until the first record is requested.
    pub fn new(source: &'a SourceConfig, limit: Option<u64>) -> Self {
        Self {
            source,
            pending: source.paths.iter(),
            current: None,
            limit,
            read: 0,
            done: false,
        }
    }

    /// Records yielded so far, malformed ones included.
    pub fn read_count(&self) -> u64 {
        self.read
    }

    fn open_next(&mut self) -> Option<Result<(), SourceError>> {
        let path = self.pending.next()?;
        let opened = DelimitedReader::open(path, self.source.delimiter, self.source.has_header)
            .map_err(|e| SourceError::Unavailable {
                source_name: self.source.name.clone(),
                path: path.display().to_string(),
                source: e,
            })
            .and_then(|reader| {
                let layout = ResolvedLayout::resolve(&self.source.columns, &reader, &self.source.name)?;
                Ok((reader, layout))
            });
        Some(opened.map(|current| {
            tracing::debug!(source = %self.source.name, path = %path.display(), "opened edge file");
            self.current = Some(current);
        }))
    }

    fn fail(&mut self, err: SourceError) -> Option<Result<RawRow, SourceError>> {
        self.done = true;
        self.current = None;
        Some(Err(err))
    }
}

impl Iterator for SourceEdgeReader<'_> {
    type Item = Result<RawRow, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.limit.is_some_and(|limit| self.read >= limit) {
            self.done = true;
            return None;
        }
        loop {
            let Some((reader, layout)) = self.current.as_mut() else {
                match self.open_next() {
                    None => {
                        self.done = true;
                        return None;
                    }
                    Some(Ok(())) => continue,
                    Some(Err(e)) => return self.fail(e),
                }
            };
            match reader.next_row() {
                Some(Ok(row)) => {
                    self.read += 1;
                    return Some(Ok(layout.parse(&row)));
                }
                Some(Err(e)) => {
                    let err = SourceError::Read {
                        source_name: self.source.name.clone(),
                        path: reader.path().display().to_string(),
                        line: reader.line(),
                        source: e,
                    };
                    return self.fail(err);
                }
                None => self.current = None,
            }
        }
    }
}
