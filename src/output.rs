//! JSON Lines output and the run summary file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::engine::{EdgeSink, MergeSummary};
use crate::error::OutputError;
use crate::nodes::{NodeRecord, NodeSink};
use crate::record::CanonicalEdgeRecord;

/// Append-only writer of one JSON object per line.
pub struct JsonlWriter<W: Write> {
    out: W,
    target: String,
    written: u64,
}

impl JsonlWriter<BufWriter<File>> {
    /// Create (or truncate) `path`.
    pub fn create(path: &Path) -> Result<Self, OutputError> {
        let file = File::create(path).map_err(|e| OutputError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Self::new(BufWriter::new(file), path.display().to_string()))
    }
}

impl<W: Write> JsonlWriter<W> {
    /// Wrap any writer. `target` names it in error messages.
    pub fn new(out: W, target: impl Into<String>) -> Self {
        Self {
            out,
            target: target.into(),
            written: 0,
        }
    }

    /// Lines written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn write_value<T: Serialize>(&mut self, value: &T) -> Result<(), OutputError> {
        serde_json::to_writer(&mut self.out, value).map_err(|e| {
            if e.is_io() {
                OutputError::Io {
                    path: self.target.clone(),
                    source: e.into(),
                }
            } else {
                OutputError::Serialize {
                    what: "record".into(),
                    message: e.to_string(),
                }
            }
        })?;
        self.out.write_all(b"\n").map_err(|e| self.io_error(e))?;
        self.written += 1;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W, OutputError> {
        self.out.flush().map_err(|e| self.io_error(e))?;
        tracing::debug!(target_file = %self.target, lines = self.written, "output flushed");
        Ok(self.out)
    }

    fn io_error(&self, source: std::io::Error) -> OutputError {
        OutputError::Io {
            path: self.target.clone(),
            source,
        }
    }
}

impl<W: Write> EdgeSink for JsonlWriter<W> {
    fn write_edge(&mut self, edge: CanonicalEdgeRecord) -> Result<(), OutputError> {
        self.write_value(&edge)
    }
}

impl<W: Write> NodeSink for JsonlWriter<W> {
    fn write_node(&mut self, node: NodeRecord) -> Result<(), OutputError> {
        self.write_value(&node)
    }
}

/// Default summary location: `edges.jsonl` → `edges_stats.json`, same directory.
pub fn summary_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "merged_edges".into());
    output.with_file_name(format!("{stem}_stats.json"))
}

/// Write the summary as pretty-printed JSON.
pub fn write_summary(path: &Path, summary: &MergeSummary) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(summary).map_err(|e| OutputError::Serialize {
        what: "merge summary".into(),
        message: e.to_string(),
    })?;
    std::fs::write(path, json + "\n").map_err(|e| OutputError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    tracing::info!(path = %path.display(), "summary written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::curie::Curie;
    use crate::engine::SourceStats;

    #[test]
    fn one_object_per_line() {
        let mut writer = JsonlWriter::new(Vec::new(), "memory");
        let node = NodeRecord::new(
            Curie::parse("PRIMEKG:1").unwrap(),
            Some("aspirin".into()),
            Category::Drug,
            "PRIMEKG:",
            "2026-01-01 00:00:00",
        );
        writer.write_node(node.clone()).unwrap();
        writer.write_node(node).unwrap();
        assert_eq!(writer.written(), 2);
        let bytes = writer.finish().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: NodeRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.category, "biolink:Drug");
    }

    #[test]
    fn summary_path_next_to_output() {
        assert_eq!(
            summary_path_for(Path::new("/out/merged_edges.jsonl")),
            PathBuf::from("/out/merged_edges_stats.json")
        );
        assert_eq!(
            summary_path_for(Path::new("edges.jsonl")),
            PathBuf::from("edges_stats.json")
        );
    }

    #[test]
    fn summary_file_is_pretty_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("edges_stats.json");
        let mut stats = SourceStats::new("BioKDE");
        stats.read = 3;
        stats.emitted = 3;
        let summary = MergeSummary {
            update_date: "2026-01-01 00:00:00".into(),
            limit: Some(100),
            mapping_entries: 10,
            subset_size: 8,
            node_sources: Vec::new(),
            sources: vec![stats],
            total_emitted: 3,
            aborted: false,
        };
        write_summary(&path, &summary).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["sources"][0]["source"], "BioKDE");
        assert_eq!(value["sources"][0]["status"], "completed");
        assert_eq!(value["limit"], 100);
    }

    #[test]
    fn create_in_missing_directory_fails() {
        let err = JsonlWriter::create(Path::new("/no/such/dir/edges.jsonl")).err().unwrap();
        assert!(matches!(err, OutputError::Io { .. }));
    }
}
