//! Delimited text input: plain or gzip-compressed, read one record at a time.
//!
//! Every tabular input (edge files, mapping tables, subset lists, node files)
//! goes through [`DelimitedReader`]. Records are never buffered beyond the one
//! being split, so peak memory does not depend on file size.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};

/// A column addressed by zero-based position or by header name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnRef::Index(i) => write!(f, "#{i}"),
            ColumnRef::Name(n) => f.write_str(n),
        }
    }
}

/// Why a [`ColumnRef`] could not be resolved against a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Named column, but the file was opened without a header.
    NoHeader(String),
    /// Named column not present in the header.
    Missing(String),
}

impl ColumnRef {
    /// Resolve to a field index using the file's header, if any.
    pub fn resolve(&self, header: Option<&[String]>) -> Result<usize, ResolveError> {
        match self {
            ColumnRef::Index(i) => Ok(*i),
            ColumnRef::Name(name) => {
                let header = header.ok_or_else(|| ResolveError::NoHeader(name.clone()))?;
                header
                    .iter()
                    .position(|h| h == name)
                    .or_else(|| header.iter().position(|h| h.trim() == name.trim()))
                    .ok_or_else(|| ResolveError::Missing(name.clone()))
            }
        }
    }

    /// Label used for attribute keys: the header name, or `col<N>`.
    pub fn label(&self, header: Option<&[String]>) -> String {
        match self {
            ColumnRef::Name(n) => n.trim_start_matches(':').to_string(),
            ColumnRef::Index(i) => header
                .and_then(|h| h.get(*i))
                .map(|h| h.trim_start_matches(':').to_string())
                .unwrap_or_else(|| format!("col{i}")),
        }
    }
}

/// Longest record a quoted field may grow to across physical lines.
pub const MAX_RECORD_BYTES: usize = 131_072;

/// One data record: its 1-based starting line number and its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub line: u64,
    pub fields: Vec<String>,
    /// A quote opened on this line was never closed. `fields` is the line split
    /// without quoting and the following lines are read as records of their own.
    pub unterminated: bool,
}

impl Row {
    /// Field at `idx`, or `""` if the row is short.
    pub fn get(&self, idx: usize) -> &str {
        self.fields.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// Open a text file, transparently decompressing `.gz` inputs.
pub fn open_text(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let gz = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    if gz {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Decode one physical line: UTF-8 if valid, otherwise Latin-1.
///
/// Latin-1 maps every byte to a char, so decoding never fails.
pub fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes
        .strip_suffix(b"\n")
        .map(|b| b.strip_suffix(b"\r").unwrap_or(b))
        .unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Split a record on `delimiter`, honouring double quotes.
///
/// Returns `None` if a quoted field is still open at the end of `line`; the
/// caller should append the next physical line and try again.
pub fn split_fields(line: &str, delimiter: char) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' && field.is_empty() {
            in_quotes = true;
        } else if c == delimiter {
            fields.push(std::mem::take(&mut field));
        } else {
            field.push(c);
        }
    }

    if in_quotes {
        return None;
    }
    fields.push(field);
    Some(fields)
}

/// Streaming reader over a delimited text file.
pub struct DelimitedReader {
    path: PathBuf,
    input: Box<dyn BufRead>,
    delimiter: char,
    header: Option<Vec<String>>,
    line: u64,
    buf: Vec<u8>,
    /// Physical lines read ahead while looking for a closing quote.
    pushed_back: VecDeque<(u64, String)>,
}

impl DelimitedReader {
    /// Open `path` and, if `has_header`, consume its first record as the header.
    pub fn open(path: &Path, delimiter: char, has_header: bool) -> io::Result<Self> {
        let input = open_text(path)?;
        Self::from_reader(path, input, delimiter, has_header)
    }

    /// Wrap an already-open reader. `path` is used for diagnostics only.
    pub fn from_reader(
        path: &Path,
        input: Box<dyn BufRead>,
        delimiter: char,
        has_header: bool,
    ) -> io::Result<Self> {
        let mut reader = Self {
            path: path.to_path_buf(),
            input,
            delimiter,
            header: None,
            line: 0,
            buf: Vec::new(),
            pushed_back: VecDeque::new(),
        };
        if has_header {
            reader.header = match reader.next_row() {
                Some(row) => Some(row?.fields),
                None => Some(Vec::new()),
            };
        }
        Ok(reader)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Last physical line consumed.
    pub fn line(&self) -> u64 {
        self.line
    }

    fn read_physical(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        let n = self.input.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.line += 1;
        let mut text = decode_line(&self.buf);
        if self.line == 1 {
            if let Some(stripped) = text.strip_prefix('\u{feff}') {
                text = stripped.to_string();
            }
        }
        Ok(Some(text))
    }

    fn next_physical(&mut self) -> io::Result<Option<String>> {
        if let Some((line, text)) = self.pushed_back.pop_front() {
            self.line = line;
            return Ok(Some(text));
        }
        self.read_physical()
    }

    /// Next non-blank record, or `None` at end of input.
    ///
    /// A quoted field may span lines up to [`MAX_RECORD_BYTES`]. Past that, or at
    /// end of input, the opening line comes back as an unterminated row and
    /// reading resumes at the line after it.
    pub fn next_row(&mut self) -> Option<io::Result<Row>> {
        loop {
            let first = match self.next_physical() {
                Ok(Some(text)) => text,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };
            if first.trim().is_empty() {
                continue;
            }
            let start = self.line;
            let mut record = first.clone();
            let mut read_ahead = Vec::new();
            loop {
                if let Some(fields) = split_fields(&record, self.delimiter) {
                    return Some(Ok(Row {
                        line: start,
                        fields,
                        unterminated: false,
                    }));
                }
                if record.len() > MAX_RECORD_BYTES {
                    break;
                }
                match self.next_physical() {
                    Ok(Some(more)) => {
                        record.push('\n');
                        record.push_str(&more);
                        read_ahead.push((self.line, more));
                    }
                    Ok(None) => break,
                    Err(e) => return Some(Err(e)),
                }
            }

            tracing::debug!(
                path = %self.path.display(),
                line = start,
                lines_scanned = read_ahead.len() + 1,
                "unterminated quoted field"
            );
            for entry in read_ahead.into_iter().rev() {
                self.pushed_back.push_front(entry);
            }
            self.line = start;
            return Some(Ok(Row {
                line: start,
                fields: first.split(self.delimiter).map(str::to_string).collect(),
                unterminated: true,
            }));
        }
    }
}

impl Iterator for DelimitedReader {
    type Item = io::Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    fn reader_over(text: &str, has_header: bool) -> DelimitedReader {
        let input: Box<dyn BufRead> = Box::new(io::Cursor::new(text.as_bytes().to_vec()));
        DelimitedReader::from_reader(Path::new("mem.csv"), input, ',', has_header).unwrap()
    }

    #[test]
    fn split_plain_and_quoted() {
        assert_eq!(split_fields("a,b,c", ',').unwrap(), vec!["a", "b", "c"]);
        assert_eq!(
            split_fields("\"C0001\",\"x, y\",3", ',').unwrap(),
            vec!["C0001", "x, y", "3"]
        );
        assert_eq!(
            split_fields("\"say \"\"hi\"\"\",2", ',').unwrap(),
            vec!["say \"hi\"", "2"]
        );
        assert_eq!(split_fields("a,,c,", ',').unwrap(), vec!["a", "", "c", ""]);
        assert!(split_fields("\"open,field", ',').is_none());
    }

    #[test]
    fn split_tab_delimited() {
        assert_eq!(split_fields("1\t2\tTREATS", '\t').unwrap(), vec!["1", "2", "TREATS"]);
    }

    #[test]
    fn decode_falls_back_to_latin1() {
        assert_eq!(decode_line(b"caf\xc3\xa9\r\n"), "café");
        assert_eq!(decode_line(b"caf\xe9\n"), "café");
    }

    #[test]
    fn header_and_rows() {
        let mut r = reader_over("x_index,y_index,relation\n1,2,ppi\n\n3,4,ppi\n", true);
        assert_eq!(r.header().unwrap(), ["x_index", "y_index", "relation"]);
        let rows: Vec<Row> = r.by_ref().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].line, 4);
        assert_eq!(rows[1].get(2), "ppi");
        assert_eq!(rows[1].get(7), "");
    }

    #[test]
    fn quoted_field_spanning_lines() {
        let mut r = reader_over("id,text\n1,\"first\nsecond\"\n2,plain\n", true);
        let first = r.next_row().unwrap().unwrap();
        assert_eq!(first.fields, vec!["1", "first\nsecond"]);
        assert_eq!(first.line, 2);
        let second = r.next_row().unwrap().unwrap();
        assert_eq!(second.line, 4);
    }

    #[test]
    fn stray_quote_does_not_swallow_the_rest_of_the_file() {
        let mut r = reader_over("s,o,r\n\"1,2,a\n3,4,b\n5,6,c\n7,8,d\n", true);
        let rows: Vec<Row> = r.by_ref().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 4);
        assert!(rows[0].unterminated);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].fields, vec!["\"1", "2", "a"]);
        assert!(rows[1..].iter().all(|row| !row.unterminated));
        assert_eq!(rows[1].fields, vec!["3", "4", "b"]);
        assert_eq!(rows[3].line, 5);
    }

    #[test]
    fn quoted_continuation_is_bounded() {
        let filler = "x".repeat(100);
        let mut text = String::from("\"open,1,2\n");
        for i in 0..2_000 {
            text.push_str(&format!("{i},{filler},ok\n"));
        }
        text.push_str("last,\"quoted, closed\",z\n");
        let rows: Vec<Row> = reader_over(&text, false).map(Result::unwrap).collect();

        assert_eq!(rows.len(), 2_002);
        assert!(rows[0].unterminated);
        assert_eq!(rows[1].fields[0], "0");
        assert_eq!(rows[1].line, 2);
        assert_eq!(rows[2_000].fields[0], "1999");
        assert_eq!(rows[2_001].fields, vec!["last", "quoted, closed", "z"]);
        assert!(rows[1..].iter().all(|row| !row.unterminated));
    }

    #[test]
    fn bom_is_stripped_from_header() {
        let r = reader_over("\u{feff}id,name\n", true);
        assert_eq!(r.header().unwrap()[0], "id");
    }

    #[test]
    fn resolve_columns() {
        let header = vec![":START_ID".to_string(), ":END_ID".to_string()];
        assert_eq!(
            ColumnRef::Name(":END_ID".into()).resolve(Some(&header)),
            Ok(1)
        );
        assert_eq!(
            ColumnRef::Name("nope".into()).resolve(Some(&header)),
            Err(ResolveError::Missing("nope".into()))
        );
        assert_eq!(
            ColumnRef::Name("x".into()).resolve(None),
            Err(ResolveError::NoHeader("x".into()))
        );
        assert_eq!(ColumnRef::Index(4).resolve(None), Ok(4));
        assert_eq!(ColumnRef::Index(0).label(Some(&header)), "START_ID");
        assert_eq!(ColumnRef::Index(9).label(None), "col9");
    }

    #[test]
    fn reads_gzip_by_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("connections.csv.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(b"C0001,C0002,TREATS,4\n").unwrap();
        enc.finish().unwrap();

        let rows: Vec<Row> = DelimitedReader::open(&path, ',', false)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fields, vec!["C0001", "C0002", "TREATS", "4"]);
    }

    #[test]
    fn corrupt_gzip_surfaces_as_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.csv.gz");
        std::fs::write(&path, b"definitely not gzip").unwrap();

        let mut reader = match DelimitedReader::open(&path, ',', false) {
            Ok(r) => r,
            Err(_) => return,
        };
        assert!(matches!(reader.next_row(), Some(Err(_))));
    }
}
