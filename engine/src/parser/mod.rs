//! Delimited-text tokenizing with encoding and delimiter auto-detection.
//!
//! Turns raw bytes into rows of string tokens. No typing or naming happens
//! here: that is the job of [`crate::import`].
//!
//! Two orientations expose the same "next sequence of tokens" contract:
//! rows are streamed as read, while [`ColumnReader`] materializes the whole
//! grid and yields it column by column.

pub mod dates;

use std::io::Read;

use crate::error::{ImportError, ImportResult};

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding label.
///
/// `"auto"` runs [`detect_encoding`] first. Any other label must be known to
/// encoding_rs (WHATWG labels such as `utf-8`, `latin1`, `utf-16le`).
pub fn decode_content(bytes: &[u8], encoding: &str) -> ImportResult<String> {
    let label = if encoding.eq_ignore_ascii_case("auto") {
        detect_encoding(bytes)
    } else {
        encoding.to_string()
    };

    let normalized = label.to_lowercase().replace('_', "-");
    let codec = match normalized.as_str() {
        "utf8" => Some(encoding_rs::UTF_8),
        "latin-1" => Some(encoding_rs::WINDOWS_1252),
        other => encoding_rs::Encoding::for_label(other.as_bytes()),
    }
    .ok_or_else(|| ImportError::Encoding(format!("unknown encoding '{label}'")))?;

    let (text, _, had_errors) = codec.decode(bytes);
    if had_errors {
        log::warn!("input is not valid {}, undecodable bytes were replaced", codec.name());
    }
    Ok(text.into_owned())
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Candidates are tried in order `,` `;` tab `|`. A tie or a first line with
/// none of them falls back to comma, matching [`ImportOptions`] defaults.
///
/// [`ImportOptions`]: crate::import::ImportOptions
pub fn detect_delimiter(content: &str) -> char {
    const CANDIDATES: [char; 4] = [',', ';', '\t', '|'];
    let first_line = content.lines().next().unwrap_or("");

    CANDIDATES
        .iter()
        .map(|&sep| (sep, first_line.matches(sep).count()))
        .fold((',', 0), |best, (sep, count)| if count > best.1 { (sep, count) } else { best })
        .0
}

fn ascii_byte(c: char) -> ImportResult<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or(ImportError::BadDelimiter(c))
}

/// Stream token rows from a reader.
///
/// Rows may have different lengths; blank lines are skipped.
pub fn token_rows<R: Read>(
    reader: R,
    delimiter: char,
    text_delimiter: char,
) -> ImportResult<impl Iterator<Item = ImportResult<Vec<String>>>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(ascii_byte(delimiter)?)
        .quote(ascii_byte(text_delimiter)?)
        .from_reader(reader);

    Ok(reader.into_records().map(|record| {
        record
            .map(|r| r.iter().map(str::to_string).collect())
            .map_err(ImportError::from)
    }))
}

/// Tokenize a whole string into rows.
pub fn tokenize(content: &str, delimiter: char, text_delimiter: char) -> ImportResult<Vec<Vec<String>>> {
    token_rows(content.as_bytes(), delimiter, text_delimiter)?.collect()
}

/// Yields a materialized token grid one column at a time.
///
/// Short rows are padded with empty strings, so every column has one token
/// per source row.
#[derive(Debug, Clone)]
pub struct ColumnReader {
    rows: Vec<Vec<String>>,
    width: usize,
    next: usize,
}

impl ColumnReader {
    pub fn new(rows: impl IntoIterator<Item = Vec<String>>) -> Self {
        let rows: Vec<Vec<String>> = rows.into_iter().collect();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self { rows, width, next: 0 }
    }
}

impl Iterator for ColumnReader {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.width {
            return None;
        }
        let col = self.next;
        self.next += 1;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(col).cloned().unwrap_or_default())
                .collect(),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.width - self.next;
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tokenize_ragged_rows() {
        let rows = tokenize("x,y\n1,2,3\n\n4\n", ',', '"').unwrap();
        assert_eq!(rows, vec![row(&["x", "y"]), row(&["1", "2", "3"]), row(&["4"])]);
    }

    #[test]
    fn test_tokenize_quoted_tokens() {
        let rows = tokenize("'a b';'c;d'\n", ';', '\'').unwrap();
        assert_eq!(rows, vec![row(&["a b", "c;d"])]);
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        assert!(matches!(
            tokenize("a", '§', '"'),
            Err(ImportError::BadDelimiter('§'))
        ));
    }

    #[test]
    fn test_column_reader_pads_short_rows() {
        let cols: Vec<_> = ColumnReader::new(vec![row(&["a", "b", "c"]), row(&["1"]), row(&["2", "3"])]).collect();
        assert_eq!(
            cols,
            vec![row(&["a", "1", "2"]), row(&["b", "", "3"]), row(&["c", "", ""])]
        );
    }

    #[test]
    fn test_column_reader_empty_source() {
        assert_eq!(ColumnReader::new(Vec::new()).count(), 0);
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("single"), ',');
        assert_eq!(detect_delimiter("a;b,c"), ',');
        assert_eq!(detect_delimiter(""), ',');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_unknown_encoding_label() {
        assert!(matches!(
            decode_content(b"abc", "klingon-8"),
            Err(ImportError::Encoding(_))
        ));
    }
}
