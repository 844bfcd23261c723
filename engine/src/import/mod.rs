//! Tabular import with per-column type and name inference.
//!
//! Every token is first converted under its column's current type (numeric
//! unless a header said otherwise). A token that does not convert is read as a
//! *header directive* naming the column and optionally typing it:
//!
//! ```text
//! x        y (date)     y+-      label (string)
//! 1        2010-01-01   0.5      first
//! 2        2010-01-02   0.25     second
//! ```
//!
//! A directive named exactly `+`, `-` or `+-` attaches the column as an error
//! series of the nearest named column to its left (`y` → `y+-`).
//!
//! Malformed data is never an error: a value that fails to convert is taken
//! as a new header for its column, so a stray word in a numeric column renames
//! everything below it. This is inherent to the heuristic and is preserved.
//!
//! # Example
//!
//! ```rust,ignore
//! use serieskit::{CsvImport, Document, ImportOptions};
//!
//! let mut import = CsvImport::new(ImportOptions::default());
//! import.read_str("x,y\n1,2\n3,4\n")?;
//! let mut doc = Document::new();
//! let names = import.set_data(&mut doc);
//! assert_eq!(names, vec!["x", "y"]);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use crate::error::ImportResult;
use crate::models::{Dataset, Dataset1D, DatasetStore, TextDataset};
use crate::parser::dates::date_string_to_date;
use crate::parser::{decode_content, detect_delimiter, token_rows, ColumnReader};

/// Suffixes marking a series as the error bars of another.
const ERROR_SUFFIXES: [&str; 3] = ["+-", "+", "-"];

// =============================================================================
// Options
// =============================================================================

/// Options for reading a delimited source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Read the source column by column, naming series `row1`, `row2`, ...
    pub read_rows: bool,

    /// Field delimiter (auto-detect if `None`)
    pub delimiter: Option<char>,

    /// Quote character around tokens
    pub text_delimiter: char,

    /// Text encoding label, or `"auto"` to detect it
    pub encoding: String,

    /// Prepended to every dataset name
    pub prefix: String,

    /// Appended to every dataset name
    pub suffix: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            read_rows: false,
            delimiter: Some(','),
            text_delimiter: '"',
            encoding: "utf-8".to_string(),
            prefix: String::new(),
            suffix: String::new(),
        }
    }
}

// =============================================================================
// Column types and values
// =============================================================================

/// Resolved type of an imported column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Float,
    String,
    Date,
}

impl ColumnType {
    /// Type named by the last word of a header directive.
    pub fn from_annotation(word: &str) -> Self {
        match word {
            "(string)" | "(text)" => ColumnType::String,
            "(date)" | "(time)" => ColumnType::Date,
            _ => ColumnType::Float,
        }
    }

    /// Convert a token under this type.
    fn convert(self, token: &str) -> Option<Cell> {
        match self {
            ColumnType::Float => token.trim().parse::<f64>().ok().map(Cell::Number),
            ColumnType::Date => date_string_to_date(token).map(Cell::Number),
            ColumnType::String => Some(Cell::Text(token.to_string())),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColumnType::Float => "float",
            ColumnType::String => "string",
            ColumnType::Date => "date",
        })
    }
}

/// One accumulated value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    fn as_number(&self) -> f64 {
        match self {
            Cell::Number(v) => *v,
            Cell::Text(_) => f64::NAN,
        }
    }

    fn into_text(self) -> String {
        match self {
            Cell::Number(v) => v.to_string(),
            Cell::Text(s) => s,
        }
    }
}

fn is_error_name(name: &str) -> bool {
    name.ends_with('+') || name.ends_with('-')
}

// =============================================================================
// Reader
// =============================================================================

/// Reads delimited data into named value series.
///
/// State is rebuilt on every read; only the accumulated series survive until
/// the next read, and [`CsvImport::set_data`] commits them to a store.
#[derive(Debug, Clone, Default)]
pub struct CsvImport {
    options: ImportOptions,
    /// Type per column index (`None` until named).
    coltypes: Vec<Option<ColumnType>>,
    /// Dataset name per column index.
    colnames: HashMap<usize, String>,
    /// Resolved type per dataset name.
    nametypes: HashMap<String, ColumnType>,
    /// Accumulated values per dataset name.
    data: BTreeMap<String, Vec<Cell>>,
}

impl CsvImport {
    pub fn new(options: ImportOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Read a file, decoding it with the configured encoding.
    pub fn read_file(&mut self, path: impl AsRef<Path>) -> ImportResult<()> {
        let bytes = std::fs::read(path.as_ref())?;
        log::info!("reading {} ({} bytes)", path.as_ref().display(), bytes.len());
        self.read_bytes(&bytes)
    }

    /// Read raw bytes, decoding them with the configured encoding.
    pub fn read_bytes(&mut self, bytes: &[u8]) -> ImportResult<()> {
        let content = decode_content(bytes, &self.options.encoding)?;
        self.read_str(&content)
    }

    /// Tokenize and read already-decoded text.
    pub fn read_str(&mut self, content: &str) -> ImportResult<()> {
        let delimiter = self
            .options
            .delimiter
            .unwrap_or_else(|| detect_delimiter(content));
        let rows = token_rows(content.as_bytes(), delimiter, self.options.text_delimiter)?;

        if self.options.read_rows {
            let grid = rows.collect::<ImportResult<Vec<_>>>()?;
            self.read_tokens(grid);
        } else {
            self.reset();
            for line in rows {
                self.process_line(&line?);
            }
        }
        Ok(())
    }

    /// Read an already-tokenized grid, one inner vector per source row.
    ///
    /// With `read_rows` set the grid is consumed column by column.
    pub fn read_tokens<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        self.reset();
        if self.options.read_rows {
            for line in ColumnReader::new(rows) {
                self.process_line(&line);
            }
        } else {
            for line in rows {
                self.process_line(&line);
            }
        }
    }

    fn reset(&mut self) {
        self.coltypes.clear();
        self.colnames.clear();
        self.nametypes.clear();
        self.data.clear();
    }

    /// Accumulated values for a dataset name.
    pub fn values(&self, name: &str) -> Option<&[Cell]> {
        self.data.get(name).map(Vec::as_slice)
    }

    /// Resolved type of a dataset name.
    pub fn name_type(&self, name: &str) -> Option<ColumnType> {
        self.nametypes.get(name).copied()
    }

    /// Dataset name currently bound to a column index.
    pub fn column_name(&self, column: usize) -> Option<&str> {
        self.colnames.get(&column).map(String::as_str)
    }

    fn process_line(&mut self, line: &[String]) {
        for (colnum, token) in line.iter().enumerate() {
            let ctype = self
                .coltypes
                .get(colnum)
                .copied()
                .flatten()
                .unwrap_or(ColumnType::Float);

            match ctype.convert(token) {
                Some(value) => {
                    if !self.colnames.contains_key(&colnum) {
                        let name = self.generate_name(colnum);
                        self.set_name_and_type(colnum, name, ColumnType::Float);
                    }
                    if let Some(series) = self
                        .colnames
                        .get(&colnum)
                        .and_then(|name| self.data.get_mut(name))
                    {
                        series.push(value);
                    }
                }
                None => {
                    let directive = token.trim();
                    if directive.is_empty() {
                        continue;
                    }
                    let (coltype, name) = self.name_and_type_from_directive(colnum, directive);
                    log::debug!("column {} named '{}' ({})", colnum + 1, name, coltype);
                    self.set_name_and_type(colnum, name, coltype);
                }
            }
        }
    }

    fn generate_name(&self, column: usize) -> String {
        let stem = if self.options.read_rows { "row" } else { "col" };
        format!("{}{}{}{}", self.options.prefix, stem, column + 1, self.options.suffix)
    }

    /// Resolve `<name> ... (<type>)` into a dataset name and type.
    fn name_and_type_from_directive(&self, colnum: usize, directive: &str) -> (ColumnType, String) {
        let words: Vec<&str> = directive.split_whitespace().collect();
        let name = words.first().copied().unwrap_or(directive);
        let annotation = words.last().copied().unwrap_or(directive);

        if ERROR_SUFFIXES.contains(&name) {
            let base = (0..colnum).rev().find_map(|prev| {
                self.colnames
                    .get(&prev)
                    .filter(|n| !n.is_empty() && !is_error_name(n))
                    .map(|n| (prev, n))
            });
            if let Some((prev, base)) = base {
                let coltype = self.coltypes[prev].unwrap_or(ColumnType::Float);
                return (coltype, format!("{base}{name}"));
            }
            log::debug!("no base column for error series '{}' in column {}", name, colnum + 1);
            return (ColumnType::from_annotation(annotation), self.generate_name(colnum));
        }

        let full = format!("{}{}{}", self.options.prefix, name, self.options.suffix);
        (ColumnType::from_annotation(annotation), full)
    }

    fn set_name_and_type(&mut self, colnum: usize, name: String, coltype: ColumnType) {
        if colnum >= self.coltypes.len() {
            self.coltypes.resize(colnum + 1, None);
        }
        self.coltypes[colnum] = Some(coltype);
        self.nametypes.insert(name.clone(), coltype);
        self.data.entry(name.clone()).or_default();
        self.colnames.insert(colnum, name);
    }

    fn numbers(&self, name: &str) -> Option<Vec<f64>> {
        self.data
            .get(name)
            .map(|cells| cells.iter().map(Cell::as_number).collect())
    }

    /// Assemble the read series into datasets, keyed by base name.
    ///
    /// Series named `<base>+-`, `<base>+` and `<base>-` become the symmetric,
    /// positive and negative errors of `<base>`. Text series ignore errors.
    pub fn datasets(&self) -> BTreeMap<String, Dataset> {
        self.data
            .iter()
            .filter(|(name, _)| !is_error_name(name))
            .map(|(name, cells)| {
                let dataset = match self.nametypes.get(name) {
                    Some(ColumnType::String) => Dataset::Text(TextDataset::new(
                        cells.iter().cloned().map(Cell::into_text).collect(),
                    )),
                    _ => {
                        let mut ds = Dataset1D::new(cells.iter().map(Cell::as_number).collect());
                        ds.serr = self.numbers(&format!("{name}+-"));
                        ds.perr = self.numbers(&format!("{name}+"));
                        ds.nerr = self.numbers(&format!("{name}-"));
                        ds.conform();
                        Dataset::Numeric(ds)
                    }
                };
                (name.clone(), dataset)
            })
            .collect()
    }

    /// Commit the read datasets to a store.
    ///
    /// Returns the committed names in lexicographic order.
    pub fn set_data(&self, store: &mut impl DatasetStore) -> Vec<String> {
        let datasets = self.datasets();
        let mut names = Vec::with_capacity(datasets.len());
        for (name, dataset) in datasets {
            log::debug!("committing '{}' ({} values)", name, dataset.len());
            store.set_data(&name, dataset);
            names.push(name);
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use std::io::Write;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    fn transpose(rows: &[Vec<String>]) -> Vec<Vec<String>> {
        ColumnReader::new(rows.to_vec()).collect()
    }

    fn numeric(ds: &Dataset) -> &Dataset1D {
        ds.as_numeric().expect("numeric dataset")
    }

    #[test]
    fn test_auto_names_without_headers() {
        let mut import = CsvImport::new(ImportOptions::default());
        import.read_str("1,2\n3,4\n").unwrap();

        let ds = import.datasets();
        assert_eq!(ds.keys().collect::<Vec<_>>(), vec!["col1", "col2"]);
        assert_eq!(numeric(&ds["col2"]).data, vec![2.0, 4.0]);
    }

    #[test]
    fn test_auto_names_reading_rows() {
        let mut import = CsvImport::new(ImportOptions {
            read_rows: true,
            ..Default::default()
        });
        import.read_str("1,2\n3,4\n").unwrap();

        let ds = import.datasets();
        assert_eq!(numeric(&ds["row1"]).data, vec![1.0, 2.0]);
        assert_eq!(numeric(&ds["row2"]).data, vec![3.0, 4.0]);
    }

    #[test]
    fn test_header_types_and_prefix_suffix() {
        let mut import = CsvImport::new(ImportOptions {
            prefix: "a_".into(),
            suffix: "_b".into(),
            ..Default::default()
        });
        import
            .read_str("x,when (date),what (text)\n1,2009-01-02,hello\n2,2009-01-03,world\n")
            .unwrap();

        let ds = import.datasets();
        assert_eq!(ds.keys().collect::<Vec<_>>(), vec!["a_what_b", "a_when_b", "a_x_b"]);
        assert_eq!(numeric(&ds["a_when_b"]).data, vec![86_400.0, 172_800.0]);
        assert_eq!(
            ds["a_what_b"],
            Dataset::Text(TextDataset::new(vec!["hello".into(), "world".into()]))
        );
        assert_eq!(import.name_type("a_x_b"), Some(ColumnType::Float));
    }

    #[test]
    fn test_error_column_by_name() {
        let mut import = CsvImport::new(ImportOptions::default());
        import.read_tokens(grid(&[&["x", "x+-", "y"], &["1", "0.5", "2"], &["3", "0.25", "4"]]));

        let ds = import.datasets();
        assert_eq!(ds.len(), 2);
        let x = numeric(&ds["x"]);
        assert_eq!(x.data, vec![1.0, 3.0]);
        assert_eq!(x.serr, Some(vec![0.5, 0.25]));
        assert_eq!(x.perr, None);
        assert_eq!(numeric(&ds["y"]).serr, None);
    }

    #[test]
    fn test_bare_error_directives_bind_to_previous_column() {
        let mut import = CsvImport::new(ImportOptions::default());
        import.read_tokens(grid(&[
            &["t", "y", "+", "-"],
            &["0", "10", "1", "-2"],
            &["1", "20", "3", "-4"],
        ]));

        assert_eq!(import.column_name(2), Some("y+"));
        assert_eq!(import.column_name(3), Some("y-"));
        let ds = import.datasets();
        let y = numeric(&ds["y"]);
        assert_eq!(y.perr, Some(vec![1.0, 3.0]));
        assert_eq!(y.nerr, Some(vec![-2.0, -4.0]));
        assert_eq!(y.serr, None);
    }

    #[test]
    fn test_error_directive_inherits_base_type() {
        let mut import = CsvImport::new(ImportOptions::default());
        import.read_tokens(grid(&[&["d (date)", "+-"], &["2009-01-02", "2009-01-01"]]));
        assert_eq!(import.name_type("d+-"), Some(ColumnType::Date));
        assert_eq!(import.values("d+-"), Some(&[Cell::Number(0.0)][..]));
    }

    #[test]
    fn test_error_directive_without_base_gets_auto_name() {
        let mut import = CsvImport::new(ImportOptions::default());
        import.read_tokens(grid(&[&["+-", "y"], &["1", "2"]]));
        assert_eq!(import.column_name(0), Some("col1"));
        assert_eq!(numeric(&import.datasets()["col1"]).data, vec![1.0]);
    }

    #[test]
    fn test_error_directive_with_prefix_suffix() {
        let options = ImportOptions {
            prefix: "p_".into(),
            suffix: "_s".into(),
            ..Default::default()
        };

        let mut import = CsvImport::new(options.clone());
        import.read_str("y,+-\n1,0.5\n").unwrap();
        assert_eq!(import.column_name(1), Some("p_y_s+-"));
        let ds = import.datasets();
        assert_eq!(ds.keys().collect::<Vec<_>>(), vec!["p_y_s"]);
        assert_eq!(numeric(&ds["p_y_s"]).serr, Some(vec![0.5]));

        let mut import = CsvImport::new(options);
        import.read_tokens(grid(&[&["+-", "y"], &["1", "2"]]));
        assert_eq!(import.column_name(0), Some("p_col1_s"));
        let ds = import.datasets();
        assert_eq!(ds.keys().collect::<Vec<_>>(), vec!["p_col1_s", "p_y_s"]);
        assert_eq!(numeric(&ds["p_col1_s"]).data, vec![1.0]);
    }

    #[test]
    fn test_blank_tokens_are_skipped() {
        let mut import = CsvImport::new(ImportOptions::default());
        import.read_tokens(grid(&[&["a", "b"], &["1", "  "], &["2", "5"]]));
        let ds = import.datasets();
        assert_eq!(numeric(&ds["a"]).data, vec![1.0, 2.0]);
        assert_eq!(numeric(&ds["b"]).data, vec![5.0]);
    }

    #[test]
    fn test_malformed_value_becomes_header() {
        // A stray word in a numeric column starts a new series.
        let mut import = CsvImport::new(ImportOptions::default());
        import.read_str("a\n1\n2\noops\n3\n").unwrap();
        let ds = import.datasets();
        assert_eq!(numeric(&ds["a"]).data, vec![1.0, 2.0]);
        assert_eq!(numeric(&ds["oops"]).data, vec![3.0]);
    }

    #[test]
    fn test_text_column_never_re_headers() {
        let mut import = CsvImport::new(ImportOptions::default());
        import.read_str("name (string)\n1\nfoo bar\n").unwrap();
        assert_eq!(
            import.datasets()["name"],
            Dataset::Text(TextDataset::new(vec!["1".into(), "foo bar".into()]))
        );
    }

    #[test]
    fn test_reread_discards_previous_state() {
        let mut import = CsvImport::new(ImportOptions::default());
        import.read_str("a\n1\n").unwrap();
        import.read_str("b\n2\n").unwrap();
        assert_eq!(import.datasets().keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_orientation_equivalence() {
        let rows = grid(&[
            &["x", "y", "+-", "label (string)"],
            &["1", "2", "0.1", "a"],
            &["3", "4", "0.2", "b"],
            &["5", "6", "0.3", "c"],
        ]);

        let mut by_rows = CsvImport::new(ImportOptions::default());
        by_rows.read_tokens(rows.clone());

        let mut by_cols = CsvImport::new(ImportOptions {
            read_rows: true,
            ..Default::default()
        });
        by_cols.read_tokens(transpose(&rows));

        assert_eq!(by_rows.datasets(), by_cols.datasets());
        assert_eq!(numeric(&by_rows.datasets()["y"]).serr, Some(vec![0.1, 0.2, 0.3]));
    }

    #[test]
    fn test_set_data_returns_sorted_base_names() {
        let mut import = CsvImport::new(ImportOptions::default());
        import.read_str("zeta,alpha,alpha+\n1,2,0.5\n").unwrap();

        let mut doc = Document::new();
        let names = import.set_data(&mut doc);
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
        let alpha = doc.get_data("alpha").unwrap();
        assert_eq!(alpha.borrow().as_numeric().unwrap().perr, Some(vec![0.5]));
        assert!(doc.get_data("alpha+").is_none());
    }

    #[test]
    fn test_short_error_series_padded() {
        let mut import = CsvImport::new(ImportOptions::default());
        import.read_tokens(grid(&[&["y", "+-"], &["1", "0.5"], &["2"]]));
        let y = numeric(&import.datasets()["y"]).clone();
        let serr = y.serr.unwrap();
        assert_eq!(serr.len(), 2);
        assert!(serr[1].is_nan());
    }

    #[test]
    fn test_read_file_with_auto_detection() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"x;t\xe9mp\n1;2\n").unwrap();

        let mut import = CsvImport::new(ImportOptions {
            delimiter: None,
            encoding: "latin1".into(),
            ..Default::default()
        });
        import.read_file(file.path()).unwrap();
        let ds = import.datasets();
        assert_eq!(numeric(&ds["témp"]).data, vec![2.0]);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ImportOptions = serde_json::from_str(r#"{"read_rows": true, "prefix": "p"}"#).unwrap();
        assert!(options.read_rows);
        assert_eq!(options.prefix, "p");
        assert_eq!(options.delimiter, Some(','));
    }
}
