//! Delimited-file frame parser.
//!
//! Reads comma- or tab-delimited files with a header row into typed
//! columns. A column is numeric when every non-missing cell parses as
//! f64, categorical otherwise. Missing values (NA, ".", empty, "-")
//! become NaN in numeric columns and None in categorical ones.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::debug;

/// A typed column of observations.
#[derive(Debug, Clone)]
pub enum Column {
    /// Continuous values; NaN marks a missing cell.
    Numeric(Vec<f64>),
    /// String levels; None marks a missing cell.
    Categorical(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the cell at row i is missing.
    pub fn is_missing(&self, i: usize) -> bool {
        match self {
            Column::Numeric(v) => v[i].is_nan(),
            Column::Categorical(v) => v[i].is_none(),
        }
    }

    pub fn n_missing(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_missing(i)).count()
    }

    /// Cell as a display label, e.g. for grouping. Integral numerics
    /// format without a fractional part so IDs like 12.0 read as "12".
    pub fn label(&self, i: usize) -> Option<String> {
        match self {
            Column::Numeric(v) => {
                let x = v[i];
                if x.is_nan() {
                    None
                } else if x.fract() == 0.0 && x.abs() < 1e15 {
                    Some(format!("{}", x as i64))
                } else {
                    Some(format!("{}", x))
                }
            }
            Column::Categorical(v) => v[i].clone(),
        }
    }
}

/// An observation table: named, typed columns of equal length.
#[derive(Debug, Clone)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl Frame {
    /// Read a delimited file with a header row. The delimiter is
    /// auto-detected from the header: tab if present, comma otherwise.
    pub fn read_delimited(path: &Path) -> Result<Frame> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read data file: {}", path.display()))?;

        let mut lines = contents.lines();
        let header_line = lines
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty data file: {}", path.display()))?;

        let delim = if header_line.contains('\t') { '\t' } else { ',' };

        let names = split_record(header_line, delim);
        if names.iter().any(|n| n.is_empty()) {
            bail!("Header contains an empty column name");
        }
        for (i, n) in names.iter().enumerate() {
            if names[..i].contains(n) {
                bail!("Duplicate column name in header: '{}'", n);
            }
        }

        let n_cols = names.len();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); n_cols];

        for (line_num, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_record(line, delim);
            if fields.len() != n_cols {
                bail!(
                    "Line {} has {} fields, expected {}",
                    line_num + 2,
                    fields.len(),
                    n_cols
                );
            }
            for (j, f) in fields.into_iter().enumerate() {
                cells[j].push(f);
            }
        }

        let n_rows = cells.first().map_or(0, |c| c.len());
        let columns: Vec<Column> = cells.into_iter().map(type_column).collect();

        debug!(
            "Loaded {} rows x {} columns from {}",
            n_rows,
            n_cols,
            path.display()
        );

        Ok(Frame {
            names,
            columns,
            n_rows,
        })
    }

    /// Build a frame directly from named columns.
    pub fn from_columns(pairs: Vec<(String, Column)>) -> Result<Frame> {
        if pairs.is_empty() {
            bail!("Frame needs at least one column");
        }
        let n_rows = pairs[0].1.len();
        for (name, col) in &pairs {
            if col.len() != n_rows {
                bail!(
                    "Column '{}' has {} rows, expected {}",
                    name,
                    col.len(),
                    n_rows
                );
            }
        }
        let (names, columns) = pairs.into_iter().unzip();
        Ok(Frame {
            names,
            columns,
            n_rows,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        let idx = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| anyhow::anyhow!("Column '{}' not found in data", name))?;
        Ok(&self.columns[idx])
    }

    /// Numeric view of a column; errors for categorical columns.
    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        match self.column(name)? {
            Column::Numeric(v) => Ok(v),
            Column::Categorical(_) => bail!("Column '{}' is not numeric", name),
        }
    }

    /// Rename a column, e.g. to replace characters the formula language
    /// does not allow ("e.norm" -> "e_norm"). Values are untouched.
    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<()> {
        if self.names.iter().any(|n| n == new) {
            bail!("Cannot rename '{}' to '{}': name already in use", old, new);
        }
        let idx = self
            .names
            .iter()
            .position(|n| n == old)
            .ok_or_else(|| anyhow::anyhow!("Column '{}' not found in data", old))?;
        self.names[idx] = new.to_string();
        Ok(())
    }

    /// Indices of rows with no missing cell in any of the given columns.
    pub fn complete_cases(&self, cols: &[&str]) -> Result<Vec<usize>> {
        let columns: Vec<&Column> = cols
            .iter()
            .map(|name| self.column(name))
            .collect::<Result<Vec<_>>>()?;
        let mut rows = Vec::with_capacity(self.n_rows);
        for i in 0..self.n_rows {
            if columns.iter().all(|c| !c.is_missing(i)) {
                rows.push(i);
            }
        }
        Ok(rows)
    }
}

/// Split one record on the delimiter, honoring double-quoted fields.
/// Doubled quotes inside a quoted field unescape to a single quote.
fn split_record(line: &str, delim: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' && field.is_empty() {
            in_quotes = true;
        } else if c == delim {
            fields.push(field.trim().to_string());
            field = String::new();
        } else {
            field.push(c);
        }
    }
    fields.push(field.trim().to_string());
    fields
}

/// Parse a string value to f64, treating NA/missing markers as NaN.
fn parse_value(s: &str) -> Option<f64> {
    match s {
        "NA" | "na" | "Na" | "." | "" | "-" | "NaN" | "nan" => Some(f64::NAN),
        _ => s.parse().ok(),
    }
}

fn is_missing_marker(s: &str) -> bool {
    matches!(s, "NA" | "na" | "Na" | "." | "" | "-" | "NaN" | "nan")
}

/// Type a column: numeric when every non-missing cell parses as f64.
fn type_column(cells: Vec<String>) -> Column {
    let all_numeric = cells
        .iter()
        .all(|c| parse_value(c).is_some());
    if all_numeric {
        Column::Numeric(
            cells
                .iter()
                .map(|c| parse_value(c).unwrap_or(f64::NAN))
                .collect(),
        )
    } else {
        Column::Categorical(
            cells
                .into_iter()
                .map(|c| if is_missing_marker(&c) { None } else { Some(c) })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("1.5"), Some(1.5));
        assert_eq!(parse_value("0"), Some(0.0));
        assert!(parse_value("NA").unwrap().is_nan());
        assert!(parse_value(".").unwrap().is_nan());
        assert!(parse_value("").unwrap().is_nan());
        assert_eq!(parse_value("abc"), None);
    }

    #[test]
    fn test_split_record_quoted() {
        let fields = split_record(r#"a,"b,c",d"#, ',');
        assert_eq!(fields, vec!["a", "b,c", "d"]);
        let fields = split_record(r#""say ""hi""",x"#, ',');
        assert_eq!(fields, vec![r#"say "hi""#, "x"]);
    }

    #[test]
    fn test_read_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "ppid,rt,cond").unwrap();
        writeln!(f, "P01,0.45,easy").unwrap();
        writeln!(f, "P02,NA,hard").unwrap();
        writeln!(f, "P03,0.61,easy").unwrap();

        let frame = Frame::read_delimited(&path).unwrap();
        assert_eq!(frame.n_rows(), 3);
        assert_eq!(frame.n_cols(), 3);

        let rt = frame.numeric("rt").unwrap();
        assert_eq!(rt[0], 0.45);
        assert!(rt[1].is_nan());

        match frame.column("cond").unwrap() {
            Column::Categorical(v) => {
                assert_eq!(v[0].as_deref(), Some("easy"));
                assert_eq!(v[1].as_deref(), Some("hard"));
            }
            _ => panic!("cond should be categorical"),
        }
    }

    #[test]
    fn test_read_tsv_autodetect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.tsv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "id\ty").unwrap();
        writeln!(f, "1\t2.5").unwrap();

        let frame = Frame::read_delimited(&path).unwrap();
        assert_eq!(frame.n_rows(), 1);
        assert_eq!(frame.numeric("y").unwrap()[0], 2.5);
    }

    #[test]
    fn test_ragged_row_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "a,b").unwrap();
        writeln!(f, "1,2,3").unwrap();

        assert!(Frame::read_delimited(&path).is_err());
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "a,a").unwrap();
        writeln!(f, "1,2").unwrap();

        assert!(Frame::read_delimited(&path).is_err());
    }

    #[test]
    fn test_rename_column() {
        let mut frame = Frame::from_columns(vec![(
            "e.norm".to_string(),
            Column::Numeric(vec![1.0, 2.0]),
        )])
        .unwrap();
        frame.rename_column("e.norm", "e_norm").unwrap();
        assert!(frame.numeric("e_norm").is_ok());
        assert!(frame.numeric("e.norm").is_err());
        // Values untouched
        assert_eq!(frame.numeric("e_norm").unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_rename_collision_rejected() {
        let mut frame = Frame::from_columns(vec![
            ("a".to_string(), Column::Numeric(vec![1.0])),
            ("b".to_string(), Column::Numeric(vec![2.0])),
        ])
        .unwrap();
        assert!(frame.rename_column("a", "b").is_err());
    }

    #[test]
    fn test_complete_cases() {
        let frame = Frame::from_columns(vec![
            ("y".to_string(), Column::Numeric(vec![1.0, f64::NAN, 3.0])),
            (
                "g".to_string(),
                Column::Categorical(vec![Some("a".into()), Some("b".into()), None]),
            ),
        ])
        .unwrap();
        assert_eq!(frame.complete_cases(&["y"]).unwrap(), vec![0, 2]);
        assert_eq!(frame.complete_cases(&["y", "g"]).unwrap(), vec![0]);
    }

    #[test]
    fn test_numeric_label() {
        let col = Column::Numeric(vec![12.0, 1.5, f64::NAN]);
        assert_eq!(col.label(0).as_deref(), Some("12"));
        assert_eq!(col.label(1).as_deref(), Some("1.5"));
        assert_eq!(col.label(2), None);
    }
}
