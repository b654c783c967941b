use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// HeaderValue – a single typed keyword value
// ---------------------------------------------------------------------------

/// A typed FITS keyword value.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

/// The kind of a [`HeaderValue`]; every column of a summary table has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Bool,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Bool => "boolean",
        };
        f.write_str(name)
    }
}

impl FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(ValueKind::String),
            "integer" => Ok(ValueKind::Integer),
            "float" => Ok(ValueKind::Float),
            "boolean" => Ok(ValueKind::Bool),
            other => Err(format!("unknown value kind '{other}'")),
        }
    }
}

// Eq and Hash let `values(.., unique)` dedupe through a `HashSet`.
impl Eq for HeaderValue {}

impl std::hash::Hash for HeaderValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            HeaderValue::String(s) => s.hash(state),
            HeaderValue::Integer(i) => i.hash(state),
            // 0.0 == -0.0, so both must hash alike
            HeaderValue::Float(f) => (if *f == 0.0 { 0.0f64 } else { *f }).to_bits().hash(state),
            HeaderValue::Bool(b) => b.hash(state),
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::String(s) => write!(f, "{s}"),
            HeaderValue::Integer(i) => write!(f, "{i}"),
            // Debug keeps a decimal point on whole numbers so the value reads back as a float.
            HeaderValue::Float(v) => write!(f, "{v:?}"),
            HeaderValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(s: &str) -> Self {
        HeaderValue::String(s.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(s: String) -> Self {
        HeaderValue::String(s)
    }
}

impl From<i64> for HeaderValue {
    fn from(i: i64) -> Self {
        HeaderValue::Integer(i)
    }
}

impl From<f64> for HeaderValue {
    fn from(v: f64) -> Self {
        HeaderValue::Float(v)
    }
}

impl From<bool> for HeaderValue {
    fn from(b: bool) -> Self {
        HeaderValue::Bool(b)
    }
}

impl HeaderValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            HeaderValue::String(_) => ValueKind::String,
            HeaderValue::Integer(_) => ValueKind::Integer,
            HeaderValue::Float(_) => ValueKind::Float,
            HeaderValue::Bool(_) => ValueKind::Bool,
        }
    }

    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(v) => Some(*v),
            HeaderValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HeaderValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Equality used by filters: strings ignore case, integers and floats
    /// compare by numeric value, everything else is exact.
    pub fn matches(&self, target: &HeaderValue) -> bool {
        match (self, target) {
            (HeaderValue::String(a), HeaderValue::String(b)) => a.to_lowercase() == b.to_lowercase(),
            (HeaderValue::Integer(_), HeaderValue::Float(_))
            | (HeaderValue::Float(_), HeaderValue::Integer(_)) => self.as_f64() == target.as_f64(),
            (a, b) => a == b,
        }
    }
}

// ---------------------------------------------------------------------------
// Cell / Column – one keyword across all files
// ---------------------------------------------------------------------------

/// One entry of the summary table. `Masked` means the keyword is absent from
/// that file's header, which is distinct from a present empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cell {
    Value(HeaderValue),
    Masked,
}

impl Cell {
    pub fn value(&self) -> Option<&HeaderValue> {
        match self {
            Cell::Value(v) => Some(v),
            Cell::Masked => None,
        }
    }

    pub fn is_masked(&self) -> bool {
        matches!(self, Cell::Masked)
    }
}

impl From<Option<HeaderValue>> for Cell {
    fn from(v: Option<HeaderValue>) -> Self {
        match v {
            Some(v) => Cell::Value(v),
            None => Cell::Masked,
        }
    }
}

/// A named, homogeneously typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// `None` while every cell is masked.
    pub kind: Option<ValueKind>,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            cells: Vec::new(),
        }
    }

    /// Append a cell, enforcing one value kind per column.
    /// On a mismatch returns the kind already established.
    pub fn push(&mut self, cell: Cell) -> Result<(), ValueKind> {
        if let Cell::Value(v) = &cell {
            match self.kind {
                Some(kind) if kind != v.kind() => return Err(kind),
                Some(_) => {}
                None => self.kind = Some(v.kind()),
            }
        }
        self.cells.push(cell);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn is_masked(&self, row: usize) -> bool {
        self.cells.get(row).map_or(true, Cell::is_masked)
    }

    /// Non-masked values, in row order.
    pub fn present_values(&self) -> impl Iterator<Item = &HeaderValue> {
        self.cells.iter().filter_map(Cell::value)
    }
}

// ---------------------------------------------------------------------------
// SummaryTable – the complete keyword index of a collection
// ---------------------------------------------------------------------------

/// Name of the mandatory first column.
pub const FILE_COLUMN: &str = "file";

/// Rows are files in discovery order, columns are keywords. The `file`
/// column is always first and never masked.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    columns: Vec<Column>,
    generation: u64,
}

impl SummaryTable {
    /// Assemble a table from columns. The `file` column is moved to the front
    /// (created empty when absent).
    pub fn from_columns(mut columns: Vec<Column>, generation: u64) -> Self {
        let file_idx = columns.iter().position(|c| c.name == FILE_COLUMN);
        let file_column = match file_idx {
            Some(idx) => columns.remove(idx),
            None => Column::new(FILE_COLUMN),
        };
        columns.insert(0, file_column);
        SummaryTable {
            columns,
            generation,
        }
    }

    /// Number of rows (files).
    pub fn len(&self) -> usize {
        self.columns[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifies the build that produced this table; trimming keeps it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names, `file` first, in table order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Keyword lookup is case-insensitive, like FITS keywords themselves.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// File names in row order.
    pub fn file_names(&self) -> Vec<&str> {
        self.columns[0]
            .present_values()
            .filter_map(HeaderValue::as_str)
            .collect()
    }

    pub fn file_name(&self, row: usize) -> Option<&str> {
        self.columns[0].cells.get(row)?.value()?.as_str()
    }

    pub fn cell(&self, column: &str, row: usize) -> Option<&Cell> {
        self.column(column)?.cells.get(row)
    }

    /// Value of `column` for the row whose file is `file`.
    pub fn value(&self, column: &str, file: &str) -> Option<&HeaderValue> {
        let row = self.file_names().iter().position(|f| *f == file)?;
        self.cell(column, row)?.value()
    }

    /// Drop every column not named in `keep` (case-insensitive). The `file`
    /// column always survives and rows are untouched.
    pub fn retain_columns(&mut self, keep: &[String]) {
        self.columns.retain(|c| {
            c.name == FILE_COLUMN || keep.iter().any(|k| k.eq_ignore_ascii_case(&c.name))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_column(name: &str, cells: &[Option<&str>]) -> Column {
        let mut col = Column::new(name);
        for c in cells {
            col.push(c.map(HeaderValue::from).into()).unwrap();
        }
        col
    }

    #[test]
    fn column_rejects_second_kind() {
        let mut col = Column::new("exptime");
        col.push(Cell::Value(HeaderValue::Float(1.5))).unwrap();
        col.push(Cell::Masked).unwrap();
        assert_eq!(
            col.push(Cell::Value(HeaderValue::Integer(3))),
            Err(ValueKind::Float)
        );
        assert_eq!(col.len(), 2);
    }

    #[test]
    fn masked_is_not_empty_string() {
        let col = string_column("object", &[Some(""), None]);
        assert!(!col.is_masked(0));
        assert!(col.is_masked(1));
        assert_eq!(col.kind, Some(ValueKind::String));
    }

    #[test]
    fn string_matching_ignores_case() {
        let light = HeaderValue::from("LIGHT");
        assert!(light.matches(&HeaderValue::from("light")));
        assert!(!light.matches(&HeaderValue::from("dark")));
    }

    #[test]
    fn numbers_match_across_kinds() {
        assert!(HeaderValue::Integer(30).matches(&HeaderValue::Float(30.0)));
        assert!(HeaderValue::Float(30.0).matches(&HeaderValue::Integer(30)));
        assert!(!HeaderValue::Float(30.5).matches(&HeaderValue::Integer(30)));
        assert!(!HeaderValue::Integer(1).matches(&HeaderValue::from("1")));
        assert!(!HeaderValue::Bool(true).matches(&HeaderValue::Integer(1)));
    }

    #[test]
    fn signed_zeros_hash_alike() {
        use std::collections::HashSet;
        let set: HashSet<HeaderValue> = [HeaderValue::Float(0.0), HeaderValue::Float(-0.0)].into();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn file_column_is_moved_first_and_kept_on_trim() {
        let files = string_column(FILE_COLUMN, &[Some("a.fit"), Some("b.fit")]);
        let imagetyp = string_column("imagetyp", &[Some("LIGHT"), Some("BIAS")]);
        let filter = string_column("filter", &[Some("R"), None]);
        let mut table = SummaryTable::from_columns(vec![imagetyp, files, filter], 7);

        assert_eq!(table.column_names(), vec!["file", "imagetyp", "filter"]);
        assert_eq!(table.len(), 2);

        table.retain_columns(&["IMAGETYP".to_string()]);
        assert_eq!(table.column_names(), vec!["file", "imagetyp"]);
        assert_eq!(table.generation(), 7);
        assert_eq!(table.file_names(), vec!["a.fit", "b.fit"]);
    }

    #[test]
    fn float_display_reads_back_as_float() {
        assert_eq!(HeaderValue::Float(30.0).to_string(), "30.0");
        assert_eq!(HeaderValue::Integer(30).to_string(), "30");
    }
}
