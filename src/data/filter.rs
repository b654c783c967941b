use std::fmt;
use std::str::FromStr;

use log::debug;

use super::model::{Cell, HeaderValue, SummaryTable};

// ---------------------------------------------------------------------------
// Criterion: what one keyword must look like
// ---------------------------------------------------------------------------

/// Condition on a single keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Keyword present with any value (`'*'`).
    Any,
    /// Keyword present and equal; strings compare case-insensitively,
    /// integers and floats by numeric value.
    Equals(HeaderValue),
    /// Keyword absent from the header.
    Missing,
}

impl Criterion {
    fn accepts(&self, cell: Option<&Cell>) -> bool {
        let value = cell.and_then(Cell::value);
        match (self, value) {
            (Criterion::Any, v) => v.is_some(),
            (Criterion::Missing, v) => v.is_none(),
            (Criterion::Equals(target), Some(v)) => v.matches(target),
            (Criterion::Equals(_), None) => false,
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Any => f.write_str("*"),
            Criterion::Equals(v) => write!(f, "{v}"),
            Criterion::Missing => f.write_str("<missing>"),
        }
    }
}

macro_rules! equals_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Criterion {
            fn from(v: $t) -> Self {
                Criterion::Equals(v.into())
            }
        })*
    };
}

equals_from!(HeaderValue, &str, String, i64, f64, bool);

// ---------------------------------------------------------------------------
// Predicate: conjunction of keyword criteria
// ---------------------------------------------------------------------------

/// Conjunction of per-keyword criteria. An empty predicate matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<(String, Criterion)>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clause; builder style.
    pub fn with(mut self, keyword: impl Into<String>, criterion: impl Into<Criterion>) -> Self {
        self.clauses.push((keyword.into(), criterion.into()));
        self
    }

    pub fn any(self, keyword: impl Into<String>) -> Self {
        self.with(keyword, Criterion::Any)
    }

    pub fn missing(self, keyword: impl Into<String>) -> Self {
        self.with(keyword, Criterion::Missing)
    }

    pub fn clauses(&self) -> &[(String, Criterion)] {
        &self.clauses
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.clauses.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Parses `KEY=VALUE,KEY=*,KEY=` where an empty value selects files missing
/// the keyword. Values are typed the way header values are guessed.
impl FromStr for Predicate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut predicate = Predicate::new();
        for clause in s.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let (key, value) = clause
                .split_once('=')
                .ok_or_else(|| format!("Filter clause '{clause}' is not KEY=VALUE"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("Filter clause '{clause}' has no keyword"));
            }
            let criterion = match value.trim() {
                "*" => Criterion::Any,
                "" => Criterion::Missing,
                v => Criterion::Equals(super::loader::guess_value_type(v)),
            };
            predicate = predicate.with(key, criterion);
        }
        Ok(predicate)
    }
}

/// Return indices of rows that satisfy every clause.
///
/// A row passes a clause when:
/// * `Any`     → the keyword cell is not masked
/// * `Missing` → the keyword cell is masked (or the column does not exist)
/// * `Equals`  → the cell is present and matches the target
pub fn matching_rows(table: &SummaryTable, predicate: &Predicate) -> Vec<usize> {
    let mut active: Vec<usize> = (0..table.len()).collect();
    for (keyword, criterion) in predicate.clauses() {
        let column = table.column(keyword);
        active.retain(|&row| criterion.accepts(column.and_then(|c| c.cells.get(row))));
        debug!("Clause {keyword}={criterion} leaves {} rows", active.len());
    }
    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Column, FILE_COLUMN};

    fn table() -> SummaryTable {
        let mut file = Column::new(FILE_COLUMN);
        let mut imagetyp = Column::new("imagetyp");
        let mut filter = Column::new("filter");
        let mut naxis = Column::new("naxis");
        let rows: [(&str, &str, Option<&str>); 3] = [
            ("light.fit", "LIGHT", Some("R")),
            ("bias.fit", "BIAS", None),
            ("flat.fit", "FLAT", Some("")),
        ];
        for (f, t, flt) in rows {
            file.push(Cell::Value(f.into())).unwrap();
            imagetyp.push(Cell::Value(t.into())).unwrap();
            filter.push(flt.map(HeaderValue::from).into()).unwrap();
            naxis.push(Cell::Value(HeaderValue::Integer(2))).unwrap();
        }
        SummaryTable::from_columns(vec![file, imagetyp, filter, naxis], 1)
    }

    #[test]
    fn any_and_missing_are_complements() {
        let t = table();
        let present = matching_rows(&t, &Predicate::new().any("filter"));
        let missing = matching_rows(&t, &Predicate::new().missing("filter"));
        assert_eq!(present, vec![0, 2]);
        assert_eq!(missing, vec![1]);
    }

    #[test]
    fn string_values_ignore_case() {
        let t = table();
        let upper = matching_rows(&t, &Predicate::new().with("imagetyp", "LIGHT"));
        let lower = matching_rows(&t, &Predicate::new().with("IMAGETYP", "light"));
        assert_eq!(upper, vec![0]);
        assert_eq!(upper, lower);
    }

    #[test]
    fn clauses_are_conjunctive() {
        let t = table();
        let p = Predicate::new().with("imagetyp", "light").with("filter", "r");
        assert_eq!(matching_rows(&t, &p), vec![0]);
        let p = Predicate::new().with("imagetyp", "bias").any("filter");
        assert!(matching_rows(&t, &p).is_empty());
    }

    #[test]
    fn numeric_values_compare_by_value() {
        let t = table();
        assert_eq!(matching_rows(&t, &Predicate::new().with("naxis", 2i64)).len(), 3);
        assert!(matching_rows(&t, &Predicate::new().with("naxis", 1i64)).is_empty());
        assert_eq!(matching_rows(&t, &Predicate::new().with("naxis", 2.0)).len(), 3);
        assert!(matching_rows(&t, &Predicate::new().with("naxis", "2")).is_empty());
    }

    #[test]
    fn unknown_column_counts_as_missing() {
        let t = table();
        assert_eq!(matching_rows(&t, &Predicate::new().missing("monkeys")).len(), 3);
        assert!(matching_rows(&t, &Predicate::new().any("monkeys")).is_empty());
    }

    #[test]
    fn parse_predicate() {
        let p: Predicate = "imagetyp=light, filter=*, object=, naxis=2".parse().unwrap();
        assert_eq!(
            p.clauses(),
            &[
                ("imagetyp".to_string(), Criterion::Equals("light".into())),
                ("filter".to_string(), Criterion::Any),
                ("object".to_string(), Criterion::Missing),
                ("naxis".to_string(), Criterion::Equals(HeaderValue::Integer(2))),
            ]
        );
        assert!("imagetyp".parse::<Predicate>().is_err());
    }
}
