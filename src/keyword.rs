use std::fmt;

use crate::data::model::HeaderValue;
use crate::error::{FitsError, KeywordError};
use crate::fits::{normalize_keyword, Header};

/// One logical header keyword that may be written under several names,
/// e.g. `AIRMASS` and its synonym `SECZ`.
#[derive(Debug, Clone, PartialEq)]
pub struct FitsKeyword {
    name: String,
    synonyms: Vec<String>,
    pub value: Option<HeaderValue>,
    pub comment: Option<String>,
}

impl FitsKeyword {
    /// Names are validated and upper-cased.
    pub fn new(name: &str) -> Result<Self, KeywordError> {
        Ok(Self {
            name: valid_name(name)?,
            synonyms: Vec::new(),
            value: None,
            comment: None,
        })
    }

    pub fn with_synonyms(mut self, synonyms: &[&str]) -> Result<Self, KeywordError> {
        self.synonyms = synonyms
            .iter()
            .map(|s| valid_name(s))
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn with_value(mut self, value: impl Into<HeaderValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn synonyms(&self) -> &[String] {
        &self.synonyms
    }

    /// Primary name followed by the synonyms.
    pub fn names(&self) -> Vec<&str> {
        std::iter::once(self.name.as_str())
            .chain(self.synonyms.iter().map(String::as_str))
            .collect()
    }

    pub fn history_comment(&self, with_name: Option<&str>) -> String {
        let name = with_name.unwrap_or(&self.name).to_ascii_uppercase();
        let value = self.value.as_ref().map(ToString::to_string).unwrap_or_default();
        format!("Updated keyword {name} to value {value}")
    }

    /// Write the value under the primary name and, optionally, every synonym.
    pub fn add_to_header(
        &self,
        header: &mut Header,
        with_synonyms: bool,
        history: bool,
    ) -> Result<(), KeywordError> {
        let value = self
            .value
            .clone()
            .ok_or_else(|| KeywordError::NoValue(self.name.clone()))?;
        let names = if with_synonyms {
            self.names()
        } else {
            vec![self.name.as_str()]
        };
        for name in names {
            let result = match &self.comment {
                Some(comment) => header.set_with_comment(name, value.clone(), comment),
                None => header.set(name, value.clone()),
            };
            result.map_err(|e| match e {
                FitsError::ValueTooLong { .. } => KeywordError::ValueTooLong(name.to_string()),
                _ => KeywordError::InvalidName(name.to_string()),
            })?;
            if history {
                header.add_history(&self.history_comment(Some(name)));
            }
        }
        Ok(())
    }

    /// Take the value from whichever names are present in `header`. All
    /// present names must agree.
    pub fn set_value_from_header(&mut self, header: &Header) -> Result<(), KeywordError> {
        let mut values: Vec<&HeaderValue> = Vec::new();
        for name in self.names() {
            if let Some(v) = header.get(name) {
                if !values.contains(&v) {
                    values.push(v);
                }
            }
        }
        match values.as_slice() {
            [] => Err(KeywordError::NotFound(self.names().join(","))),
            [single] => {
                self.value = Some((*single).clone());
                Ok(())
            }
            many => Err(KeywordError::ConflictingValues {
                names: self.names().join(","),
                values: many
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            }),
        }
    }
}

fn valid_name(name: &str) -> Result<String, KeywordError> {
    normalize_keyword(name).map_err(|_| KeywordError::InvalidName(name.to_string()))
}

impl fmt::Display for FitsKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.value.as_ref().map(ToString::to_string).unwrap_or_default();
        write!(
            f,
            "{} = {}    / {}\n with synonyms: {}",
            self.name,
            value,
            self.comment.as_deref().unwrap_or(""),
            self.synonyms.join(",")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn airmass() -> FitsKeyword {
        FitsKeyword::new("airmass")
            .unwrap()
            .with_synonyms(&["secz"])
            .unwrap()
            .with_comment("Airmass (Sec(Z)) at start of observation")
    }

    #[test]
    fn names_are_upper_case() {
        let kw = airmass();
        assert_eq!(kw.name(), "AIRMASS");
        assert_eq!(kw.names(), vec!["AIRMASS", "SECZ"]);
    }

    #[test]
    fn invalid_names_are_rejected() {
        assert_eq!(
            FitsKeyword::new("way_too_long").unwrap_err(),
            KeywordError::InvalidName("way_too_long".to_string())
        );
        assert!(FitsKeyword::new("ok").unwrap().with_synonyms(&["bad name"]).is_err());
    }

    #[test]
    fn adds_synonyms_and_history() {
        let kw = airmass().with_value(1.25);
        let mut header = Header::new();
        kw.add_to_header(&mut header, true, true).unwrap();
        assert_eq!(header.get_f64("AIRMASS"), Some(1.25));
        assert_eq!(header.get_f64("SECZ"), Some(1.25));
        assert_eq!(
            header.history().collect::<Vec<_>>(),
            vec![
                "Updated keyword AIRMASS to value 1.25",
                "Updated keyword SECZ to value 1.25"
            ]
        );

        let mut bare = Header::new();
        kw.add_to_header(&mut bare, false, false).unwrap();
        assert!(!bare.contains("SECZ"));
    }

    #[test]
    fn value_without_value_is_an_error() {
        let mut header = Header::new();
        assert_eq!(
            airmass().add_to_header(&mut header, true, false),
            Err(KeywordError::NoValue("AIRMASS".to_string()))
        );
    }

    #[test]
    fn value_from_header_checks_synonyms_agree() {
        let mut kw = airmass();
        let mut header = Header::new();
        assert!(matches!(
            kw.set_value_from_header(&header),
            Err(KeywordError::NotFound(_))
        ));

        header.set("SECZ", 1.5).unwrap();
        kw.set_value_from_header(&header).unwrap();
        assert_eq!(kw.value, Some(HeaderValue::Float(1.5)));

        header.set("AIRMASS", 1.6).unwrap();
        assert!(matches!(
            kw.set_value_from_header(&header),
            Err(KeywordError::ConflictingValues { .. })
        ));
    }
}
