use std::fmt::Write as _;

use crate::data::model::HeaderValue;
use crate::error::FitsError;

/// FITS logical record size.
pub const BLOCK_SIZE: usize = 2880;
/// Size of one header card.
pub const CARD_SIZE: usize = 80;
/// Longest string value (quotes doubled) that fits after `KEYWORD = '`.
pub const MAX_STRING_LEN: usize = CARD_SIZE - 12;
/// Text carried by one `COMMENT` or `HISTORY` card.
const COMMENTARY_LEN: usize = CARD_SIZE - 8;

const COMMENTARY: [&str; 3] = ["COMMENT", "HISTORY", ""];

/// Keywords describing the data unit; regenerated on write.
pub(crate) fn is_structural(keyword: &str) -> bool {
    keyword == "SIMPLE"
        || keyword == "BITPIX"
        || keyword == "NAXIS"
        || keyword
            .strip_prefix("NAXIS")
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Upper-case and validate a keyword name: at most 8 characters of
/// `A-Z`, `0-9`, `-` and `_`.
pub fn normalize_keyword(name: &str) -> Result<String, FitsError> {
    let upper = name.trim().to_ascii_uppercase();
    let valid = !upper.is_empty()
        && upper.len() <= 8
        && upper
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'-' || b == b'_');
    if valid {
        Ok(upper)
    } else {
        Err(FitsError::InvalidKeyword(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Card
// ---------------------------------------------------------------------------

/// One 80-character header record.
///
/// Commentary cards (`COMMENT`, `HISTORY`, blank keyword) carry their text in
/// `comment` and never have a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub keyword: String,
    pub value: Option<HeaderValue>,
    pub comment: Option<String>,
}

impl Card {
    pub fn new(keyword: impl Into<String>, value: HeaderValue) -> Self {
        Self {
            keyword: keyword.into(),
            value: Some(value),
            comment: None,
        }
    }

    pub fn commentary(keyword: &str, text: impl Into<String>) -> Self {
        Self {
            keyword: keyword.to_string(),
            value: None,
            comment: Some(text.into()),
        }
    }

    pub fn is_commentary(&self) -> bool {
        COMMENTARY.contains(&self.keyword.as_str())
    }

    /// Parse one card. Returns `None` for the `END` card.
    pub fn parse(record: &str) -> Option<Card> {
        let keyword = record.get(..8).unwrap_or(record).trim_end().to_string();
        if keyword == "END" {
            return None;
        }
        let rest = record.get(8..).unwrap_or("");

        if COMMENTARY.contains(&keyword.as_str()) || !rest.starts_with("= ") {
            return Some(Card {
                keyword,
                value: None,
                comment: Some(rest.trim_end().to_string()),
            });
        }

        let (value, comment) = parse_value_field(&rest[2..]);
        Some(Card {
            keyword,
            value,
            comment,
        })
    }

    /// Render as exactly 80 characters.
    pub fn render(&self) -> String {
        let mut line = format!("{:<8}", self.keyword);
        if self.is_commentary() {
            line.push_str(self.comment.as_deref().unwrap_or(""));
        } else {
            line.push_str("= ");
            match &self.value {
                Some(HeaderValue::String(s)) => {
                    let quoted = format!("'{:<8}'", s.replace('\'', "''"));
                    let _ = write!(line, "{quoted:<20}");
                }
                Some(v) => {
                    let _ = write!(line, "{:>20}", render_scalar(v));
                }
                None => line.push_str(&" ".repeat(20)),
            }
            if let Some(comment) = self.comment.as_deref().filter(|c| !c.is_empty()) {
                let _ = write!(line, " / {comment}");
            }
        }
        let mut line: String = line.chars().take(CARD_SIZE).collect();
        while line.len() < CARD_SIZE {
            line.push(' ');
        }
        line
    }
}

fn render_scalar(value: &HeaderValue) -> String {
    match value {
        HeaderValue::Bool(true) => "T".to_string(),
        HeaderValue::Bool(false) => "F".to_string(),
        HeaderValue::Integer(i) => i.to_string(),
        HeaderValue::Float(f) => format!("{f:?}").replace('e', "E"),
        HeaderValue::String(s) => s.clone(),
    }
}

/// Split the text after `= ` into value and inline comment.
fn parse_value_field(field: &str) -> (Option<HeaderValue>, Option<String>) {
    let trimmed = field.trim_start();

    if let Some(body) = trimmed.strip_prefix('\'') {
        let mut text = String::new();
        let mut chars = body.char_indices().peekable();
        let mut end = body.len();
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    text.push('\'');
                    chars.next();
                } else {
                    end = i + 1;
                    break;
                }
            } else {
                text.push(c);
            }
        }
        let comment = body[end..]
            .split_once('/')
            .map(|(_, c)| c.trim().to_string());
        return (Some(HeaderValue::String(text.trim_end().to_string())), comment);
    }

    let (raw, comment) = match trimmed.split_once('/') {
        Some((v, c)) => (v.trim(), Some(c.trim().to_string())),
        None => (trimmed.trim(), None),
    };
    let value = match raw {
        "" => None,
        "T" => Some(HeaderValue::Bool(true)),
        "F" => Some(HeaderValue::Bool(false)),
        _ => Some(
            raw.parse::<i64>()
                .map(HeaderValue::Integer)
                .or_else(|_| raw.replace(['D', 'd'], "E").parse::<f64>().map(HeaderValue::Float))
                .unwrap_or_else(|_| HeaderValue::String(raw.to_string())),
        ),
    };
    (value, comment)
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Ordered list of header cards. Lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    fn position(&self, keyword: &str) -> Option<usize> {
        self.cards
            .iter()
            .position(|c| !c.is_commentary() && c.keyword.eq_ignore_ascii_case(keyword))
    }

    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        self.position(keyword)
            .and_then(|i| self.cards[i].value.as_ref())
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(HeaderValue::as_f64)
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(HeaderValue::as_str)
    }

    pub fn get_i64(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(HeaderValue::as_i64)
    }

    pub fn comment_of(&self, keyword: &str) -> Option<&str> {
        self.position(keyword)
            .and_then(|i| self.cards[i].comment.as_deref())
    }

    /// True when the keyword has a card with a value.
    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    /// Set a value, keeping the existing comment and card position. String
    /// values too long for one card are refused rather than cut.
    pub fn set(&mut self, keyword: &str, value: impl Into<HeaderValue>) -> Result<(), FitsError> {
        let keyword = normalize_keyword(keyword)?;
        let value = value.into();
        if let HeaderValue::String(s) = &value {
            let len = s.len() + s.matches('\'').count();
            if len > MAX_STRING_LEN {
                return Err(FitsError::ValueTooLong {
                    keyword,
                    len,
                    max: MAX_STRING_LEN,
                });
            }
        }
        match self.position(&keyword) {
            Some(i) => self.cards[i].value = Some(value),
            None => self.cards.push(Card::new(keyword, value)),
        }
        Ok(())
    }

    pub fn set_with_comment(
        &mut self,
        keyword: &str,
        value: impl Into<HeaderValue>,
        comment: &str,
    ) -> Result<(), FitsError> {
        self.set(keyword, value)?;
        if let Some(i) = self.position(keyword) {
            self.cards[i].comment = Some(comment.to_string());
        }
        Ok(())
    }

    /// Remove every non-commentary card named `keyword`; returns the first value.
    pub fn remove(&mut self, keyword: &str) -> Option<HeaderValue> {
        let first = self.get(keyword).cloned();
        self.cards
            .retain(|c| c.is_commentary() || !c.keyword.eq_ignore_ascii_case(keyword));
        first
    }

    /// Long text continues on further `HISTORY` cards.
    pub fn add_history(&mut self, text: &str) {
        self.push_commentary("HISTORY", text);
    }

    pub fn add_comment(&mut self, text: &str) {
        self.push_commentary("COMMENT", text);
    }

    fn push_commentary(&mut self, keyword: &str, text: &str) {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            self.cards.push(Card::commentary(keyword, ""));
        }
        for chunk in chars.chunks(COMMENTARY_LEN) {
            self.cards
                .push(Card::commentary(keyword, chunk.iter().collect::<String>()));
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.commentary("HISTORY")
    }

    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.commentary("COMMENT")
    }

    fn commentary<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a str> {
        self.cards
            .iter()
            .filter(move |c| c.keyword == keyword)
            .filter_map(|c| c.comment.as_deref())
            .map(str::trim_end)
    }

    /// Distinct valued keyword names in card order. Commentary cards are
    /// excluded.
    pub fn keywords(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for card in self.cards.iter().filter(|c| !c.is_commentary()) {
            if !seen.iter().any(|k| k.eq_ignore_ascii_case(&card.keyword)) {
                seen.push(&card.keyword);
            }
        }
        seen
    }

    pub(crate) fn push_card(&mut self, card: Card) {
        self.cards.push(card);
    }

    // -- block encoding --

    /// Append the cards of one header block. Returns true once `END` is seen.
    pub(crate) fn parse_block(&mut self, block: &[u8]) -> Result<bool, FitsError> {
        if !block.is_ascii() {
            return Err(FitsError::InvalidFormat("header contains non-ASCII bytes".into()));
        }
        for chunk in block.chunks(CARD_SIZE) {
            // ASCII checked above
            let record = std::str::from_utf8(chunk)
                .map_err(|e| FitsError::InvalidFormat(e.to_string()))?;
            match Card::parse(record) {
                Some(card) => {
                    if self.cards.is_empty() && card.keyword != "SIMPLE" {
                        return Err(FitsError::InvalidFormat(
                            "first card is not SIMPLE".to_string(),
                        ));
                    }
                    if !(card.keyword.is_empty() && card.comment.as_deref().unwrap_or("").is_empty()) {
                        self.cards.push(card);
                    }
                }
                None => return Ok(true),
            }
        }
        Ok(false)
    }

    /// Render all cards plus `END`, padded with blanks to whole blocks.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::with_capacity(BLOCK_SIZE);
        for card in &self.cards {
            out.push_str(&card.render());
        }
        out.push_str(&format!("{:<80}", "END"));
        let padding = (BLOCK_SIZE - out.len() % BLOCK_SIZE) % BLOCK_SIZE;
        out.push_str(&" ".repeat(padding));
        out.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_value_cards() {
        let card = Card::parse(&format!("{:<80}", "IMAGETYP= 'Light Frame'        / Type of image")).unwrap();
        assert_eq!(card.keyword, "IMAGETYP");
        assert_eq!(card.value, Some(HeaderValue::from("Light Frame")));
        assert_eq!(card.comment.as_deref(), Some("Type of image"));

        let card = Card::parse(&format!("{:<80}", "EXPTIME =                 30.0")).unwrap();
        assert_eq!(card.value, Some(HeaderValue::Float(30.0)));

        let card = Card::parse(&format!("{:<80}", "NAXIS   =                    2")).unwrap();
        assert_eq!(card.value, Some(HeaderValue::Integer(2)));

        let card = Card::parse(&format!("{:<80}", "OSCAN   =                    T")).unwrap();
        assert_eq!(card.value, Some(HeaderValue::Bool(true)));

        let card = Card::parse(&format!("{:<80}", "JD      =        2.4556D+06")).unwrap();
        assert_eq!(card.value, Some(HeaderValue::Float(2.4556e6)));
    }

    #[test]
    fn strings_keep_quotes_and_empty_values() {
        let card = Card::parse(&format!("{:<80}", "OBSERVER= 'O''Brien '")).unwrap();
        assert_eq!(card.value, Some(HeaderValue::from("O'Brien")));

        let card = Card::parse(&format!("{:<80}", "OBJECT  = ''")).unwrap();
        assert_eq!(card.value, Some(HeaderValue::from("")));
    }

    #[test]
    fn end_and_commentary_cards() {
        assert!(Card::parse(&format!("{:<80}", "END")).is_none());
        let card = Card::parse(&format!("{:<80}", "HISTORY patched")).unwrap();
        assert!(card.is_commentary());
        assert_eq!(card.comment.as_deref(), Some("patched"));
    }

    #[test]
    fn rendered_cards_parse_back() {
        let cards = [
            Card::new("OBJECT", "M 13".into()),
            Card::new("EXPTIME", HeaderValue::Float(1.0e-7)),
            Card::new("XBINNING", HeaderValue::Integer(2)),
            Card::new("TRIMMED", HeaderValue::Bool(false)),
        ];
        for card in cards {
            let line = card.render();
            assert_eq!(line.len(), CARD_SIZE);
            assert_eq!(Card::parse(&line), Some(card));
        }
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut header = Header::new();
        header.set("imagetyp", "LIGHT").unwrap();
        header.set_with_comment("EXPTIME", 30.0, "seconds").unwrap();
        assert_eq!(header.get_str("IMAGETYP"), Some("LIGHT"));
        assert_eq!(header.get_f64("exptime"), Some(30.0));
        assert_eq!(header.comment_of("EXPTIME"), Some("seconds"));

        header.set("EXPTIME", 60.0).unwrap();
        assert_eq!(header.comment_of("EXPTIME"), Some("seconds"));
        assert_eq!(header.remove("exptime"), Some(HeaderValue::Float(60.0)));
        assert!(!header.contains("EXPTIME"));
    }

    #[test]
    fn rejects_bad_keyword_names() {
        let mut header = Header::new();
        assert!(header.set("TOO_LONG_NAME", 1i64).is_err());
        assert!(header.set("BAD KEY", 1i64).is_err());
        assert!(header.set("date-obs", "2012-01-01").is_ok());
    }

    #[test]
    fn long_strings_are_refused_not_cut() {
        let mut header = Header::new();
        let fits = "x".repeat(MAX_STRING_LEN);
        header.set("NOTES", fits.as_str()).unwrap();
        assert_eq!(Card::parse(&header.cards()[0].render()), Some(header.cards()[0].clone()));

        let quoted = format!("{}'", "x".repeat(MAX_STRING_LEN - 1));
        let err = header.set("NOTES", quoted.as_str()).unwrap_err();
        assert!(matches!(err, FitsError::ValueTooLong { len, .. } if len == MAX_STRING_LEN + 1));
        assert_eq!(header.get_str("NOTES"), Some(fits.as_str()));
    }

    #[test]
    fn long_history_continues_on_more_cards() {
        let mut header = Header::new();
        let text = "y".repeat(COMMENTARY_LEN + 5);
        header.add_history(&text);
        let lines: Vec<&str> = header.history().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines.concat(), text);
        assert!(header.cards().iter().all(|c| c.render().len() == CARD_SIZE));
    }

    #[test]
    fn structural_keywords() {
        assert!(is_structural("NAXIS2"));
        assert!(is_structural("BITPIX"));
        assert!(!is_structural("NAXISX"));
        assert!(!is_structural("EXPTIME"));
    }

    #[test]
    fn header_bytes_are_block_aligned() {
        let mut header = Header::new();
        header.set("SIMPLE", true).unwrap();
        header.add_history("first");
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), BLOCK_SIZE);

        let mut back = Header::new();
        assert!(back.parse_block(&bytes).unwrap());
        assert_eq!(back, header);
        assert_eq!(back.history().collect::<Vec<_>>(), vec!["first"]);
    }
}
