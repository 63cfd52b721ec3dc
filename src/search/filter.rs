//! Match filter expressions.
//!
//! A filter is a boolean expression over per-field match outcomes:
//!
//! ```text
//! artist:match AND title:match
//! artist:contains AND (title:match OR title:similarity>=0.8)
//! ```
//!
//! `AND`/`OR` are case-insensitive and have equal precedence: they apply
//! strictly left to right, so `a OR b AND c` means `(a OR b) AND c`.
//! Parentheses group explicitly.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::domain::FieldMatch;

/// A field a filter can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Artist,
    Title,
    Album,
    /// Candidate title compared against `"artist title"` of the search item
    ArtistWithTitle,
    /// Candidate title compared against the search item's artist
    ArtistInTitle,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Artist,
        Field::Title,
        Field::Album,
        Field::ArtistWithTitle,
        Field::ArtistInTitle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Artist => "artist",
            Field::Title => "title",
            Field::Album => "album",
            Field::ArtistWithTitle => "artistWithTitle",
            Field::ArtistInTitle => "artistInTitle",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an atom checks on its field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    /// Score cleared the match threshold
    Match,
    /// One side contains the other as whole words
    Contains,
    /// Both `Match` and `Contains`
    Is,
    /// Negated `Match`
    Not,
    /// Score is at least the given value
    Similarity(f64),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Match => f.write_str("match"),
            Operation::Contains => f.write_str("contains"),
            Operation::Is => f.write_str("is"),
            Operation::Not => f.write_str("not"),
            Operation::Similarity(t) => write!(f, "similarity>={}", t),
        }
    }
}

/// Parsed filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Atom { field: Field, op: Operation },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

/// Per-field match outcomes a predicate is evaluated against
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMatches(BTreeMap<Field, FieldMatch>);

impl FieldMatches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, matched: FieldMatch) {
        self.0.insert(field, matched);
    }

    pub fn get(&self, field: Field) -> Option<&FieldMatch> {
        self.0.get(&field)
    }

    /// Build from plain match/no-match flags
    pub fn from_flags(flags: impl IntoIterator<Item = (Field, bool)>) -> Self {
        Self(
            flags
                .into_iter()
                .map(|(field, matched)| (field, FieldMatch::from_flag(matched)))
                .collect(),
        )
    }
}

/// Filter parse and evaluation failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("Invalid filter expression '{expression}': {message}")]
    Parse { expression: String, message: String },

    #[error("No match data supplied for field '{field}'")]
    Evaluation { field: Field },
}

impl Predicate {
    /// Evaluate against `fields`.
    ///
    /// Every field the expression mentions must be present, even ones a
    /// left-to-right evaluation would never reach.
    pub fn evaluate(&self, fields: &FieldMatches) -> Result<bool, FilterError> {
        if let Some(field) = self.fields().into_iter().find(|f| fields.get(*f).is_none()) {
            return Err(FilterError::Evaluation { field });
        }
        Ok(self.eval(fields))
    }

    /// Fields referenced anywhere in the expression
    pub fn fields(&self) -> BTreeSet<Field> {
        let mut out = BTreeSet::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut BTreeSet<Field>) {
        match self {
            Predicate::Atom { field, .. } => {
                out.insert(*field);
            }
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.collect_fields(out);
                r.collect_fields(out);
            }
        }
    }

    fn eval(&self, fields: &FieldMatches) -> bool {
        match self {
            Predicate::Atom { field, op } => {
                let m = fields.get(*field).copied().unwrap_or_default();
                match op {
                    Operation::Match => m.matched,
                    Operation::Contains => m.contains,
                    Operation::Is => m.matched && m.contains,
                    Operation::Not => !m.matched,
                    Operation::Similarity(threshold) => m.score >= *threshold,
                }
            }
            Predicate::And(l, r) => l.eval(fields) && r.eval(fields),
            Predicate::Or(l, r) => l.eval(fields) || r.eval(fields),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let child = |p: &Predicate, f: &mut fmt::Formatter<'_>| match p {
            Predicate::Atom { .. } => write!(f, "{}", p),
            _ => write!(f, "({})", p),
        };
        match self {
            Predicate::Atom { field, op } => write!(f, "{}:{}", field, op),
            Predicate::And(l, r) => {
                child(l, f)?;
                f.write_str(" AND ")?;
                child(r, f)
            }
            Predicate::Or(l, r) => {
                child(l, f)?;
                f.write_str(" OR ")?;
                child(r, f)
            }
        }
    }
}

// ============================================================================
// Parser
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    And,
    Or,
    Word(String),
}

fn tokenize(expression: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    let flush = |word: &mut String, tokens: &mut Vec<Token>| {
        if word.is_empty() {
            return;
        }
        let token = if word.eq_ignore_ascii_case("and") {
            Token::And
        } else if word.eq_ignore_ascii_case("or") {
            Token::Or
        } else {
            Token::Word(word.clone())
        };
        tokens.push(token);
        word.clear();
    };

    for c in squeeze_colons(expression).chars() {
        match c {
            '(' | ')' => {
                flush(&mut word, &mut tokens);
                tokens.push(if c == '(' { Token::Open } else { Token::Close });
            }
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            c => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

/// Drop whitespace around `:` so `title : match` reads as `title:match`
fn squeeze_colons(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut pending_space = false;
    for c in expression.chars() {
        if c.is_whitespace() {
            pending_space = !out.ends_with(':');
            continue;
        }
        if pending_space && c != ':' {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> FilterError {
        FilterError::Parse {
            expression: self.expression.to_string(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_expr(&mut self) -> Result<Predicate, FilterError> {
        let mut left = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.pos += 1;
                    let right = self.parse_term()?;
                    left = Predicate::And(Box::new(left), Box::new(right));
                }
                Some(Token::Or) => {
                    self.pos += 1;
                    let right = self.parse_term()?;
                    left = Predicate::Or(Box::new(left), Box::new(right));
                }
                Some(Token::Close) | None => return Ok(left),
                Some(other) => {
                    return Err(self.error(format!("expected AND or OR, found {:?}", other)));
                }
            }
        }
    }

    fn parse_term(&mut self) -> Result<Predicate, FilterError> {
        match self.next() {
            Some(Token::Open) => {
                let inner = self.parse_expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(self.error("unbalanced parenthesis")),
                }
            }
            Some(Token::Word(word)) => self.parse_atom(&word),
            Some(Token::And) | Some(Token::Or) => Err(self.error("operator without left operand")),
            Some(Token::Close) => Err(self.error("unexpected ')'")),
            None => Err(self.error("expected a condition")),
        }
    }

    fn parse_atom(&self, atom: &str) -> Result<Predicate, FilterError> {
        let Some((field, op)) = atom.split_once(':') else {
            return Err(self.error(format!("condition '{}' is not of the form field:operation", atom)));
        };
        let field = Field::parse(field.trim())
            .ok_or_else(|| self.error(format!("unknown field '{}'", field)))?;
        let op = parse_operation(op.trim())
            .ok_or_else(|| self.error(format!("unknown operation '{}'", op)))?;
        Ok(Predicate::Atom { field, op })
    }
}

fn parse_operation(op: &str) -> Option<Operation> {
    let lower = op.to_ascii_lowercase();
    match lower.as_str() {
        "match" => Some(Operation::Match),
        "contains" => Some(Operation::Contains),
        "is" => Some(Operation::Is),
        "not" => Some(Operation::Not),
        _ => {
            let threshold: f64 = lower.strip_prefix("similarity>=")?.parse().ok()?;
            (0.0..=1.0)
                .contains(&threshold)
                .then_some(Operation::Similarity(threshold))
        }
    }
}

/// Parse a filter expression into a [`Predicate`]
pub fn parse_filter_expression(expression: &str) -> Result<Predicate, FilterError> {
    let mut parser = Parser {
        expression,
        tokens: tokenize(expression),
        pos: 0,
    };
    let predicate = parser.parse_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(predicate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(artist: bool, title: bool) -> FieldMatches {
        FieldMatches::from_flags([(Field::Artist, artist), (Field::Title, title)])
    }

    #[test]
    fn test_and_expression() {
        let p = parse_filter_expression("artist:match AND title:match").unwrap();
        assert!(p.evaluate(&flags(true, true)).unwrap());
        assert!(!p.evaluate(&flags(true, false)).unwrap());
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let p = parse_filter_expression("artist:match or title:match").unwrap();
        assert!(p.evaluate(&flags(false, true)).unwrap());
        assert!(!p.evaluate(&flags(false, false)).unwrap());
    }

    #[test]
    fn test_left_to_right_without_precedence() {
        // (artist OR title) AND album, not artist OR (title AND album)
        let p = parse_filter_expression("artist:match OR title:match AND album:match").unwrap();
        let fields = FieldMatches::from_flags([
            (Field::Artist, true),
            (Field::Title, false),
            (Field::Album, false),
        ]);
        assert!(!p.evaluate(&fields).unwrap());
    }

    #[test]
    fn test_parentheses_group() {
        let p = parse_filter_expression("artist:match OR (title:match AND album:match)").unwrap();
        let fields = FieldMatches::from_flags([
            (Field::Artist, true),
            (Field::Title, false),
            (Field::Album, false),
        ]);
        assert!(p.evaluate(&fields).unwrap());
    }

    #[test]
    fn test_unknown_field_fails_parse() {
        let err = parse_filter_expression("genre:match").unwrap_err();
        assert!(matches!(err, FilterError::Parse { .. }));
        assert!(err.to_string().contains("genre"));
    }

    #[test]
    fn test_unknown_operation_fails_parse() {
        let err = parse_filter_expression("artist:resembles").unwrap_err();
        assert!(err.to_string().contains("resembles"));
    }

    #[test]
    fn test_whitespace_around_colon() {
        let spaced = parse_filter_expression("artist : match AND title :contains").unwrap();
        let tight = parse_filter_expression("artist:match AND title:contains").unwrap();
        assert_eq!(spaced, tight);
        assert_eq!(
            parse_filter_expression("( title:  similarity>=0.8 )").unwrap(),
            parse_filter_expression("(title:similarity>=0.8)").unwrap()
        );
        assert!(parse_filter_expression("artist : AND title:match").is_err());
    }

    #[test]
    fn test_malformed_expressions() {
        for expr in [
            "",
            "artist",
            "AND title:match",
            "artist:match AND",
            "(artist:match",
            "artist:match)",
            "artist:match title:match",
            "title:similarity>=1.5",
            "title:similarity>=abc",
        ] {
            assert!(
                parse_filter_expression(expr).is_err(),
                "expected parse error for {:?}",
                expr
            );
        }
    }

    #[test]
    fn test_missing_field_is_evaluation_error() {
        let p = parse_filter_expression("artist:match AND album:match").unwrap();
        let err = p.evaluate(&flags(false, true)).unwrap_err();
        assert_eq!(err, FilterError::Evaluation { field: Field::Album });
    }

    #[test]
    fn test_missing_field_detected_despite_short_circuit() {
        // artist is false, so album would never be evaluated
        let p = parse_filter_expression("artist:match AND album:match").unwrap();
        let fields = FieldMatches::from_flags([(Field::Artist, false)]);
        assert!(p.evaluate(&fields).is_err());
    }

    #[test]
    fn test_extended_operations() {
        let eval = |m: FieldMatch, expr: &str| {
            let mut fields = FieldMatches::new();
            fields.insert(Field::Title, m);
            parse_filter_expression(expr).unwrap().evaluate(&fields).unwrap()
        };
        let partial = FieldMatch {
            score: 0.82,
            matched: false,
            contains: true,
            exact: false,
        };

        assert!(eval(partial, "title:contains"));
        assert!(eval(partial, "title:not"));
        assert!(!eval(partial, "title:is"));
        assert!(eval(partial, "title:similarity>=0.8"));
        assert!(!eval(partial, "title:similarity>=0.9"));

        let similar = FieldMatch {
            score: 0.9,
            matched: true,
            contains: false,
            exact: false,
        };
        assert!(!eval(similar, "title:is"));
        assert!(eval(FieldMatch::from_flag(true), "title:is"));
    }

    #[test]
    fn test_camel_case_fields() {
        let p = parse_filter_expression("artistWithTitle:similarity>=0.9").unwrap();
        assert_eq!(p.fields().into_iter().collect::<Vec<_>>(), vec![Field::ArtistWithTitle]);
    }

    #[test]
    fn test_display_reparses() {
        let expr = "artist:contains AND (title:match OR title:similarity>=0.8)";
        let p = parse_filter_expression(expr).unwrap();
        assert_eq!(p.to_string(), expr);
        assert_eq!(parse_filter_expression(&p.to_string()).unwrap(), p);
    }
}
