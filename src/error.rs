use crate::Position;
use std::fmt::{Display, Formatter, Write};

/// Errors raised while building or preparing a grammar. These are fatal and
/// aborting: there is no recovery from a construction error.
#[derive(Debug, Clone)]
pub enum ConstructionError {
    /// Implementation bug escape hatch.
    Internal(String),
    /// Grammar has no productions.
    InvalidParser(String),
    /// A token pattern's text was rejected by every matcher.
    InvalidToken(String),
    /// Empty production, duplicate id, undefined reference, left recursion,
    /// empty-match, or duplicate alternative.
    InvalidProduction(String),
    /// A cycle was detected at the current look-ahead depth.
    InfiniteLoop(String),
    /// A conflict could not be resolved at any permitted look-ahead depth.
    InherentAmbiguity(String),
}

impl Display for ConstructionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstructionError::Internal(m) => write!(f, "INTERNAL: {}", m),
            ConstructionError::InvalidParser(m) => write!(f, "INVALID_PARSER: {}", m),
            ConstructionError::InvalidToken(m) => write!(f, "INVALID_TOKEN: {}", m),
            ConstructionError::InvalidProduction(m) => write!(f, "INVALID_PRODUCTION: {}", m),
            ConstructionError::InfiniteLoop(m) => write!(f, "INFINITE_LOOP: {}", m),
            ConstructionError::InherentAmbiguity(m) => write!(f, "INHERENT_AMBIGUITY: {}", m),
        }
    }
}

impl std::error::Error for ConstructionError {}

/// The kind of a single parse-time error.
#[derive(Debug, Clone)]
pub enum ParseErrorKind {
    Io(String),
    UnexpectedEof,
    UnexpectedChar(char),
    UnexpectedToken { found: String, expected: Vec<String> },
    InvalidToken(String),
    Analysis(String),
    Internal(String),
}

/// A single diagnostic discovered while parsing, with the position it
/// occurred at.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub position: Position,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(position: Position, kind: ParseErrorKind) -> Self {
        Self { position, kind }
    }

    pub fn io(position: Position, message: impl Into<String>) -> Self {
        Self::new(position, ParseErrorKind::Io(message.into()))
    }

    pub fn unexpected_eof(position: Position) -> Self {
        Self::new(position, ParseErrorKind::UnexpectedEof)
    }

    pub fn unexpected_char(position: Position, ch: char) -> Self {
        Self::new(position, ParseErrorKind::UnexpectedChar(ch))
    }

    pub fn unexpected_token(position: Position, found: String, expected: Vec<String>) -> Self {
        Self::new(position, ParseErrorKind::UnexpectedToken { found, expected })
    }

    pub fn invalid_token(position: Position, message: impl Into<String>) -> Self {
        Self::new(position, ParseErrorKind::InvalidToken(message.into()))
    }

    pub fn analysis(position: Position, message: impl Into<String>) -> Self {
        Self::new(position, ParseErrorKind::Analysis(message.into()))
    }
}

fn join_expected(expected: &[String]) -> String {
    match expected.len() {
        0 => String::new(),
        1 => expected[0].clone(),
        _ => {
            let (last, head) = expected.split_last().unwrap();
            format!("{} or {}", head.join(", "), last)
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ParseErrorKind::Io(message) => write!(f, "I/O error at {}: {}", self.position, message),
            ParseErrorKind::UnexpectedEof => {
                write!(f, "Unexpected end of file at {}.", self.position)
            }
            ParseErrorKind::UnexpectedChar(ch) => {
                write!(f, "Unexpected character '{}' at {}.", ch, self.position)
            }
            ParseErrorKind::UnexpectedToken { found, expected } => write!(
                f,
                "Unexpected {} at {}, expected {}.",
                found,
                self.position,
                join_expected(expected)
            ),
            ParseErrorKind::InvalidToken(message) => {
                write!(f, "{} at {}.", message, self.position)
            }
            ParseErrorKind::Analysis(message) => write!(f, "{} at {}.", message, self.position),
            ParseErrorKind::Internal(message) => {
                write!(f, "internal error at {}: {}", self.position, message)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Accumulating log of parse errors discovered during a single `parse()`
/// run. A non-empty log is the composite failure raised at the end of
/// parsing.
#[derive(Debug, Clone, Default)]
pub struct ParseErrorLog {
    errors: Vec<ParseError>,
}

impl ParseErrorLog {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn push(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }
}

impl Display for ParseErrorLog {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_char('\n')?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrorLog {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_list_uses_or_before_last() {
        let expected = vec!["+".to_string(), "-".to_string(), "*".to_string()];
        assert_eq!(join_expected(&expected), "+, - or *");
    }

    #[test]
    fn log_joins_errors_line_by_line() {
        let mut log = ParseErrorLog::new();
        log.push(ParseError::unexpected_eof(Position::new(2, 1)));
        log.push(ParseError::unexpected_char(Position::new(3, 1), '#'));
        let rendered = format!("{}", log);
        assert_eq!(rendered.lines().count(), 2);
    }
}
