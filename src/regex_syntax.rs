use crate::error::ConstructionError;

/// A character class: a literal set of ranges, optionally negated.
#[derive(Debug, Clone)]
pub struct CharClass {
    pub negated: bool,
    pub ranges: Vec<(char, char)>,
}

impl CharClass {
    fn single(ch: char) -> Self {
        Self { negated: false, ranges: vec![(ch, ch)] }
    }

    pub fn matches(&self, ch: char) -> bool {
        let hit = self.ranges.iter().any(|(lo, hi)| *lo <= ch && ch <= *hi);
        hit != self.negated
    }
}

fn digit_class() -> CharClass {
    CharClass { negated: false, ranges: vec![('0', '9')] }
}
fn word_class() -> CharClass {
    CharClass {
        negated: false,
        ranges: vec![('A', 'Z'), ('a', 'z'), ('0', '9'), ('_', '_')],
    }
}
fn space_class() -> CharClass {
    CharClass {
        negated: false,
        ranges: vec![
            (' ', ' '),
            ('\t', '\t'),
            ('\n', '\n'),
            ('\x0c', '\x0c'),
            ('\r', '\r'),
            ('\x0b', '\x0b'),
        ],
    }
}

/// The "any character" class used by `.`: everything except the line
/// terminators recognized by the dialect.
pub fn dot_class() -> CharClass {
    CharClass {
        negated: true,
        ranges: vec![
            ('\n', '\n'),
            ('\r', '\r'),
            ('\u{0085}', '\u{0085}'),
            ('\u{2028}', '\u{2029}'),
        ],
    }
}

/// Parsed form of a token regular expression, shared by the compact NFA
/// compiler and the general fallback matcher.
#[derive(Debug, Clone)]
pub enum RegexAst {
    Literal(char),
    Class(CharClass),
    Any,
    Concat(Vec<RegexAst>),
    Alternate(Vec<RegexAst>),
    Repeat { node: Box<RegexAst>, min: u32, max: Option<u32> },
}

/// Parse `pattern` against the token regular-expression dialect described in
/// the component design: alternation, concatenation, grouping, character
/// classes, greedy-only quantifiers, `.`, and the fixed escape set. Anchors
/// and reluctant/possessive quantifier markers are rejected.
pub fn parse(pattern: &str) -> Result<RegexAst, ConstructionError> {
    let mut parser = Parser { chars: pattern.chars().collect(), pos: 0 };
    let ast = parser.parse_alternation()?;
    if parser.pos != parser.chars.len() {
        return Err(ConstructionError::InvalidToken(format!(
            "unexpected '{}' in pattern '{}'",
            parser.chars[parser.pos], pattern
        )));
    }
    Ok(ast)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, ch: char) -> Result<(), ConstructionError> {
        if self.bump() == Some(ch) {
            Ok(())
        } else {
            Err(ConstructionError::InvalidToken(format!("expected '{}'", ch)))
        }
    }

    fn parse_alternation(&mut self) -> Result<RegexAst, ConstructionError> {
        let mut branches = vec![self.parse_concatenation()?];
        while self.peek() == Some('|') {
            self.bump();
            branches.push(self.parse_concatenation()?);
        }
        if branches.len() == 1 {
            Ok(branches.pop().unwrap())
        } else {
            Ok(RegexAst::Alternate(branches))
        }
    }

    fn parse_concatenation(&mut self) -> Result<RegexAst, ConstructionError> {
        let mut parts = Vec::new();
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            parts.push(self.parse_repetition()?);
        }
        if parts.len() == 1 {
            Ok(parts.pop().unwrap())
        } else {
            Ok(RegexAst::Concat(parts))
        }
    }

    fn parse_repetition(&mut self) -> Result<RegexAst, ConstructionError> {
        let atom = self.parse_atom()?;
        let (min, max) = match self.peek() {
            Some('?') => {
                self.bump();
                (0, Some(1))
            }
            Some('*') => {
                self.bump();
                (0, None)
            }
            Some('+') => {
                self.bump();
                (1, None)
            }
            Some('{') => self.parse_bounds()?,
            _ => return Ok(atom),
        };
        if matches!(self.peek(), Some('?') | Some('+')) {
            return Err(ConstructionError::InvalidToken(
                "reluctant and possessive quantifiers are not supported".into(),
            ));
        }
        Ok(RegexAst::Repeat { node: Box::new(atom), min, max })
    }

    fn parse_bounds(&mut self) -> Result<(u32, Option<u32>), ConstructionError> {
        self.expect('{')?;
        let n = self.parse_number()?;
        let bounds = match self.peek() {
            Some(',') => {
                self.bump();
                if self.peek() == Some('}') {
                    (n, None)
                } else {
                    let m = self.parse_number()?;
                    (n, Some(m))
                }
            }
            _ => (n, Some(n)),
        };
        self.expect('}')?;
        if let (min, Some(max)) = bounds {
            if max < min {
                return Err(ConstructionError::InvalidToken(format!(
                    "repetition bound {{{},{}}} has max less than min",
                    min, max
                )));
            }
        }
        Ok(bounds)
    }

    fn parse_number(&mut self) -> Result<u32, ConstructionError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if start == self.pos {
            return Err(ConstructionError::InvalidToken("expected a number in repetition bound".into()));
        }
        let s: String = self.chars[start..self.pos].iter().collect();
        s.parse::<u32>()
            .map_err(|e| ConstructionError::InvalidToken(format!("invalid repetition bound: {}", e)))
    }

    fn parse_atom(&mut self) -> Result<RegexAst, ConstructionError> {
        match self.bump() {
            Some('(') => {
                let inner = self.parse_alternation()?;
                self.expect(')')?;
                Ok(inner)
            }
            Some('[') => self.parse_class(),
            Some('.') => Ok(RegexAst::Any),
            Some('^') | Some('$') => Err(ConstructionError::InvalidToken(
                "anchors are not supported in the token regular-expression dialect".into(),
            )),
            Some('\\') => self.parse_escape().map(escape_to_ast),
            Some(c) => Ok(RegexAst::Literal(c)),
            None => Err(ConstructionError::InvalidToken("unexpected end of pattern".into())),
        }
    }

    fn parse_class(&mut self) -> Result<RegexAst, ConstructionError> {
        let negated = if self.peek() == Some('^') {
            self.bump();
            true
        } else {
            false
        };
        let mut ranges = Vec::new();
        while self.peek() != Some(']') {
            let lo = match self.bump() {
                Some('\\') => match self.parse_escape()? {
                    Escape::Literal(c) => c,
                    Escape::Class(class) => {
                        ranges.extend(class.ranges);
                        continue;
                    }
                },
                Some(c) => c,
                None => {
                    return Err(ConstructionError::InvalidToken(
                        "unterminated character class".into(),
                    ))
                }
            };
            if self.peek() == Some('-') && self.chars.get(self.pos + 1) != Some(&']') {
                self.bump();
                let hi = match self.bump() {
                    Some('\\') => match self.parse_escape()? {
                        Escape::Literal(c) => c,
                        Escape::Class(_) => {
                            return Err(ConstructionError::InvalidToken(
                                "class shorthand cannot be a range endpoint".into(),
                            ))
                        }
                    },
                    Some(c) => c,
                    None => {
                        return Err(ConstructionError::InvalidToken(
                            "unterminated character class".into(),
                        ))
                    }
                };
                ranges.push((lo, hi));
            } else {
                ranges.push((lo, lo));
            }
        }
        self.expect(']')?;
        Ok(RegexAst::Class(CharClass { negated, ranges }))
    }

    fn parse_escape(&mut self) -> Result<Escape, ConstructionError> {
        let c = self
            .bump()
            .ok_or_else(|| ConstructionError::InvalidToken("dangling escape".into()))?;
        Ok(match c {
            'd' => Escape::Class(digit_class()),
            'D' => Escape::Class(negate(digit_class())),
            's' => Escape::Class(space_class()),
            'S' => Escape::Class(negate(space_class())),
            'w' => Escape::Class(word_class()),
            'W' => Escape::Class(negate(word_class())),
            't' => Escape::Literal('\t'),
            'n' => Escape::Literal('\n'),
            'r' => Escape::Literal('\r'),
            'f' => Escape::Literal('\x0c'),
            'a' => Escape::Literal('\u{0007}'),
            'e' => Escape::Literal('\u{001b}'),
            '0' => Escape::Literal(self.parse_octal()?),
            'x' => Escape::Literal(self.parse_hex(2)?),
            'u' => Escape::Literal(self.parse_hex(4)?),
            c if c.is_ascii_alphanumeric() => {
                return Err(ConstructionError::InvalidToken(format!(
                    "unrecognized escape '\\{}'",
                    c
                )))
            }
            c => Escape::Literal(c),
        })
    }

    fn parse_octal(&mut self) -> Result<char, ConstructionError> {
        let first = self.bump().filter(|c| ('0'..='3').contains(c)).ok_or_else(|| {
            ConstructionError::InvalidToken("octal escape must start with 0-3".into())
        })?;
        let mut value = first.to_digit(8).unwrap();
        for _ in 0..2 {
            let d = self
                .bump()
                .and_then(|c| c.to_digit(8))
                .ok_or_else(|| ConstructionError::InvalidToken("expected three octal digits".into()))?;
            value = value * 8 + d;
        }
        char::from_u32(value).ok_or_else(|| ConstructionError::InvalidToken("invalid octal escape".into()))
    }

    fn parse_hex(&mut self, digits: usize) -> Result<char, ConstructionError> {
        let mut value = 0u32;
        for _ in 0..digits {
            let d = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| ConstructionError::InvalidToken("expected hex digits".into()))?;
            value = value * 16 + d;
        }
        char::from_u32(value).ok_or_else(|| ConstructionError::InvalidToken("invalid hex escape".into()))
    }
}

enum Escape {
    Literal(char),
    Class(CharClass),
}

fn escape_to_ast(escape: Escape) -> RegexAst {
    match escape {
        Escape::Literal(c) => RegexAst::Literal(c),
        Escape::Class(class) => RegexAst::Class(class),
    }
}

fn negate(mut class: CharClass) -> CharClass {
    class.negated = !class.negated;
    class
}

/// Whether `ast` can match the empty string (used to reject nullable token
/// patterns at construction).
pub fn is_nullable(ast: &RegexAst) -> bool {
    match ast {
        RegexAst::Literal(_) | RegexAst::Class(_) | RegexAst::Any => false,
        RegexAst::Concat(parts) => parts.iter().all(is_nullable),
        RegexAst::Alternate(branches) => branches.iter().any(is_nullable),
        RegexAst::Repeat { node, min, .. } => *min == 0 || is_nullable(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_anchors() {
        assert!(parse("^a").is_err());
        assert!(parse("a$").is_err());
    }

    #[test]
    fn rejects_reluctant_quantifier() {
        assert!(parse("a*?").is_err());
    }

    #[test]
    fn rejects_backwards_bounds() {
        assert!(parse("a{3,1}").is_err());
    }

    #[test]
    fn rejects_unknown_letter_escape() {
        assert!(parse("\\q").is_err());
    }

    #[test]
    fn accepts_class_with_range_and_negation() {
        let ast = parse("[^a-z0-9]").unwrap();
        match ast {
            RegexAst::Class(class) => {
                assert!(class.negated);
                assert!(class.matches('A'));
                assert!(!class.matches('m'));
            }
            _ => panic!("expected a class"),
        }
    }

    #[test]
    fn digit_plus_is_not_nullable() {
        let ast = parse("[0-9]+").unwrap();
        assert!(!is_nullable(&ast));
    }

    #[test]
    fn star_is_nullable() {
        let ast = parse("a*").unwrap();
        assert!(is_nullable(&ast));
    }
}
