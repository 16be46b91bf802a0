use crate::char_buffer::CharBuffer;
use crate::error::ParseError;
use crate::regex_syntax::{dot_class, CharClass, RegexAst};
use std::io::Read;

/// How many candidate lengths a single concatenation/alternation level will
/// enumerate before giving up on finding further, shorter matches. The
/// general matcher is a fallback path exercised only for patterns the
/// compact NFA rejects, so bounding the search keeps pathological patterns
/// from enumerating unboundedly many skip combinations.
const MAX_CANDIDATES: usize = 256;

/// A recursive regex element tree mirroring `RegexAst`, used as the fallback
/// matcher when the compact NFA rejects a pattern's dialect usage. Every
/// node exposes `try_match(buffer, offset, skip)`, returning the length of
/// the `skip`-th longest match starting `offset` characters into the
/// buffer's current position, or `None` once `skip` exhausts the candidates.
#[derive(Debug, Clone)]
pub enum GeneralElement {
    Literal(char),
    Class(CharClass),
    Any,
    Concat(Vec<GeneralElement>),
    Alternate(Vec<GeneralElement>),
    Repeat { elem: Box<GeneralElement>, min: u32, max: Option<u32> },
}

impl GeneralElement {
    pub fn from_ast(ast: &RegexAst) -> GeneralElement {
        match ast {
            RegexAst::Literal(c) => GeneralElement::Literal(*c),
            RegexAst::Class(class) => GeneralElement::Class(class.clone()),
            RegexAst::Any => GeneralElement::Any,
            RegexAst::Concat(parts) => GeneralElement::Concat(parts.iter().map(GeneralElement::from_ast).collect()),
            RegexAst::Alternate(branches) => {
                GeneralElement::Alternate(branches.iter().map(GeneralElement::from_ast).collect())
            }
            RegexAst::Repeat { node, min, max } => GeneralElement::Repeat {
                elem: Box::new(GeneralElement::from_ast(node)),
                min: *min,
                max: *max,
            },
        }
    }

    pub fn try_match<R: Read>(
        &self,
        buffer: &mut CharBuffer<R>,
        offset: usize,
        skip: usize,
    ) -> Result<Option<usize>, ParseError> {
        match self {
            GeneralElement::Literal(c) => {
                if skip > 0 {
                    return Ok(None);
                }
                Ok(match buffer.peek(offset)? {
                    Some(ch) if ch == *c => Some(1),
                    _ => None,
                })
            }
            GeneralElement::Class(class) => {
                if skip > 0 {
                    return Ok(None);
                }
                Ok(match buffer.peek(offset)? {
                    Some(ch) if class.matches(ch) => Some(1),
                    _ => None,
                })
            }
            GeneralElement::Any => {
                if skip > 0 {
                    return Ok(None);
                }
                Ok(match buffer.peek(offset)? {
                    Some(ch) if dot_class().matches(ch) => Some(1),
                    _ => None,
                })
            }
            GeneralElement::Concat(parts) => self.match_concat(parts, buffer, offset, skip),
            GeneralElement::Alternate(branches) => self.match_alternate(branches, buffer, offset, skip),
            GeneralElement::Repeat { elem, min, max } => self.match_repeat(elem, *min, *max, buffer, offset, skip),
        }
    }

    fn match_concat<R: Read>(
        &self,
        parts: &[GeneralElement],
        buffer: &mut CharBuffer<R>,
        offset: usize,
        skip: usize,
    ) -> Result<Option<usize>, ParseError> {
        let Some((first, rest)) = parts.split_first() else {
            return Ok(if skip == 0 { Some(0) } else { None });
        };
        let mut totals = Vec::new();
        for first_skip in 0..MAX_CANDIDATES {
            let Some(first_len) = first.try_match(buffer, offset, first_skip)? else { break };
            for rest_skip in 0..MAX_CANDIDATES {
                match GeneralElement::Concat(rest.to_vec()).try_match(buffer, offset + first_len, rest_skip)? {
                    Some(rest_len) => totals.push(first_len + rest_len),
                    None => break,
                }
            }
            if totals.len() >= MAX_CANDIDATES {
                break;
            }
        }
        totals.sort_unstable_by(|a, b| b.cmp(a));
        totals.dedup();
        Ok(totals.get(skip).copied())
    }

    fn match_alternate<R: Read>(
        &self,
        branches: &[GeneralElement],
        buffer: &mut CharBuffer<R>,
        offset: usize,
        skip: usize,
    ) -> Result<Option<usize>, ParseError> {
        let mut totals = Vec::new();
        for branch in branches {
            for branch_skip in 0..MAX_CANDIDATES {
                match branch.try_match(buffer, offset, branch_skip)? {
                    Some(len) => totals.push(len),
                    None => break,
                }
            }
        }
        totals.sort_unstable_by(|a, b| b.cmp(a));
        totals.dedup();
        Ok(totals.get(skip).copied())
    }

    fn match_repeat<R: Read>(
        &self,
        elem: &GeneralElement,
        min: u32,
        max: Option<u32>,
        buffer: &mut CharBuffer<R>,
        offset: usize,
        skip: usize,
    ) -> Result<Option<usize>, ParseError> {
        let cap = max.unwrap_or(u32::MAX).min(MAX_CANDIDATES as u32);
        let mut lengths = vec![0usize];
        let mut total = 0usize;
        let mut count = 0u32;
        while count < cap {
            match elem.try_match(buffer, offset + total, 0)? {
                Some(len) if len > 0 => {
                    total += len;
                    count += 1;
                    lengths.push(total);
                }
                _ => break,
            }
        }
        if (count as usize) < skip {
            return Ok(None);
        }
        let reps = count as usize - skip;
        if (reps as u32) < min {
            return Ok(None);
        }
        Ok(Some(lengths[reps]))
    }
}

/// Find the longest match for `elem` at the buffer's current position.
pub fn find_longest<R: Read>(elem: &GeneralElement, buffer: &mut CharBuffer<R>) -> Result<Option<usize>, ParseError> {
    elem.try_match(buffer, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex_syntax::parse;
    use std::io::Cursor;

    fn longest(pattern: &str, input: &str) -> Option<usize> {
        let ast = parse(pattern).unwrap();
        let elem = GeneralElement::from_ast(&ast);
        let mut buffer = CharBuffer::new(Cursor::new(input.as_bytes().to_vec()));
        find_longest(&elem, &mut buffer).unwrap()
    }

    #[test]
    fn matches_escaped_dot_alternative() {
        // (\\.)|.  -- either an escaped-anything pair, or any single char.
        assert_eq!(longest(r"(\\.)|.", "a"), Some(1));
        assert_eq!(longest(r"(\\.)|.", "\\n"), Some(2));
    }

    #[test]
    fn repetition_picks_longest_first() {
        assert_eq!(longest("a+", "aaab"), Some(3));
    }

    #[test]
    fn concatenation_backtracks_across_boundary() {
        assert_eq!(longest("a+a", "aaaa"), Some(4));
    }
}
