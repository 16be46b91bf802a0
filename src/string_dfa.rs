use crate::error::ParseError;
use crate::PatternId;
use std::io::Read;

type StateId = usize;

/// A single state of the trie: an optional terminal pattern, plus its
/// outgoing transitions kept as a flat array sorted by character and probed
/// with binary search (cache-friendlier than a tree of heap nodes, and
/// behaviorally identical to one).
#[derive(Debug, Default)]
struct DfaState {
    pattern: Option<PatternId>,
    transitions: Vec<(char, StateId)>,
}

impl DfaState {
    fn find(&self, ch: char) -> Option<StateId> {
        self.transitions
            .binary_search_by_key(&ch, |(c, _)| *c)
            .ok()
            .map(|i| self.transitions[i].1)
    }
}

/// Find the transition for `ch` from `state`, creating a fresh target state
/// if none exists yet. A free function over the state arena, rather than a
/// method taking a closure, so it never needs to borrow `self` twice.
fn find_or_create(states: &mut Vec<DfaState>, state: StateId, ch: char) -> StateId {
    match states[state].transitions.binary_search_by_key(&ch, |(c, _)| *c) {
        Ok(i) => states[state].transitions[i].1,
        Err(i) => {
            states.push(DfaState::default());
            let new_id = states.len() - 1;
            states[state].transitions.insert(i, (ch, new_id));
            new_id
        }
    }
}

/// A minimal DFA over a set of literal strings, keyed on characters.
///
/// Matching always starts from an implicit start state split into two
/// tiers: a 128-entry array indexed directly by an ASCII first character
/// (the fast path, avoiding a search for the common case), and a single
/// overflow root state used for any other first character, searched like
/// every other state via its sorted transition array.
///
/// A `StringDfa` instance is either case-sensitive or case-insensitive for
/// every string installed into it; a grammar with a mix of case-sensitive
/// and case-insensitive literals installs them into two separate instances
/// (see `Scanner`).
pub struct StringDfa {
    case_insensitive: bool,
    ascii_roots: Box<[Option<StateId>; 128]>,
    overflow_root: StateId,
    states: Vec<DfaState>,
}

impl StringDfa {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            case_insensitive,
            ascii_roots: Box::new([None; 128]),
            overflow_root: 0,
            states: vec![DfaState::default()],
        }
    }

    fn fold(&self, ch: char) -> char {
        if self.case_insensitive {
            ch.to_ascii_lowercase()
        } else {
            ch
        }
    }

    fn new_state(&mut self) -> StateId {
        self.states.push(DfaState::default());
        self.states.len() - 1
    }

    /// Install `text` as accepting `pattern`. If `text` is a proper prefix
    /// already present or shares a path with another installed string, an
    /// existing terminal at the final state is overwritten -- the last
    /// `add` for a given exact string wins (see design notes: this overwrite
    /// is deliberate, not a bug, but grammar authors should be warned about
    /// it at load time).
    pub fn add(&mut self, text: &str, pattern: PatternId) {
        let mut chars = text.chars();
        let first = match chars.next() {
            Some(c) => self.fold(c),
            None => return,
        };
        let mut current = if (first as u32) < 128 {
            match self.ascii_roots[first as usize] {
                Some(s) => s,
                None => {
                    self.states.push(DfaState::default());
                    let s = self.states.len() - 1;
                    self.ascii_roots[first as usize] = Some(s);
                    s
                }
            }
        } else {
            find_or_create(&mut self.states, self.overflow_root, first)
        };
        for raw in chars {
            let ch = self.fold(raw);
            current = find_or_create(&mut self.states, current, ch);
        }
        self.states[current].pattern = Some(pattern);
    }

    /// Whether a terminal state is already reachable for the exact string
    /// `text` (used to flag the overwrite-on-install ambiguity at grammar
    /// build time).
    pub fn has_terminal(&self, text: &str) -> bool {
        let mut chars = text.chars();
        let first = match chars.next() {
            Some(c) => self.fold(c),
            None => return false,
        };
        let mut current = if (first as u32) < 128 {
            match self.ascii_roots[first as usize] {
                Some(s) => s,
                None => return false,
            }
        } else {
            match self.states[self.overflow_root].find(first) {
                Some(s) => s,
                None => return false,
            }
        };
        for raw in chars {
            let ch = self.fold(raw);
            match self.states[current].find(ch) {
                Some(s) => current = s,
                None => return false,
            }
        }
        self.states[current].pattern.is_some()
    }

    /// Scan from the buffer's current position, consuming only via `peek`.
    /// Returns the longest match found (length, pattern id), or `None`.
    pub fn find_match<R: Read>(
        &self,
        buffer: &mut crate::char_buffer::CharBuffer<R>,
    ) -> Result<Option<(usize, PatternId)>, ParseError> {
        let first = match buffer.peek(0)? {
            Some(c) => c,
            None => return Ok(None),
        };
        let lookup = self.fold(first);
        let mut current = if (lookup as u32) < 128 {
            match self.ascii_roots[lookup as usize] {
                Some(s) => s,
                None => return Ok(None),
            }
        } else {
            match self.states[self.overflow_root].find(lookup) {
                Some(s) => s,
                None => return Ok(None),
            }
        };

        let mut offset = 1;
        let mut best = self.states[current]
            .pattern
            .map(|pattern| (offset, pattern));
        loop {
            let ch = match buffer.peek(offset)? {
                Some(c) => c,
                None => break,
            };
            let lookup = self.fold(ch);
            match self.states[current].find(lookup) {
                Some(next) => {
                    current = next;
                    offset += 1;
                    if let Some(pattern) = self.states[current].pattern {
                        best = Some((offset, pattern));
                    }
                }
                None => break,
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::char_buffer::CharBuffer;
    use std::io::Cursor;

    #[test]
    fn longest_match_wins_over_prefix() {
        let mut dfa = StringDfa::new(false);
        dfa.add("=", 1);
        dfa.add("==", 2);
        let mut buffer = CharBuffer::new(Cursor::new(b"===a".to_vec()));
        let (len, pattern) = dfa.find_match(&mut buffer).unwrap().unwrap();
        assert_eq!(len, 2);
        assert_eq!(pattern, 2);
    }

    #[test]
    fn last_install_wins_on_shared_terminal() {
        let mut dfa = StringDfa::new(false);
        dfa.add("if", 10);
        dfa.add("if", 20);
        let mut buffer = CharBuffer::new(Cursor::new(b"if".to_vec()));
        let (_, pattern) = dfa.find_match(&mut buffer).unwrap().unwrap();
        assert_eq!(pattern, 20);
    }

    #[test]
    fn case_insensitive_folds_before_descent() {
        let mut dfa = StringDfa::new(true);
        dfa.add("else", 1);
        let mut buffer = CharBuffer::new(Cursor::new(b"ELSE".to_vec()));
        let (len, pattern) = dfa.find_match(&mut buffer).unwrap().unwrap();
        assert_eq!(len, 4);
        assert_eq!(pattern, 1);
    }

    #[test]
    fn non_ascii_first_char_uses_overflow_root() {
        let mut dfa = StringDfa::new(false);
        dfa.add("\u{00e9}clair", 7);
        let mut buffer = CharBuffer::new(Cursor::new("\u{00e9}clair".as_bytes().to_vec()));
        let (len, pattern) = dfa.find_match(&mut buffer).unwrap().unwrap();
        assert_eq!(len, 6);
        assert_eq!(pattern, 7);
    }
}
