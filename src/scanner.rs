use crate::char_buffer::CharBuffer;
use crate::error::{ConstructionError, ParseError};
use crate::grammar::{Grammar, MatcherKind, TokenKind};
use crate::position::Position;
use crate::regex_matcher::GeneralElement;
use crate::regex_syntax;
use crate::string_dfa::StringDfa;
use crate::token_nfa::TokenNfa;
use crate::PatternId;
use std::io::Read;

/// Index into a `Scanner`'s token-list arena, used for the `prev`/`next`
/// chain linking every emitted token (including ignored ones) when
/// token-list mode is enabled.
pub type TokenId = usize;

/// A single token produced by the scanner: which pattern matched, the exact
/// text consumed, and its position span. Ignored tokens (e.g. whitespace)
/// are consumed from the stream but never returned as the *result* of
/// `next`; when token-list mode is enabled they are still recorded in the
/// scanner's token list and linked in via `prev`/`next`.
#[derive(Debug, Clone)]
pub struct ScannedToken {
    pub pattern: PatternId,
    pub text: String,
    pub start: Position,
    pub end: Position,
    /// This token's own position in the token-list arena, when token-list
    /// mode is enabled.
    pub id: Option<TokenId>,
    /// The previously emitted token (including ignored ones), when
    /// token-list mode is enabled.
    pub prev: Option<TokenId>,
    /// The next emitted token (including ignored ones), when token-list
    /// mode is enabled. Filled in once that token is scanned.
    pub next: Option<TokenId>,
}

struct TokenMeta {
    name: String,
    ignore: bool,
    error: Option<String>,
}

/// Turns a character stream into a token stream by maximal munch: at every
/// position, every installed matcher is tried, the longest match wins, and
/// ties are broken by the lowest pattern id.
///
/// Three matcher tiers back this, in the order they're consulted:
/// literal strings via two `StringDfa` tries (case-sensitive and
/// case-insensitive, since a single trie can only fold one way), compact
/// patterns via `TokenNfa`, and patterns whose dialect usage overflowed the
/// NFA's state budget via the general backtracking `GeneralElement`
/// matcher.
pub struct Scanner {
    literal_dfa: StringDfa,
    literal_dfa_ci: StringDfa,
    nfas: Vec<(PatternId, TokenNfa)>,
    general: Vec<(PatternId, GeneralElement)>,
    meta: std::collections::HashMap<PatternId, TokenMeta>,
    token_list: bool,
    list_arena: Vec<ScannedToken>,
    last_emitted: Option<TokenId>,
}

impl Scanner {
    /// Build a scanner from every token pattern registered on `grammar`,
    /// compiling each regular expression into the compact NFA and falling
    /// back to the general matcher when the dialect's state budget is
    /// exceeded. Token-list mode starts disabled; chain with
    /// `with_token_list_mode` to turn it on.
    pub fn build(grammar: &Grammar) -> Result<Scanner, ConstructionError> {
        let mut scanner = Scanner {
            literal_dfa: StringDfa::new(false),
            literal_dfa_ci: StringDfa::new(true),
            nfas: Vec::new(),
            general: Vec::new(),
            meta: std::collections::HashMap::new(),
            token_list: false,
            list_arena: Vec::new(),
            last_emitted: None,
        };
        for token in grammar.tokens() {
            scanner.add_pattern(token)?;
        }
        Ok(scanner)
    }

    /// Turn token-list mode on or off: while on, every token `next` scans
    /// (including ignored ones) is recorded in a `prev`/`next`-linked list
    /// retrievable via `token_list`, in addition to being returned normally
    /// (or skipped, if ignored) from `next` itself.
    pub fn with_token_list_mode(mut self, enabled: bool) -> Self {
        self.token_list = enabled;
        self
    }

    pub fn token_list_mode(&self) -> bool {
        self.token_list
    }

    fn add_pattern(&mut self, token: &crate::grammar::TokenPattern) -> Result<(), ConstructionError> {
        self.meta.insert(
            token.id,
            TokenMeta { name: token.name.clone(), ignore: token.ignore, error: token.error.clone() },
        );
        match token.kind {
            TokenKind::LiteralString => {
                if token.case_insensitive {
                    self.literal_dfa_ci.add(&token.text, token.id);
                } else {
                    self.literal_dfa.add(&token.text, token.id);
                }
                token.set_matcher(MatcherKind::StringDfa);
            }
            TokenKind::RegularExpression => {
                let ast = regex_syntax::parse(&token.text)?;
                match TokenNfa::compile(&ast) {
                    Ok(nfa) => {
                        self.nfas.push((token.id, nfa));
                        token.set_matcher(MatcherKind::TokenNfa);
                    }
                    Err(()) => {
                        self.general.push((token.id, GeneralElement::from_ast(&ast)));
                        token.set_matcher(MatcherKind::GeneralRegex);
                    }
                }
            }
        }
        Ok(())
    }

    fn name_of(&self, id: PatternId) -> &str {
        self.meta.get(&id).map(|m| m.name.as_str()).unwrap_or("<unknown>")
    }

    /// Consume and return the next significant token, skipping over any
    /// number of ignored tokens first. Returns `Ok(None)` at end of input.
    /// When token-list mode is on, every token scanned along the way
    /// (including ignored ones) is appended to the token-list arena and
    /// linked to the previously emitted one.
    pub fn next<R: Read>(&mut self, buffer: &mut CharBuffer<R>) -> Result<Option<ScannedToken>, ParseError> {
        loop {
            if buffer.peek(0)?.is_none() {
                return Ok(None);
            }
            let start = buffer.mark();
            let (len, pattern) = match self.longest_match(buffer)? {
                Some(found) => found,
                None => {
                    let ch = buffer.peek(0)?.unwrap();
                    return Err(ParseError::unexpected_char(start, ch));
                }
            };
            let text = buffer.read(len)?;
            let end = buffer.mark();
            let meta = self.meta.get(&pattern);
            if let Some(message) = meta.and_then(|m| m.error.as_ref()) {
                return Err(ParseError::invalid_token(start, message.clone()));
            }
            let ignore = meta.map(|m| m.ignore).unwrap_or(false);
            let mut token = ScannedToken { pattern, text, start, end, id: None, prev: None, next: None };
            if self.token_list {
                self.link_into_list(&mut token);
            }
            if ignore {
                continue;
            }
            crate::util::logger::log_token(self.name_of(pattern), &token.text, start);
            return Ok(Some(token));
        }
    }

    /// Append `token` to the token-list arena, wiring its `prev` to the
    /// previously emitted token and that token's `next` back to it.
    fn link_into_list(&mut self, token: &mut ScannedToken) {
        let id = self.list_arena.len();
        token.id = Some(id);
        token.prev = self.last_emitted;
        if let Some(prev) = self.last_emitted {
            self.list_arena[prev].next = Some(id);
        }
        self.list_arena.push(token.clone());
        self.last_emitted = Some(id);
    }

    /// The full token list recorded so far (including ignored tokens), in
    /// scan order. Empty unless token-list mode is enabled.
    pub fn token_list(&self) -> &[ScannedToken] {
        &self.list_arena
    }

    pub fn token_list_entry(&self, id: TokenId) -> Option<&ScannedToken> {
        self.list_arena.get(id)
    }

    /// The longest match across every matcher tier, tie-broken by the
    /// lowest pattern id -- a direct numeric comparison, not a proxy through
    /// declaration order, so the result is the same on every run regardless
    /// of which internal container (e.g. a `Sparse` `IdTable`'s `HashMap`)
    /// the grammar's token patterns happened to iterate through at build
    /// time.
    fn longest_match<R: Read>(&self, buffer: &mut CharBuffer<R>) -> Result<Option<(usize, PatternId)>, ParseError> {
        let mut best: Option<(usize, PatternId)> = None;
        let consider = |len: usize, pattern: PatternId, best: &mut Option<(usize, PatternId)>| {
            let better = match best {
                None => true,
                Some((best_len, best_pattern)) => len > *best_len || (len == *best_len && pattern < *best_pattern),
            };
            if better {
                *best = Some((len, pattern));
            }
        };

        if let Some((len, pattern)) = self.literal_dfa.find_match(buffer)? {
            consider(len, pattern, &mut best);
        }
        if let Some((len, pattern)) = self.literal_dfa_ci.find_match(buffer)? {
            consider(len, pattern, &mut best);
        }
        for (pattern, nfa) in &self.nfas {
            if let Some(len) = nfa.longest_match(buffer)? {
                consider(len, *pattern, &mut best);
            }
        }
        for (pattern, elem) in &self.general {
            if let Some(len) = crate::regex_matcher::find_longest(elem, buffer)? {
                consider(len, *pattern, &mut best);
            }
        }
        Ok(best)
    }

    /// Consume the whole stream into a vector of significant tokens. A
    /// convenience over repeated `next` calls for callers that don't need
    /// streaming.
    pub fn tokenize_all<R: Read>(&mut self, buffer: &mut CharBuffer<R>) -> Result<Vec<ScannedToken>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next(buffer)? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    pub fn token_name(&self, id: PatternId) -> &str {
        self.name_of(id)
    }
}
