use crate::char_buffer::CharBuffer;
use crate::error::{ConstructionError, ParseError, ParseErrorLog};
use crate::grammar::{Grammar, ProductionPattern, ProductionPatternAlternative, ProductionPatternElement, UNBOUNDED};
use crate::scanner::{ScannedToken, Scanner};
use crate::tree::{NodeId, Tree};
use crate::PatternId;
use std::io::Read;

/// Maximum number of tokens a single panic-mode recovery attempt will skip
/// before giving up on resynchronizing, to guarantee `parse` always
/// terminates even against pathologically broken input.
const MAX_RECOVERY_SKIP: usize = 256;

/// Callback interface invoked around production parsing, used to observe or
/// instrument a parse without modifying the driver itself. The default
/// `Identity` implementation does nothing.
pub trait AnalyzerHooks {
    fn enter_production(&mut self, _id: PatternId, _name: &str) {}
    fn exit_production(&mut self, _id: PatternId, _name: &str, _node: NodeId) {}
    fn on_token(&mut self, _token: &ScannedToken) {}
}

/// The no-op `AnalyzerHooks` implementation used when a caller doesn't need
/// to observe the parse.
pub struct Identity;
impl AnalyzerHooks for Identity {}

/// Drives a recursive-descent parse of a prepared grammar over a character
/// stream: a peek buffer of upcoming tokens, production selection by
/// look-ahead, bottom-up tree construction with synthetic-production
/// flattening, and panic-mode error recovery that accumulates diagnostics
/// instead of aborting at the first one.
pub struct ParseDriver<'g, R: Read, H: AnalyzerHooks = Identity> {
    grammar: &'g Grammar,
    scanner: Scanner,
    buffer: CharBuffer<R>,
    peeked: Vec<ScannedToken>,
    eof: bool,
    tree: Tree,
    errors: ParseErrorLog,
    hooks: H,
    /// Cascade-damping counter: `-1` means not recovering. A freshly logged
    /// error sets this to `3`; every token subsequently consumed decrements
    /// it back toward `-1`. While it is `>= 0`, hook callbacks are
    /// suppressed and further errors are swallowed rather than logged, so a
    /// single syntax mistake doesn't flood the log with knock-on diagnostics.
    recovery: i32,
}

impl<'g, R: Read> ParseDriver<'g, R, Identity> {
    pub fn new(grammar: &'g Grammar, source: R) -> Result<Self, ConstructionError> {
        Self::with_hooks(grammar, source, Identity)
    }
}

impl<'g, R: Read, H: AnalyzerHooks> ParseDriver<'g, R, H> {
    pub fn with_hooks(grammar: &'g Grammar, source: R, hooks: H) -> Result<Self, ConstructionError> {
        if !grammar.is_prepared() {
            return Err(ConstructionError::InvalidParser(
                "grammar must be prepared before a parse driver can be built".into(),
            ));
        }
        let scanner = Scanner::build(grammar)?;
        Ok(Self {
            grammar,
            scanner,
            buffer: CharBuffer::new(source),
            peeked: Vec::new(),
            eof: false,
            tree: Tree::new(),
            errors: ParseErrorLog::new(),
            hooks,
            recovery: -1,
        })
    }

    /// Log `err` unless a cascade is already being damped, and (re)arm the
    /// recovery counter so subsequent errors are swallowed until enough
    /// tokens have been consumed cleanly.
    fn note_error(&mut self, err: ParseError) {
        if self.recovery < 0 {
            self.errors.push(err);
            self.recovery = 3;
        }
    }

    /// Parse the grammar's start production to completion. Returns the
    /// built tree and its root node even when diagnostics were recovered
    /// from; the caller decides whether a non-empty `ParseErrorLog` is
    /// fatal.
    pub fn parse(mut self) -> Result<(Tree, NodeId), ParseErrorLog> {
        let start_id = match self.grammar.start() {
            Some(id) => id,
            None => {
                let mut log = ParseErrorLog::new();
                log.push(ParseError::analysis(crate::position::Position::origin(), "grammar has no start production"));
                return Err(log);
            }
        };
        let production = self.grammar.production(start_id).expect("start production must exist");
        let result = self.parse_production(start_id, production);
        match result {
            Ok(root) => {
                if let Some(token) = self.peek(0).ok().flatten().cloned() {
                    let name = self.scanner.token_name(token.pattern).to_string();
                    self.note_error(ParseError::unexpected_token(token.start, name, vec!["end of input".to_string()]));
                }
                if self.errors.is_empty() {
                    Ok((self.tree, root))
                } else {
                    Err(self.errors)
                }
            }
            Err(err) => {
                self.note_error(err);
                Err(self.errors)
            }
        }
    }

    fn peek(&mut self, offset: usize) -> Result<Option<&ScannedToken>, ParseError> {
        while self.peeked.len() <= offset && !self.eof {
            match self.scanner.next(&mut self.buffer)? {
                Some(token) => {
                    if self.recovery < 0 {
                        self.hooks.on_token(&token);
                    }
                    self.peeked.push(token);
                }
                None => self.eof = true,
            }
        }
        Ok(self.peeked.get(offset))
    }

    fn peek_id(&mut self, offset: usize) -> Result<Option<PatternId>, ParseError> {
        Ok(self.peek(offset)?.map(|t| t.pattern))
    }

    fn bump(&mut self) -> Result<ScannedToken, ParseError> {
        self.peek(0)?;
        if self.peeked.is_empty() {
            let position = self.buffer.mark();
            return Err(ParseError::unexpected_eof(position));
        }
        let token = self.peeked.remove(0);
        if self.recovery >= 0 {
            self.recovery -= 1;
        }
        Ok(token)
    }

    fn peeked_window(&mut self, len: usize) -> Result<Vec<PatternId>, ParseError> {
        let mut window = Vec::with_capacity(len);
        for i in 0..len {
            match self.peek_id(i)? {
                Some(id) => window.push(id),
                None => break,
            }
        }
        Ok(window)
    }

    fn parse_production(&mut self, id: PatternId, production: &ProductionPattern) -> Result<NodeId, ParseError> {
        if self.recovery < 0 {
            self.hooks.enter_production(id, &production.name);
        }
        let start = self.current_position()?;
        crate::util::logger::log_production_enter(&production.name, start);

        let chosen = self.select_alternative(production)?;
        let alt = &production.alternatives[chosen];
        let children = self.parse_alternative(alt)?;
        let (span_start, span_end) = self.tree.aggregate_span(&children, start);
        let node = self.tree.alloc_production(id, production.name.clone(), span_start, span_end);
        for child in children {
            self.tree.attach_child(node, child);
        }
        crate::util::logger::log_production_exit(&production.name);
        if self.recovery < 0 {
            self.hooks.exit_production(id, &production.name, node);
        }
        Ok(node)
    }

    fn current_position(&mut self) -> Result<crate::position::Position, ParseError> {
        match self.peek(0)? {
            Some(token) => Ok(token.start),
            None => Ok(self.buffer.mark()),
        }
    }

    /// Choose which alternative of `production` to parse by testing the
    /// peeked token window against each alternative's computed look-ahead
    /// set, preferring the default alternative on a tie.
    fn select_alternative(&mut self, production: &ProductionPattern) -> Result<usize, ParseError> {
        let max_len = production
            .alternatives
            .iter()
            .map(|a| a.look_ahead().map(|s| s.max_length()).unwrap_or(1))
            .max()
            .unwrap_or(1)
            .max(1);
        let window = self.peeked_window(max_len)?;

        let mut matches = Vec::new();
        for (i, alt) in production.alternatives.iter().enumerate() {
            let is_match = match alt.look_ahead() {
                Some(set) => set.is_next(&window) || (window.is_empty() && set.contains_empty()),
                None => false,
            };
            if is_match {
                matches.push(i);
            }
        }

        if let Some(&chosen) = matches.first() {
            if matches.len() > 1 {
                if let Some(default) = production.default_alternative {
                    if matches.contains(&default) {
                        return Ok(default);
                    }
                }
            }
            return Ok(chosen);
        }

        if let Some(default) = production.default_alternative {
            return Ok(default);
        }

        let position = self.current_position()?;
        let expected: Vec<String> = production
            .alternatives
            .iter()
            .filter_map(|a| a.look_ahead())
            .flat_map(|s| s.initial_tokens())
            .map(|id| self.scanner.token_name(id).to_string())
            .collect();
        let found = match self.peek(0)? {
            Some(token) => self.scanner.token_name(token.pattern).to_string(),
            None => "end of input".to_string(),
        };
        Err(ParseError::unexpected_token(position, found, expected))
    }

    fn parse_alternative(&mut self, alt: &ProductionPatternAlternative) -> Result<Vec<NodeId>, ParseError> {
        let mut children = Vec::new();
        for element in &alt.elements {
            match self.parse_element(element) {
                Ok(mut nodes) => children.append(&mut nodes),
                Err(err) => {
                    self.note_error(err);
                    self.recover(element, &mut children)?;
                }
            }
        }
        Ok(children)
    }

    /// Parse one occurrence-count's worth of `element`: the minimum
    /// mandatory repetitions, then as many more as the peeked tokens still
    /// satisfy the element's own look-ahead (capped at `element.max`).
    fn parse_element(&mut self, element: &ProductionPatternElement) -> Result<Vec<NodeId>, ParseError> {
        let mut nodes = Vec::new();
        let mut count: u32 = 0;
        loop {
            if element.max != UNBOUNDED && count >= element.max {
                break;
            }
            if count >= element.min {
                if !self.element_matches_next(element)? {
                    break;
                }
            }
            let occurrence = self.parse_occurrence(element)?;
            nodes.extend(occurrence);
            count += 1;
        }
        if count < element.min {
            let position = self.current_position()?;
            let expected = self.element_expected_names(element);
            let found = match self.peek(0)? {
                Some(token) => self.scanner.token_name(token.pattern).to_string(),
                None => "end of input".to_string(),
            };
            return Err(ParseError::unexpected_token(position, found, expected));
        }
        Ok(nodes)
    }

    fn element_expected_names(&mut self, element: &ProductionPatternElement) -> Vec<String> {
        match element.look_ahead() {
            Some(set) => set.initial_tokens().into_iter().map(|id| self.scanner.token_name(id).to_string()).collect(),
            None if element.is_token => vec![self.scanner.token_name(element.id).to_string()],
            None => Vec::new(),
        }
    }

    fn element_matches_next(&mut self, element: &ProductionPatternElement) -> Result<bool, ParseError> {
        let set = match element.look_ahead() {
            Some(set) => set,
            None => return Ok(false),
        };
        let window = self.peeked_window(set.max_length().max(1))?;
        Ok(set.is_next(&window))
    }

    fn parse_occurrence(&mut self, element: &ProductionPatternElement) -> Result<Vec<NodeId>, ParseError> {
        if element.is_token {
            let token = self.bump()?;
            if token.pattern != element.id {
                let expected = vec![self.scanner.token_name(element.id).to_string()];
                return Err(ParseError::unexpected_token(token.start, self.scanner.token_name(token.pattern).to_string(), expected));
            }
            let node = self.tree.alloc_token(
                token.pattern,
                self.scanner.token_name(token.pattern).to_string(),
                token.start,
                token.end,
                token.text,
            );
            Ok(vec![node])
        } else {
            let production = self.grammar.production(element.id).ok_or_else(|| {
                ParseError::analysis(self.buffer.mark(), format!("unresolved production reference {}", element.id))
            })?;
            let node = self.parse_production(element.id, production)?;
            if production.synthetic {
                let children = self.tree.node(node).children().to_vec();
                Ok(children)
            } else {
                Ok(vec![node])
            }
        }
    }

    /// Panic-mode recovery: skip tokens until one matches what could
    /// legally follow here (the failed element's own look-ahead, allowing a
    /// retry), or we exhaust `MAX_RECOVERY_SKIP` tokens / reach end of
    /// input, in which case recovery gives up silently and parsing
    /// continues with whatever was already built.
    fn recover(&mut self, element: &ProductionPatternElement, children: &mut Vec<NodeId>) -> Result<(), ParseError> {
        let mut skipped = 0;
        while skipped < MAX_RECOVERY_SKIP {
            if self.element_matches_next(element)? {
                let position = self.current_position()?;
                crate::util::logger::log_recovery(position, skipped);
                if let Ok(mut nodes) = self.parse_element(element) {
                    children.append(&mut nodes);
                }
                return Ok(());
            }
            if self.peek(0)?.is_none() {
                return Ok(());
            }
            self.bump()?;
            skipped += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::TokenPattern;
    use std::io::Cursor;

    fn build_grammar() -> Grammar {
        let mut grammar = Grammar::new();
        grammar.add_token_pattern(TokenPattern::literal(1, "PLUS", "+")).unwrap();
        grammar.add_token_pattern(TokenPattern::regex(2, "NUMBER", "[0-9]+")).unwrap();
        grammar.add_production_pattern(3, "sum").unwrap();
        grammar
            .add_alternative(
                3,
                vec![
                    ProductionPatternElement::new(true, 2, 1, 1),
                    ProductionPatternElement::new(true, 1, 0, UNBOUNDED),
                ],
            )
            .unwrap();
        grammar.prepare().unwrap();
        grammar
    }

    #[test]
    fn parses_a_number_followed_by_repeated_pluses() {
        let grammar = build_grammar();
        let driver = ParseDriver::new(&grammar, Cursor::new(b"1+++".to_vec())).unwrap();
        let (tree, root) = driver.parse().unwrap();
        assert_eq!(tree.node(root).children().len(), 4);
    }

    #[test]
    fn missing_required_token_is_reported() {
        let grammar = build_grammar();
        let driver = ParseDriver::new(&grammar, Cursor::new(b"+2".to_vec())).unwrap();
        let err = driver.parse().unwrap_err();
        assert!(!err.is_empty());
    }

    fn build_trip_grammar() -> Grammar {
        let mut grammar = Grammar::new();
        grammar.add_token_pattern(TokenPattern::literal(1, "A", "a")).unwrap();
        grammar.add_token_pattern(TokenPattern::literal(2, "B", "b")).unwrap();
        grammar.add_token_pattern(TokenPattern::literal(3, "C", "c")).unwrap();
        grammar.add_token_pattern(TokenPattern::regex(4, "WS", "[ ]+").ignored()).unwrap();
        grammar.add_production_pattern(5, "trip").unwrap();
        grammar
            .add_alternative(
                5,
                vec![
                    ProductionPatternElement::new(true, 1, 1, 1),
                    ProductionPatternElement::new(true, 2, 1, 1),
                    ProductionPatternElement::new(true, 3, 1, 1),
                ],
            )
            .unwrap();
        grammar.prepare().unwrap();
        grammar
    }

    #[test]
    fn back_to_back_mismatches_only_log_the_first_error() {
        // "a c a" matches A, then finds "c" where B is required (first
        // error, logged), then runs out of input while recovering and
        // finally fails to find C too (second error). The second failure
        // falls inside the damping window opened by the first and must be
        // swallowed rather than logged again.
        let grammar = build_trip_grammar();
        let driver = ParseDriver::new(&grammar, Cursor::new(b"a c a".to_vec())).unwrap();
        let err = driver.parse().unwrap_err();
        assert_eq!(err.len(), 1);
    }

    #[derive(Default, Clone)]
    struct SharedCounts {
        enters: std::rc::Rc<std::cell::Cell<u32>>,
        tokens: std::rc::Rc<std::cell::Cell<u32>>,
    }

    struct CountingHooks(SharedCounts);

    impl AnalyzerHooks for CountingHooks {
        fn enter_production(&mut self, _id: PatternId, _name: &str) {
            self.0.enters.set(self.0.enters.get() + 1);
        }
        fn on_token(&mut self, _token: &ScannedToken) {
            self.0.tokens.set(self.0.tokens.get() + 1);
        }
    }

    #[test]
    fn token_hook_is_suppressed_for_tokens_peeked_while_recovering() {
        // Three tokens are scanned ("a", "c", "a"), but the third is only
        // ever peeked by `recover`'s resynchronization attempt, which runs
        // after the first error has armed the recovery counter -- its
        // `on_token` dispatch must be suppressed, so only 2 of the 3 scanned
        // tokens are ever reported to the hook.
        let grammar = build_trip_grammar();
        let counts = SharedCounts::default();
        let driver = ParseDriver::with_hooks(&grammar, Cursor::new(b"a c a".to_vec()), CountingHooks(counts.clone())).unwrap();
        let _ = driver.parse();
        assert_eq!(counts.tokens.get(), 2);
    }

    #[test]
    fn hooks_fire_normally_on_a_clean_parse() {
        let grammar = build_trip_grammar();
        let counts = SharedCounts::default();
        let driver = ParseDriver::with_hooks(&grammar, Cursor::new(b"a b c".to_vec()), CountingHooks(counts.clone())).unwrap();
        let (_, _) = driver.parse().unwrap();
        assert_eq!(counts.enters.get(), 1);
        assert_eq!(counts.tokens.get(), 3);
    }
}
