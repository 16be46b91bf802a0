use crate::error::ConstructionError;
use crate::lookahead::LookAheadSet;
use crate::regex_syntax;
use crate::PatternId;
use once_cell::unsync::OnceCell;
use std::collections::HashMap;

/// A count used as the "infinite" sentinel for `ProductionPatternElement::max`.
pub const UNBOUNDED: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LiteralString,
    RegularExpression,
}

/// Which matcher ultimately accepted a regular-expression token pattern's
/// text, recorded by the scanner at install time for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherKind {
    StringDfa,
    TokenNfa,
    GeneralRegex,
}

/// An immutable record describing one lexical token.
#[derive(Debug, Clone)]
pub struct TokenPattern {
    pub id: PatternId,
    pub name: String,
    pub kind: TokenKind,
    pub text: String,
    pub ignore: bool,
    pub error: Option<String>,
    pub case_insensitive: bool,
    matcher: OnceCell<MatcherKind>,
}

impl TokenPattern {
    pub fn literal(id: PatternId, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: TokenKind::LiteralString,
            text: text.into(),
            ignore: false,
            error: None,
            case_insensitive: false,
            matcher: OnceCell::new(),
        }
    }

    pub fn regex(id: PatternId, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: TokenKind::RegularExpression,
            text: text.into(),
            ignore: false,
            error: None,
            case_insensitive: false,
            matcher: OnceCell::new(),
        }
    }

    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn erroring(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn matcher(&self) -> Option<MatcherKind> {
        self.matcher.get().copied()
    }

    pub(crate) fn set_matcher(&self, kind: MatcherKind) {
        let _ = self.matcher.set(kind);
    }

    /// Construction-time validation: literal text must be non-empty; regex
    /// text must parse under the dialect and must not be nullable.
    fn validate(&self) -> Result<(), ConstructionError> {
        match self.kind {
            TokenKind::LiteralString => {
                if self.text.is_empty() {
                    return Err(ConstructionError::InvalidToken(format!(
                        "token '{}' has an empty literal pattern",
                        self.name
                    )));
                }
            }
            TokenKind::RegularExpression => {
                let ast = regex_syntax::parse(&self.text)?;
                if regex_syntax::is_nullable(&ast) {
                    return Err(ConstructionError::InvalidToken(format!(
                        "token '{}' pattern '{}' matches the empty string",
                        self.name, self.text
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One element of a production alternative: a reference to a token or
/// production pattern, repeated `min..max` times (`max == UNBOUNDED` means
/// unbounded repetition).
#[derive(Debug, Clone)]
pub struct ProductionPatternElement {
    pub is_token: bool,
    pub id: PatternId,
    pub min: u32,
    pub max: u32,
    look_ahead: OnceCell<LookAheadSet>,
}

impl ProductionPatternElement {
    pub fn new(is_token: bool, id: PatternId, min: u32, max: u32) -> Self {
        Self { is_token, id, min, max, look_ahead: OnceCell::new() }
    }

    pub fn is_optional(&self) -> bool {
        self.min == 0
    }

    pub fn is_repeated(&self) -> bool {
        self.max > 1
    }

    pub fn is_variable(&self) -> bool {
        self.min != self.max
    }

    pub fn look_ahead(&self) -> Option<&LookAheadSet> {
        self.look_ahead.get()
    }

    pub(crate) fn set_look_ahead(&self, set: LookAheadSet) {
        let _ = self.look_ahead.set(set);
    }
}

/// One right-hand-side alternative of a production: an ordered, non-empty
/// list of elements.
#[derive(Debug, Clone)]
pub struct ProductionPatternAlternative {
    pub elements: Vec<ProductionPatternElement>,
    look_ahead: OnceCell<LookAheadSet>,
}

impl ProductionPatternAlternative {
    pub fn new(elements: Vec<ProductionPatternElement>) -> Self {
        Self { elements, look_ahead: OnceCell::new() }
    }

    pub fn look_ahead(&self) -> Option<&LookAheadSet> {
        self.look_ahead.get()
    }

    pub(crate) fn set_look_ahead(&self, set: LookAheadSet) {
        let _ = self.look_ahead.set(set);
    }

    /// Whether every element could match nothing, i.e. this alternative can
    /// match the empty sequence entirely.
    pub fn is_empty_match(&self) -> bool {
        self.elements.iter().all(|e| e.min == 0)
    }
}

impl PartialEq for ProductionPatternAlternative {
    fn eq(&self, other: &Self) -> bool {
        self.elements.len() == other.elements.len()
            && self.elements.iter().zip(other.elements.iter()).all(|(a, b)| {
                a.is_token == b.is_token && a.id == b.id && a.min == b.min && a.max == b.max
            })
    }
}

/// A named, identified production with an ordered, non-empty list of
/// alternatives.
#[derive(Debug, Clone)]
pub struct ProductionPattern {
    pub id: PatternId,
    pub name: String,
    pub alternatives: Vec<ProductionPatternAlternative>,
    pub synthetic: bool,
    pub default_alternative: Option<usize>,
    look_ahead: OnceCell<LookAheadSet>,
}

impl ProductionPattern {
    pub fn new(id: PatternId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            alternatives: Vec::new(),
            synthetic: false,
            default_alternative: None,
            look_ahead: OnceCell::new(),
        }
    }

    pub fn look_ahead(&self) -> Option<&LookAheadSet> {
        self.look_ahead.get()
    }

    pub(crate) fn set_look_ahead(&self, set: LookAheadSet) {
        let _ = self.look_ahead.set(set);
    }
}

/// A lookup table keyed by `PatternId`. Uses a dense, offset array when ids
/// form a reasonably compact range (the common case, and cheap once ids are
/// normalized), falling back to a sparse map otherwise -- per the design
/// notes' preference for a dense vector with a sparse fallback over a single
/// hash map.
pub(crate) enum IdTable<T> {
    Dense { offset: PatternId, slots: Vec<Option<T>> },
    Sparse(HashMap<PatternId, T>),
}

impl<T> IdTable<T> {
    pub fn new() -> Self {
        IdTable::Sparse(HashMap::new())
    }

    pub fn insert(&mut self, id: PatternId, value: T) {
        match self {
            IdTable::Dense { offset, slots } => {
                if id < *offset || (id - *offset) as usize >= slots.len() {
                    self.densify_or_fallback(id);
                    self.insert(id, value);
                    return;
                }
                slots[(id - *offset) as usize] = Some(value);
            }
            IdTable::Sparse(map) => {
                map.insert(id, value);
                self.try_densify();
            }
        }
    }

    fn densify_or_fallback(&mut self, _incoming_id: PatternId) {
        // Growing a dense table in place is not attempted; fall back to a
        // sparse map, which can always accept the new id.
        if let IdTable::Dense { slots, offset } = std::mem::replace(self, IdTable::Sparse(HashMap::new())) {
            if let IdTable::Sparse(map) = self {
                for (i, slot) in slots.into_iter().enumerate() {
                    if let Some(v) = slot {
                        map.insert(offset + i as PatternId, v);
                    }
                }
            }
        }
    }

    fn try_densify(&mut self) {
        let (min, max, len) = match self {
            IdTable::Sparse(map) => {
                if map.is_empty() {
                    return;
                }
                let min = *map.keys().min().unwrap();
                let max = *map.keys().max().unwrap();
                (min, max, map.len())
            }
            IdTable::Dense { .. } => return,
        };
        let span = (max - min) as usize + 1;
        if span > 4 * len.max(1) || span > 4096 {
            return;
        }
        if let IdTable::Sparse(map) = std::mem::replace(self, IdTable::Sparse(HashMap::new())) {
            let mut slots: Vec<Option<T>> = (0..span).map(|_| None).collect();
            for (id, v) in map {
                slots[(id - min) as usize] = Some(v);
            }
            *self = IdTable::Dense { offset: min, slots };
        }
    }

    pub fn get(&self, id: PatternId) -> Option<&T> {
        match self {
            IdTable::Dense { offset, slots } => {
                if id < *offset {
                    return None;
                }
                slots.get((id - *offset) as usize).and_then(|s| s.as_ref())
            }
            IdTable::Sparse(map) => map.get(&id),
        }
    }

    pub fn contains(&self, id: PatternId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = (PatternId, &T)> + '_> {
        match self {
            IdTable::Dense { offset, slots } => Box::new(
                slots
                    .iter()
                    .enumerate()
                    .filter_map(move |(i, s)| s.as_ref().map(|v| (offset + i as PatternId, v))),
            ),
            IdTable::Sparse(map) => Box::new(map.iter().map(|(k, v)| (*k, v))),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IdTable::Dense { slots, .. } => slots.iter().filter(|s| s.is_some()).count(),
            IdTable::Sparse(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The complete grammar: token patterns, production patterns, and (after
/// `prepare`) their computed look-ahead sets.
pub struct Grammar {
    pub(crate) tokens: IdTable<TokenPattern>,
    pub(crate) productions: IdTable<ProductionPattern>,
    start: Option<PatternId>,
    prepared: bool,
}

impl Grammar {
    pub fn new() -> Self {
        Self {
            tokens: IdTable::new(),
            productions: IdTable::new(),
            start: None,
            prepared: false,
        }
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn start(&self) -> Option<PatternId> {
        self.start
    }

    pub fn set_start(&mut self, id: PatternId) {
        self.start = Some(id);
    }

    pub fn token(&self, id: PatternId) -> Option<&TokenPattern> {
        self.tokens.get(id)
    }

    pub fn production(&self, id: PatternId) -> Option<&ProductionPattern> {
        self.productions.get(id)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenPattern> {
        self.tokens.iter().map(|(_, t)| t)
    }

    fn id_in_use(&self, id: PatternId) -> bool {
        self.tokens.contains(id) || self.productions.contains(id)
    }

    /// Register a token pattern. Token ids and production ids share one id
    /// space and must be disjoint -- enforced here rather than merely
    /// documented.
    pub fn add_token_pattern(&mut self, pattern: TokenPattern) -> Result<(), ConstructionError> {
        if self.id_in_use(pattern.id) {
            return Err(ConstructionError::InvalidProduction(format!(
                "pattern id {} is already in use",
                pattern.id
            )));
        }
        pattern.validate()?;
        self.tokens.insert(pattern.id, pattern);
        Ok(())
    }

    pub fn add_production_pattern(&mut self, id: PatternId, name: impl Into<String>) -> Result<(), ConstructionError> {
        if self.id_in_use(id) {
            return Err(ConstructionError::InvalidProduction(format!(
                "pattern id {} is already in use",
                id
            )));
        }
        self.productions.insert(id, ProductionPattern::new(id, name));
        if self.start.is_none() {
            self.start = Some(id);
        }
        Ok(())
    }

    pub fn add_alternative(
        &mut self,
        production_id: PatternId,
        elements: Vec<ProductionPatternElement>,
    ) -> Result<usize, ConstructionError> {
        for element in &elements {
            if element.max != UNBOUNDED && element.max < element.min {
                return Err(ConstructionError::InvalidProduction(format!(
                    "element referencing {} has max {} less than min {}",
                    element.id, element.max, element.min
                )));
            }
            if element.min == 0 && element.max == 0 {
                return Err(ConstructionError::InvalidProduction(format!(
                    "element referencing {} has an empty {{0,0}} repetition",
                    element.id
                )));
            }
        }
        let production = self.productions.get(production_id).ok_or_else(|| {
            ConstructionError::InvalidProduction(format!("no production with id {}", production_id))
        })?;
        let _ = production;
        let alternative = ProductionPatternAlternative::new(elements);
        let production = self.production_mut(production_id)?;
        production.alternatives.push(alternative);
        Ok(production.alternatives.len() - 1)
    }

    pub fn mark_synthetic(&mut self, production_id: PatternId) -> Result<(), ConstructionError> {
        self.production_mut(production_id)?.synthetic = true;
        Ok(())
    }

    pub fn set_default_alternative(&mut self, production_id: PatternId, index: usize) -> Result<(), ConstructionError> {
        let production = self.production_mut(production_id)?;
        if index >= production.alternatives.len() {
            return Err(ConstructionError::InvalidProduction(format!(
                "production {} has no alternative {}",
                production.name, index
            )));
        }
        production.default_alternative = Some(index);
        Ok(())
    }

    fn production_mut(&mut self, id: PatternId) -> Result<&mut ProductionPattern, ConstructionError> {
        match &mut self.productions {
            IdTable::Dense { offset, slots } => slots
                .get_mut((id.wrapping_sub(*offset)) as usize)
                .and_then(|s| s.as_mut())
                .ok_or_else(|| ConstructionError::InvalidProduction(format!("no production with id {}", id))),
            IdTable::Sparse(map) => map
                .get_mut(&id)
                .ok_or_else(|| ConstructionError::InvalidProduction(format!("no production with id {}", id))),
        }
    }

    /// Validate completeness, left recursion and empty-match invariants,
    /// then run the look-ahead analysis. See `lookahead_analyzer::analyze`.
    pub fn prepare(&mut self) -> Result<(), ConstructionError> {
        if self.productions.is_empty() {
            return Err(ConstructionError::InvalidParser("grammar has no productions".into()));
        }
        self.check_structure()?;
        self.check_references()?;
        self.check_left_recursion()?;
        self.check_empty_match()?;
        crate::lookahead_analyzer::analyze(self)?;
        self.prepared = true;
        Ok(())
    }

    fn check_structure(&self) -> Result<(), ConstructionError> {
        for (_, production) in self.productions.iter() {
            if production.alternatives.is_empty() {
                return Err(ConstructionError::InvalidProduction(format!(
                    "production '{}' has no alternatives",
                    production.name
                )));
            }
            for (i, alt) in production.alternatives.iter().enumerate() {
                if alt.elements.is_empty() {
                    return Err(ConstructionError::InvalidProduction(format!(
                        "production '{}' alternative {} is empty",
                        production.name, i
                    )));
                }
                for (j, other) in production.alternatives.iter().enumerate() {
                    if i < j && alt == other {
                        return Err(ConstructionError::InvalidProduction(format!(
                            "production '{}' has duplicate alternatives {} and {}",
                            production.name, i, j
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_references(&self) -> Result<(), ConstructionError> {
        for (_, production) in self.productions.iter() {
            for alt in &production.alternatives {
                for element in &alt.elements {
                    let resolves = if element.is_token {
                        self.tokens.contains(element.id)
                    } else {
                        self.productions.contains(element.id)
                    };
                    if !resolves {
                        return Err(ConstructionError::InvalidProduction(format!(
                            "production '{}' references undefined {} {}",
                            production.name,
                            if element.is_token { "token" } else { "production" },
                            element.id
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_left_recursion(&self) -> Result<(), ConstructionError> {
        for (id, production) in self.productions.iter() {
            let mut visiting = std::collections::HashSet::new();
            if self.reaches_left_recursively(id, production, &mut visiting) {
                return Err(ConstructionError::InvalidProduction(format!(
                    "production '{}' is left recursive",
                    production.name
                )));
            }
        }
        Ok(())
    }

    fn reaches_left_recursively(
        &self,
        start_id: PatternId,
        production: &ProductionPattern,
        visiting: &mut std::collections::HashSet<PatternId>,
    ) -> bool {
        if !visiting.insert(production.id) {
            return production.id == start_id;
        }
        for alt in &production.alternatives {
            for element in &alt.elements {
                if element.is_token {
                    // A mandatory leading token stops the left-recursion
                    // chase for this alternative; an optional one can match
                    // zero times, so the chase must continue into whatever
                    // follows it.
                    if element.min > 0 {
                        break;
                    }
                    continue;
                }
                if element.id == start_id {
                    return true;
                }
                if let Some(next) = self.productions.get(element.id) {
                    if self.reaches_left_recursively(start_id, next, visiting) {
                        return true;
                    }
                }
                if element.min > 0 {
                    break;
                }
            }
        }
        false
    }

    fn check_empty_match(&self) -> Result<(), ConstructionError> {
        for (_, production) in self.productions.iter() {
            for (i, alt) in production.alternatives.iter().enumerate() {
                if alt.is_empty_match() {
                    return Err(ConstructionError::InvalidProduction(format!(
                        "production '{}' alternative {} matches the empty sequence",
                        production.name, i
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_ids_across_namespaces() {
        let mut grammar = Grammar::new();
        grammar.add_token_pattern(TokenPattern::literal(1, "PLUS", "+")).unwrap();
        let err = grammar.add_production_pattern(1, "expr").unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidProduction(_)));
    }

    #[test]
    fn rejects_zero_zero_repetition() {
        let mut grammar = Grammar::new();
        grammar.add_token_pattern(TokenPattern::literal(1, "A", "a")).unwrap();
        grammar.add_production_pattern(2, "root").unwrap();
        let err = grammar
            .add_alternative(2, vec![ProductionPatternElement::new(true, 1, 0, 0)])
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidProduction(_)));
    }

    #[test]
    fn rejects_empty_grammar() {
        let mut grammar = Grammar::new();
        let err = grammar.prepare().unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidParser(_)));
    }

    #[test]
    fn rejects_left_recursion() {
        let mut grammar = Grammar::new();
        grammar.add_token_pattern(TokenPattern::literal(1, "A", "a")).unwrap();
        grammar.add_production_pattern(2, "expr").unwrap();
        grammar
            .add_alternative(2, vec![ProductionPatternElement::new(false, 2, 1, 1)])
            .unwrap();
        let err = grammar.prepare().unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidProduction(_)));
    }

    #[test]
    fn rejects_left_recursion_through_an_optional_leading_token() {
        // P -> T? P -- T can match zero times, so the reference to P is
        // still reachable without consuming a token.
        let mut grammar = Grammar::new();
        grammar.add_token_pattern(TokenPattern::literal(1, "T", "t")).unwrap();
        grammar.add_production_pattern(2, "p").unwrap();
        grammar
            .add_alternative(
                2,
                vec![
                    ProductionPatternElement::new(true, 1, 0, 1),
                    ProductionPatternElement::new(false, 2, 1, 1),
                ],
            )
            .unwrap();
        let err = grammar.prepare().unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidProduction(_)));
    }
}
