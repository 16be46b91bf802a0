use crate::error::ConstructionError;
use crate::grammar::{Grammar, ProductionPattern, ProductionPatternElement};
use crate::lookahead::LookAheadSet;
use crate::PatternId;
use std::collections::HashMap;

/// Hard ceiling on how many tokens of look-ahead the analyzer will try
/// before giving up and reporting an inherent ambiguity. Grammars that need
/// more than this to disambiguate are almost always actually ambiguous.
const MAX_LOOKAHEAD: usize = 8;

struct Resolver<'g> {
    grammar: &'g Grammar,
    memo: HashMap<(PatternId, usize), LookAheadSet>,
    stack: Vec<(PatternId, usize)>,
}

/// Run the full look-ahead computation over `grammar`: for every production,
/// determine the minimal look-ahead depth (up to `MAX_LOOKAHEAD`) at which
/// its alternatives can be told apart, caching the resulting sets on each
/// production, alternative and element. Detects infinite recursion in the
/// look-ahead computation itself and inherent ambiguities that survive to
/// the depth cap.
pub fn analyze(grammar: &Grammar) -> Result<(), ConstructionError> {
    let mut resolver = Resolver { grammar, memo: HashMap::new(), stack: Vec::new() };
    for (id, production) in grammar.productions.iter() {
        resolver.resolve_production_final(id, production)?;
    }
    Ok(())
}

impl<'g> Resolver<'g> {
    /// Find the smallest depth at which `production`'s alternatives are
    /// pairwise distinguishable (or resolvable via its default alternative),
    /// then cache the final look-ahead sets on the production, each
    /// alternative, and each alternative's elements.
    fn resolve_production_final(
        &mut self,
        id: PatternId,
        production: &ProductionPattern,
    ) -> Result<(), ConstructionError> {
        if production.alternatives.len() == 1 {
            let set = self.first_k(&production.alternatives[0].elements, 1)?;
            self.cache_alternative(&production.alternatives[0], 1)?;
            production.set_look_ahead(set);
            return Ok(());
        }

        let mut depth = 1;
        loop {
            let sets: Vec<LookAheadSet> = production
                .alternatives
                .iter()
                .map(|alt| self.first_k(&alt.elements, depth))
                .collect::<Result<_, _>>()?;

            let conflicts = find_conflicts(&sets);
            let unresolved: Vec<(usize, usize)> = conflicts
                .into_iter()
                .filter(|&(a, b)| !resolved_by_default(production, a, b))
                .collect();

            if unresolved.is_empty() {
                for alt in &production.alternatives {
                    self.cache_alternative(alt, depth)?;
                }
                let mut combined = LookAheadSet::new();
                for set in &sets {
                    combined.union(set);
                }
                production.set_look_ahead(combined);
                return Ok(());
            }

            if depth >= MAX_LOOKAHEAD {
                let (a, b) = unresolved[0];
                if production.default_alternative.is_some() {
                    return Err(ConstructionError::InherentAmbiguity(format!(
                        "production '{}' alternatives {} and {} remain ambiguous at {} tokens of look-ahead even after applying the default alternative",
                        production.name, a, b, MAX_LOOKAHEAD
                    )));
                }
                return Err(ConstructionError::InherentAmbiguity(format!(
                    "production '{}' alternatives {} and {} cannot be distinguished within {} tokens of look-ahead; mark one as the default alternative or restructure the grammar",
                    production.name, a, b, MAX_LOOKAHEAD
                )));
            }
            depth += 1;
        }
    }

    fn cache_alternative(
        &mut self,
        alt: &crate::grammar::ProductionPatternAlternative,
        depth: usize,
    ) -> Result<(), ConstructionError> {
        let set = self.first_k(&alt.elements, depth)?;
        alt.set_look_ahead(set);
        let mut offset = 0usize;
        for element in &alt.elements {
            let remaining = depth.saturating_sub(offset);
            let elem_set = self.element_first_k(element, remaining.max(1))?;
            element.set_look_ahead(elem_set);
            offset += 1;
        }
        Ok(())
    }

    /// The look-ahead set for a sequence of elements at `depth` tokens:
    /// concatenate each element's own look-ahead onto every partial sequence
    /// accumulated so far, continuing past optional elements.
    fn first_k(
        &mut self,
        elements: &[ProductionPatternElement],
        depth: usize,
    ) -> Result<LookAheadSet, ConstructionError> {
        let mut partials: Vec<(Vec<PatternId>, bool)> = vec![(Vec::new(), false)];

        for element in elements {
            if partials.iter().all(|(seq, _)| seq.len() >= depth) {
                break;
            }
            let elem_set = self.element_first_k(element, depth)?;
            let mut next: Vec<(Vec<PatternId>, bool)> = Vec::new();
            for (prefix, prefix_rep) in &partials {
                if prefix.len() >= depth {
                    push_unique(&mut next, prefix.clone(), *prefix_rep);
                    continue;
                }
                let remaining = depth - prefix.len();
                for (seq, rep) in elem_set.sequences() {
                    let mut combined = prefix.clone();
                    combined.extend_from_slice(&seq[..seq.len().min(remaining)]);
                    push_unique(&mut next, combined, *prefix_rep || rep);
                }
                if element.min == 0 {
                    push_unique(&mut next, prefix.clone(), *prefix_rep);
                }
            }
            partials = next;
        }

        let mut result = LookAheadSet::new();
        for (seq, rep) in partials {
            result.add(seq, rep);
        }
        Ok(result)
    }

    fn element_first_k(
        &mut self,
        element: &ProductionPatternElement,
        depth: usize,
    ) -> Result<LookAheadSet, ConstructionError> {
        let mut base = if element.is_token {
            let mut set = LookAheadSet::new();
            set.add(vec![element.id], false);
            set
        } else {
            let production = self.grammar.production(element.id).ok_or_else(|| {
                ConstructionError::Internal(format!("unresolved production reference {}", element.id))
            })?;
            self.resolve(element.id, production, depth)?
        };

        if element.is_repeated() {
            base = base.create_repetitive();
        }
        // Note: an optional element's ability to be skipped is handled by
        // `first_k`'s explicit skip-prefix branch, not by widening this set
        // with an empty sequence -- this set doubles as the element's own
        // "should another occurrence be attempted" look-ahead, where an
        // empty entry would wrongly read as "yes" once input is exhausted.
        Ok(base.create_filter(depth))
    }

    /// Resolve a production's look-ahead set at a specific depth, with
    /// cycle detection for the rare case where the look-ahead computation
    /// itself would recurse without ever making progress.
    fn resolve(
        &mut self,
        id: PatternId,
        production: &ProductionPattern,
        depth: usize,
    ) -> Result<LookAheadSet, ConstructionError> {
        let key = (id, depth);
        if let Some(set) = self.memo.get(&key) {
            return Ok(set.clone());
        }
        if self.stack.contains(&key) {
            return Err(ConstructionError::InfiniteLoop(format!(
                "look-ahead computation for production '{}' at depth {} recurses into itself without consuming a token",
                production.name, depth
            )));
        }
        self.stack.push(key);
        let mut combined = LookAheadSet::new();
        for alt in &production.alternatives {
            let set = self.first_k(&alt.elements, depth)?;
            combined.union(&set);
        }
        self.stack.pop();
        self.memo.insert(key, combined.clone());
        Ok(combined)
    }
}

fn push_unique(list: &mut Vec<(Vec<PatternId>, bool)>, seq: Vec<PatternId>, rep: bool) {
    for (existing, existing_rep) in list.iter_mut() {
        if *existing == seq {
            *existing_rep |= rep;
            return;
        }
    }
    list.push((seq, rep));
}

/// Pairwise indices of alternatives whose look-ahead sets overlap.
fn find_conflicts(sets: &[LookAheadSet]) -> Vec<(usize, usize)> {
    let mut conflicts = Vec::new();
    for a in 0..sets.len() {
        for b in (a + 1)..sets.len() {
            if sets[a].intersects(&sets[b]) {
                conflicts.push((a, b));
            }
        }
    }
    conflicts
}

/// A conflict between `a` and `b` is considered resolved if the production
/// names a default alternative and one side of the pair is it -- the
/// first-registered, explicitly marked alternative wins ties at parse time
/// (see `ParseDriver`), so the analyzer doesn't need to keep widening depth.
fn resolved_by_default(production: &ProductionPattern, a: usize, b: usize) -> bool {
    match production.default_alternative {
        Some(default) => default == a || default == b,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Grammar, ProductionPatternElement, TokenPattern};

    fn token(grammar: &mut Grammar, id: PatternId, text: &str) {
        grammar.add_token_pattern(TokenPattern::literal(id, text, text)).unwrap();
    }

    #[test]
    fn single_alternative_needs_no_disambiguation() {
        let mut grammar = Grammar::new();
        token(&mut grammar, 1, "a");
        grammar.add_production_pattern(2, "root").unwrap();
        grammar
            .add_alternative(2, vec![ProductionPatternElement::new(true, 1, 1, 1)])
            .unwrap();
        grammar.prepare().unwrap();
        assert_eq!(grammar.production(2).unwrap().look_ahead().unwrap().size(), 1);
    }

    #[test]
    fn disjoint_first_tokens_resolve_at_depth_one() {
        let mut grammar = Grammar::new();
        token(&mut grammar, 1, "a");
        token(&mut grammar, 2, "b");
        grammar.add_production_pattern(3, "root").unwrap();
        grammar
            .add_alternative(3, vec![ProductionPatternElement::new(true, 1, 1, 1)])
            .unwrap();
        grammar
            .add_alternative(3, vec![ProductionPatternElement::new(true, 2, 1, 1)])
            .unwrap();
        grammar.prepare().unwrap();
        let production = grammar.production(3).unwrap();
        assert_eq!(production.alternatives[0].look_ahead().unwrap().size(), 1);
    }

    #[test]
    fn shared_prefix_widens_lookahead_depth() {
        let mut grammar = Grammar::new();
        token(&mut grammar, 1, "a");
        token(&mut grammar, 2, "b");
        token(&mut grammar, 3, "c");
        grammar.add_production_pattern(4, "root").unwrap();
        grammar
            .add_alternative(
                4,
                vec![
                    ProductionPatternElement::new(true, 1, 1, 1),
                    ProductionPatternElement::new(true, 2, 1, 1),
                ],
            )
            .unwrap();
        grammar
            .add_alternative(
                4,
                vec![
                    ProductionPatternElement::new(true, 1, 1, 1),
                    ProductionPatternElement::new(true, 3, 1, 1),
                ],
            )
            .unwrap();
        grammar.prepare().unwrap();
        let production = grammar.production(4).unwrap();
        assert_eq!(production.alternatives[0].look_ahead().unwrap().max_length(), 2);
    }

    #[test]
    fn default_alternative_suppresses_ambiguity_error() {
        let mut grammar = Grammar::new();
        token(&mut grammar, 1, "a");
        grammar.add_production_pattern(2, "root").unwrap();
        grammar
            .add_alternative(2, vec![ProductionPatternElement::new(true, 1, 1, 1)])
            .unwrap();
        grammar
            .add_alternative(
                2,
                vec![
                    ProductionPatternElement::new(true, 1, 1, 1),
                    ProductionPatternElement::new(true, 1, 0, 1),
                ],
            )
            .unwrap();
        grammar.set_default_alternative(2, 0).unwrap();
        grammar.prepare().unwrap();
    }

    #[test]
    fn unresolved_ambiguity_without_default_is_an_error() {
        let mut grammar = Grammar::new();
        token(&mut grammar, 1, "a");
        grammar.add_production_pattern(2, "root").unwrap();
        grammar
            .add_alternative(2, vec![ProductionPatternElement::new(true, 1, 1, 1)])
            .unwrap();
        grammar
            .add_alternative(
                2,
                vec![
                    ProductionPatternElement::new(true, 1, 1, 1),
                    ProductionPatternElement::new(true, 1, 0, 1),
                ],
            )
            .unwrap();
        let err = grammar.prepare().unwrap_err();
        assert!(matches!(err, ConstructionError::InherentAmbiguity(_)));
    }
}
