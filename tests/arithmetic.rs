//! End-to-end tests for a small arithmetic grammar: integers and
//! identifiers, `+ - * /`, parentheses, and whitespace skipping. Exercises
//! the scanner, look-ahead analyzer and parse driver together.

use descent_core::grammar::{Grammar, ProductionPatternElement, TokenPattern, UNBOUNDED};
use descent_core::{NodeKind, ParseDriver};
use std::io::Cursor;

const ADD: u32 = 1;
const SUB: u32 = 2;
const MUL: u32 = 3;
const DIV: u32 = 4;
const LP: u32 = 5;
const RP: u32 = 6;
const NUMBER: u32 = 7;
const IDENT: u32 = 8;
const WS: u32 = 9;

const EXPR: u32 = 10;
const EXPR_TAIL: u32 = 11;
const ADD_OP: u32 = 12;
const MUL_OP: u32 = 13;
const TERM: u32 = 14;
const TERM_TAIL: u32 = 15;
const FACTOR: u32 = 16;
const ATOM: u32 = 17;

fn token(is_token: bool, id: u32, min: u32, max: u32) -> ProductionPatternElement {
    ProductionPatternElement::new(is_token, id, min, max)
}

fn arithmetic_grammar() -> Grammar {
    let mut grammar = Grammar::new();

    grammar.add_token_pattern(TokenPattern::literal(ADD, "ADD", "+")).unwrap();
    grammar.add_token_pattern(TokenPattern::literal(SUB, "SUB", "-")).unwrap();
    grammar.add_token_pattern(TokenPattern::literal(MUL, "MUL", "*")).unwrap();
    grammar.add_token_pattern(TokenPattern::literal(DIV, "DIV", "/")).unwrap();
    grammar.add_token_pattern(TokenPattern::literal(LP, "LP", "(")).unwrap();
    grammar.add_token_pattern(TokenPattern::literal(RP, "RP", ")")).unwrap();
    grammar.add_token_pattern(TokenPattern::regex(NUMBER, "NUMBER", "[0-9]+")).unwrap();
    grammar.add_token_pattern(TokenPattern::regex(IDENT, "IDENT", "[a-zA-Z_][a-zA-Z0-9_]*")).unwrap();
    grammar.add_token_pattern(TokenPattern::regex(WS, "WS", "[ \t\n\r]+").ignored()).unwrap();

    grammar.add_production_pattern(ADD_OP, "add_op").unwrap();
    grammar.add_alternative(ADD_OP, vec![token(true, ADD, 1, 1)]).unwrap();
    grammar.add_alternative(ADD_OP, vec![token(true, SUB, 1, 1)]).unwrap();
    grammar.mark_synthetic(ADD_OP).unwrap();

    grammar.add_production_pattern(MUL_OP, "mul_op").unwrap();
    grammar.add_alternative(MUL_OP, vec![token(true, MUL, 1, 1)]).unwrap();
    grammar.add_alternative(MUL_OP, vec![token(true, DIV, 1, 1)]).unwrap();
    grammar.mark_synthetic(MUL_OP).unwrap();

    grammar.add_production_pattern(EXPR_TAIL, "expr_tail").unwrap();
    grammar
        .add_alternative(EXPR_TAIL, vec![token(false, ADD_OP, 1, 1), token(false, TERM, 1, 1)])
        .unwrap();
    grammar.mark_synthetic(EXPR_TAIL).unwrap();

    grammar.add_production_pattern(TERM_TAIL, "term_tail").unwrap();
    grammar
        .add_alternative(TERM_TAIL, vec![token(false, MUL_OP, 1, 1), token(false, FACTOR, 1, 1)])
        .unwrap();
    grammar.mark_synthetic(TERM_TAIL).unwrap();

    grammar.add_production_pattern(ATOM, "atom").unwrap();
    grammar.add_alternative(ATOM, vec![token(true, NUMBER, 1, 1)]).unwrap();
    grammar.add_alternative(ATOM, vec![token(true, IDENT, 1, 1)]).unwrap();
    grammar
        .add_alternative(
            ATOM,
            vec![token(true, LP, 1, 1), token(false, EXPR, 1, 1), token(true, RP, 1, 1)],
        )
        .unwrap();

    grammar.add_production_pattern(FACTOR, "factor").unwrap();
    grammar.add_alternative(FACTOR, vec![token(false, ATOM, 1, 1)]).unwrap();

    grammar.add_production_pattern(TERM, "term").unwrap();
    grammar
        .add_alternative(TERM, vec![token(false, FACTOR, 1, 1), token(false, TERM_TAIL, 0, UNBOUNDED)])
        .unwrap();

    grammar.add_production_pattern(EXPR, "expr").unwrap();
    grammar
        .add_alternative(EXPR, vec![token(false, TERM, 1, 1), token(false, EXPR_TAIL, 0, UNBOUNDED)])
        .unwrap();
    grammar.set_start(EXPR);

    grammar.prepare().unwrap();
    grammar
}

fn parse(grammar: &Grammar, input: &str) -> Result<(descent_core::Tree, descent_core::NodeId), descent_core::ParseErrorLog> {
    let driver = ParseDriver::new(grammar, Cursor::new(input.as_bytes().to_vec())).unwrap();
    driver.parse()
}

#[test]
fn parses_a_single_number() {
    let grammar = arithmetic_grammar();
    let (tree, root) = parse(&grammar, "42").unwrap();
    assert_eq!(tree.node(root).kind(), NodeKind::Production(EXPR));
    // expr -> term -> factor -> atom -> NUMBER, no tail repetitions.
    assert_eq!(tree.node(root).children().len(), 1);
}

#[test]
fn left_associative_addition_chain() {
    let grammar = arithmetic_grammar();
    let (tree, root) = parse(&grammar, "1 + 2 + 3").unwrap();
    // term, ADD, term, ADD, term flattened directly into expr's children.
    assert_eq!(tree.node(root).children().len(), 5);
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let grammar = arithmetic_grammar();
    let (tree, root) = parse(&grammar, "1 + 2 * 3").unwrap();
    let children = tree.node(root).children();
    assert_eq!(children.len(), 3);
    let second_term = tree.node(children[2]);
    assert_eq!(second_term.kind(), NodeKind::Production(TERM));
    // the right-hand term itself contains factor, MUL, factor flattened.
    assert_eq!(second_term.children().len(), 3);
}

#[test]
fn parentheses_nest_expressions() {
    let grammar = arithmetic_grammar();
    let (tree, root) = parse(&grammar, "(1 + 2) * 3").unwrap();
    assert_eq!(tree.node(root).children().len(), 1);
    let term = tree.node(root).children()[0];
    let term_children = tree.node(term).children();
    // factor, MUL, factor flattened; the first factor holds the parenthesized expr.
    assert_eq!(term_children.len(), 3);
}

#[test]
fn identifiers_are_accepted_as_atoms() {
    let grammar = arithmetic_grammar();
    let (tree, root) = parse(&grammar, "x + y").unwrap();
    assert_eq!(tree.node(root).children().len(), 3);
}

#[test]
fn missing_operand_is_recovered_and_reported() {
    let grammar = arithmetic_grammar();
    let err = parse(&grammar, "1 + ").unwrap_err();
    assert!(!err.is_empty());
}

#[test]
fn unmatched_parenthesis_is_reported() {
    let grammar = arithmetic_grammar();
    let err = parse(&grammar, "(1 + 2").unwrap_err();
    assert!(!err.is_empty());
}

#[test]
fn deeply_nested_parentheses_parse_without_stack_overflow() {
    let grammar = arithmetic_grammar();
    let mut input = String::new();
    for _ in 0..64 {
        input.push('(');
    }
    input.push('1');
    for _ in 0..64 {
        input.push(')');
    }
    let (tree, root) = parse(&grammar, &input).unwrap();
    assert_eq!(tree.node(root).kind(), NodeKind::Production(EXPR));
}
