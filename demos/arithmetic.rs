//! Minimal runnable usage example: builds the arithmetic grammar used in
//! the integration tests, parses an expression passed on the command line
//! (or a default), and pretty-prints the resulting tree.
//!
//! Run with `RUST_LOG=debug cargo run --example arithmetic -- "1 + 2 * (3 - x)"`
//! to see the scanner and parse driver's ambient logging.

use descent_core::grammar::{Grammar, ProductionPatternElement, TokenPattern, UNBOUNDED};
use descent_core::ParseDriver;
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

fn element(is_token: bool, id: u32, min: u32, max: u32) -> ProductionPatternElement {
    ProductionPatternElement::new(is_token, id, min, max)
}

fn build_grammar() -> Grammar {
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
    grammar.add_alternative(ADD_OP, vec![element(true, ADD, 1, 1)]).unwrap();
    grammar.add_alternative(ADD_OP, vec![element(true, SUB, 1, 1)]).unwrap();
    grammar.mark_synthetic(ADD_OP).unwrap();

    grammar.add_production_pattern(MUL_OP, "mul_op").unwrap();
    grammar.add_alternative(MUL_OP, vec![element(true, MUL, 1, 1)]).unwrap();
    grammar.add_alternative(MUL_OP, vec![element(true, DIV, 1, 1)]).unwrap();
    grammar.mark_synthetic(MUL_OP).unwrap();

    grammar.add_production_pattern(EXPR_TAIL, "expr_tail").unwrap();
    grammar
        .add_alternative(EXPR_TAIL, vec![element(false, ADD_OP, 1, 1), element(false, TERM, 1, 1)])
        .unwrap();
    grammar.mark_synthetic(EXPR_TAIL).unwrap();

    grammar.add_production_pattern(TERM_TAIL, "term_tail").unwrap();
    grammar
        .add_alternative(TERM_TAIL, vec![element(false, MUL_OP, 1, 1), element(false, FACTOR, 1, 1)])
        .unwrap();
    grammar.mark_synthetic(TERM_TAIL).unwrap();

    grammar.add_production_pattern(ATOM, "atom").unwrap();
    grammar.add_alternative(ATOM, vec![element(true, NUMBER, 1, 1)]).unwrap();
    grammar.add_alternative(ATOM, vec![element(true, IDENT, 1, 1)]).unwrap();
    grammar
        .add_alternative(
            ATOM,
            vec![element(true, LP, 1, 1), element(false, EXPR, 1, 1), element(true, RP, 1, 1)],
        )
        .unwrap();

    grammar.add_production_pattern(FACTOR, "factor").unwrap();
    grammar.add_alternative(FACTOR, vec![element(false, ATOM, 1, 1)]).unwrap();

    grammar.add_production_pattern(TERM, "term").unwrap();
    grammar
        .add_alternative(TERM, vec![element(false, FACTOR, 1, 1), element(false, TERM_TAIL, 0, UNBOUNDED)])
        .unwrap();

    grammar.add_production_pattern(EXPR, "expr").unwrap();
    grammar
        .add_alternative(EXPR, vec![element(false, TERM, 1, 1), element(false, EXPR_TAIL, 0, UNBOUNDED)])
        .unwrap();
    grammar.set_start(EXPR);

    grammar.prepare().expect("arithmetic grammar should be unambiguous");
    grammar
}

fn main() {
    env_logger::init();

    let input = std::env::args().nth(1).unwrap_or_else(|| "1 + 2 * (3 - x)".to_string());
    let grammar = build_grammar();
    let driver = ParseDriver::new(&grammar, Cursor::new(input.clone().into_bytes()))
        .expect("grammar must be prepared before building a driver");

    match driver.parse() {
        Ok((tree, root)) => {
            println!("parsed: {}", input);
            tree.view(root).print().expect("printing to stdout should not fail");
        }
        Err(errors) => {
            eprintln!("failed to parse '{}':", input);
            eprintln!("{}", errors);
            std::process::exit(1);
        }
    }
}
