//! Runtime core for a recursive-descent parser toolkit.
//!
//! A [`Grammar`] declares token patterns and production rules; calling
//! [`Grammar::prepare`] validates it (completeness, left recursion, empty
//! matches, duplicate alternatives) and computes the variable-depth look-ahead
//! sets each production needs to pick an alternative without backtracking. A
//! [`ParseDriver`] then turns a byte stream into a parse [`Tree`] by
//! maximal-munch tokenization (via [`Scanner`]) feeding a recursive-descent
//! driver that selects productions by look-ahead, flattens synthetic
//! productions, and recovers from malformed input by panic-mode
//! resynchronization, accumulating every diagnostic instead of stopping at
//! the first one.
//!
//! # Example
//!
//! ```
//! use descent_core::grammar::{Grammar, ProductionPatternElement, TokenPattern, UNBOUNDED};
//! use descent_core::ParseDriver;
//! use std::io::Cursor;
//!
//! let mut grammar = Grammar::new();
//! grammar.add_token_pattern(TokenPattern::regex(1, "NUMBER", "[0-9]+")).unwrap();
//! grammar.add_token_pattern(TokenPattern::literal(2, "PLUS", "+")).unwrap();
//! grammar.add_production_pattern(3, "sum").unwrap();
//! grammar
//!     .add_alternative(
//!         3,
//!         vec![
//!             ProductionPatternElement::new(true, 1, 1, 1),
//!             ProductionPatternElement::new(true, 2, 0, UNBOUNDED),
//!         ],
//!     )
//!     .unwrap();
//! grammar.prepare().unwrap();
//!
//! let driver = ParseDriver::new(&grammar, Cursor::new(b"1+2".to_vec())).unwrap();
//! let (tree, root) = driver.parse().unwrap();
//! assert_eq!(tree.node(root).children().len(), 2);
//! ```

/// The shared id space for both token and production patterns; a grammar
/// enforces that every id is used at most once across the two.
pub type PatternId = u32;

mod char_buffer;
pub mod error;
pub mod grammar;
mod lookahead;
mod lookahead_analyzer;
mod parse_driver;
mod position;
mod regex_matcher;
mod regex_syntax;
pub mod scanner;
mod string_dfa;
mod token_nfa;
pub mod tree;
mod util;

pub use crate::error::{ConstructionError, ParseError, ParseErrorKind, ParseErrorLog};
pub use crate::grammar::Grammar;
pub use crate::lookahead::LookAheadSet;
pub use crate::parse_driver::{AnalyzerHooks, Identity, ParseDriver};
pub use crate::position::Position;
pub use crate::scanner::{ScannedToken, Scanner};
pub use crate::tree::{Node, NodeId, NodeKind, Tree, TreeView};
