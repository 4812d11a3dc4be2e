//! First-order logic data structures
//!
//! The fundamental types consumed by the index structures: terms, literals,
//! clauses, symbol interning, substitutions, and one-way matching.

pub mod clause;
pub mod interner;
pub mod literal;
pub mod matching;
pub mod substitution;
pub mod term;

// Re-export commonly used types
pub use clause::{Clause, ClauseDisplay, ClauseKey};
pub use interner::{ConstantId, FunctionId, Interner, PredicateId, VariableId};
pub use literal::{Literal, LiteralDisplay, PredicateSymbol};
pub use matching::{match_literals, match_terms, subsumes, subsumes_unit};
pub use substitution::Substitution;
pub use term::{Constant, FunctionSymbol, Term, TermDisplay, Variable};
