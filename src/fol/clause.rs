//! Clauses and their canonical, order-insensitive keys

use crate::fol::interner::Interner;
use crate::fol::literal::Literal;
use crate::fol::term::Term;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A clause: a duplicate-free disjunction of literals.
///
/// Literal order is not significant: equality and hashing go through the
/// sorted [`ClauseKey`] form, so `P(x) ∨ Q(x)` and `Q(x) ∨ P(x)` are the
/// same clause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clause {
    pub literals: Vec<Literal>,
}

impl Clause {
    /// Create a new clause from literals, dropping exact duplicates.
    pub fn new(literals: Vec<Literal>) -> Self {
        let mut deduped: Vec<Literal> = Vec::with_capacity(literals.len());
        for lit in literals {
            if !deduped.contains(&lit) {
                deduped.push(lit);
            }
        }
        Clause { literals: deduped }
    }

    /// Create a unit clause
    pub fn unit(literal: Literal) -> Self {
        Clause {
            literals: vec![literal],
        }
    }

    /// Check if this clause is empty (contradiction)
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Number of literals
    pub fn len(&self) -> usize {
        self.literals.len()
    }

    /// Format this clause with an interner for name resolution
    pub fn display<'a>(&'a self, interner: &'a Interner) -> ClauseDisplay<'a> {
        ClauseDisplay {
            clause: self,
            interner,
        }
    }
}

impl PartialEq for Clause {
    fn eq(&self, other: &Self) -> bool {
        if self.literals.len() != other.literals.len() {
            return false;
        }
        ClauseKey::from_clause(self) == ClauseKey::from_clause(other)
    }
}

impl Eq for Clause {}

impl Hash for Clause {
    fn hash<H: Hasher>(&self, state: &mut H) {
        ClauseKey::from_clause(self).hash(state);
    }
}

// =============================================================================
// ClauseKey - structural hash key, insensitive to literal order
// =============================================================================

/// A sortable representation of a term for use in [`LiteralKey`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum TermKey {
    /// Variable with ID
    Variable(u32),
    /// Constant with ID
    Constant(u32),
    /// Function with ID, arity, and args
    Function(u32, u8, Vec<TermKey>),
}

impl TermKey {
    fn from_term(term: &Term) -> Self {
        match term {
            Term::Variable(v) => TermKey::Variable(v.id.as_u32()),
            Term::Constant(c) => TermKey::Constant(c.id.as_u32()),
            Term::Function(f, args) => TermKey::Function(
                f.id.as_u32(),
                f.arity,
                args.iter().map(TermKey::from_term).collect(),
            ),
        }
    }
}

/// A sortable representation of a literal for use in [`ClauseKey`].
/// Sorting order: polarity (negative first), then predicate ID, then args.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct LiteralKey {
    /// Polarity: false (negative) sorts before true (positive)
    polarity: bool,
    /// Predicate ID
    predicate_id: u32,
    /// Predicate arity
    predicate_arity: u8,
    /// Serialized arguments (for consistent ordering)
    args: Vec<TermKey>,
}

impl LiteralKey {
    fn from_literal(literal: &Literal) -> Self {
        LiteralKey {
            polarity: literal.polarity,
            predicate_id: literal.predicate.id.as_u32(),
            predicate_arity: literal.predicate.arity,
            args: literal.args.iter().map(TermKey::from_term).collect(),
        }
    }
}

/// Canonical structural key for a clause.
///
/// Literals are sorted, so two clauses holding the same literals in any
/// order produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClauseKey {
    /// Sorted literal keys
    literals: Vec<LiteralKey>,
}

impl ClauseKey {
    /// Create a ClauseKey from a clause.
    pub fn from_clause(clause: &Clause) -> Self {
        let mut literals: Vec<LiteralKey> = clause
            .literals
            .iter()
            .map(LiteralKey::from_literal)
            .collect();
        literals.sort();
        ClauseKey { literals }
    }
}

// =============================================================================
// Display
// =============================================================================

/// Display wrapper for Clause that includes an interner for name resolution
pub struct ClauseDisplay<'a> {
    clause: &'a Clause,
    interner: &'a Interner,
}

impl<'a> fmt::Display for ClauseDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clause.is_empty() {
            write!(f, "⊥")
        } else {
            for (i, lit) in self.clause.literals.iter().enumerate() {
                if i > 0 {
                    write!(f, " ∨ ")?;
                }
                write!(f, "{}", lit.display(self.interner))?;
            }
            Ok(())
        }
    }
}

// Display implementation that shows IDs (for debugging without interner)
impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "⊥")
        } else {
            for (i, lit) in self.literals.iter().enumerate() {
                if i > 0 {
                    write!(f, " ∨ ")?;
                }
                write!(f, "{}", lit)?;
            }
            Ok(())
        }
    }
}
