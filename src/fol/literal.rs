//! Literals in first-order logic

use crate::fol::interner::{Interner, PredicateId, VariableId};
use crate::fol::term::Term;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A predicate symbol with arity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PredicateSymbol {
    pub id: PredicateId,
    pub arity: u8,
}

impl PredicateSymbol {
    /// Create a new predicate symbol from an ID and arity
    pub fn new(id: PredicateId, arity: u8) -> Self {
        PredicateSymbol { id, arity }
    }

    /// Get the name of this predicate symbol from the interner
    pub fn name<'a>(&self, interner: &'a Interner) -> &'a str {
        interner.resolve_predicate(self.id)
    }
}

/// A literal (a predicate application, possibly negated)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub predicate: PredicateSymbol,
    pub args: Vec<Term>,
    /// true = positive, false = negative
    pub polarity: bool,
}

impl Literal {
    /// Create a new positive literal
    pub fn positive(predicate: PredicateSymbol, args: Vec<Term>) -> Self {
        Literal {
            predicate,
            args,
            polarity: true,
        }
    }

    /// Create a new negative literal
    pub fn negative(predicate: PredicateSymbol, args: Vec<Term>) -> Self {
        Literal {
            predicate,
            args,
            polarity: false,
        }
    }

    /// Collect all variable IDs occurring in this literal's arguments
    pub fn collect_variable_ids(&self, vars: &mut std::collections::HashSet<VariableId>) {
        for term in &self.args {
            term.collect_variable_ids(vars);
        }
    }

    /// Format this literal with an interner for name resolution
    pub fn display<'a>(&'a self, interner: &'a Interner) -> LiteralDisplay<'a> {
        LiteralDisplay {
            literal: self,
            interner,
        }
    }
}

/// Display wrapper for Literal that includes an interner for name resolution
pub struct LiteralDisplay<'a> {
    literal: &'a Literal,
    interner: &'a Interner,
}

impl<'a> fmt::Display for LiteralDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.literal.polarity {
            write!(f, "~")?;
        }
        write!(
            f,
            "{}",
            self.interner.resolve_predicate(self.literal.predicate.id)
        )?;
        if !self.literal.args.is_empty() {
            write!(f, "(")?;
            for (i, arg) in self.literal.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", arg.display(self.interner))?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

// Display implementation that shows IDs (for debugging without interner)

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.polarity {
            write!(f, "~")?;
        }
        write!(f, "P{}(", self.predicate.id.as_u32())?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}
