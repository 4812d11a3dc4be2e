//! Variable substitutions with trail-based backtracking

use crate::fol::interner::VariableId;
use crate::fol::term::{Term, Variable};
use std::collections::HashMap;

/// A substitution mapping variable IDs to terms.
///
/// Supports trail-based backtracking for subsumption and matching: `bind`
/// records each binding on a trail so that `backtrack` can undo everything
/// past a saved `mark` without cloning the map.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    map: HashMap<VariableId, Term>,
    trail: Vec<VariableId>,
}

impl Substitution {
    /// Create a new empty substitution
    pub fn new() -> Self {
        Substitution::default()
    }

    /// Create a new substitution with pre-allocated capacity
    pub fn with_capacity(var_count: usize) -> Self {
        Substitution {
            map: HashMap::with_capacity(var_count),
            trail: Vec::with_capacity(var_count),
        }
    }

    /// Bind a variable, recording on the trail for backtracking
    #[inline]
    pub fn bind(&mut self, var: Variable, term: Term) {
        self.trail.push(var.id);
        self.map.insert(var.id, term);
    }

    /// Save the current trail position for a later backtrack
    #[inline]
    pub fn mark(&self) -> usize {
        self.trail.len()
    }

    /// Undo bindings back to a saved trail position
    #[inline]
    pub fn backtrack(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some(var_id) = self.trail.pop() {
                self.map.remove(&var_id);
            }
        }
    }

    /// Get the term bound to a variable ID, if any
    pub fn get(&self, var_id: VariableId) -> Option<&Term> {
        self.map.get(&var_id)
    }

    /// Check if a variable ID is bound
    pub fn contains(&self, var_id: VariableId) -> bool {
        self.map.contains_key(&var_id)
    }

    /// Number of bound variables
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if no variables are bound
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Term {
    /// Apply a substitution to this term
    pub fn apply_substitution(&self, subst: &Substitution) -> Term {
        match self {
            Term::Variable(v) => subst.get(v.id).cloned().unwrap_or_else(|| self.clone()),
            Term::Constant(_) => self.clone(),
            Term::Function(f, args) => {
                let new_args = args
                    .iter()
                    .map(|arg| arg.apply_substitution(subst))
                    .collect();
                Term::Function(*f, new_args)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::interner::Interner;
    use crate::fol::term::{Constant, FunctionSymbol};

    #[test]
    fn test_apply_substitution() {
        let mut interner = Interner::new();
        let x = Variable::new(interner.intern_variable("X"));
        let a = Term::Constant(Constant::new(interner.intern_constant("a")));
        let f = FunctionSymbol::new(interner.intern_function("f"), 1);

        let mut subst = Substitution::new();
        subst.bind(x, a.clone());

        let fx = Term::Function(f, vec![Term::Variable(x)]);
        assert_eq!(fx.apply_substitution(&subst), Term::Function(f, vec![a]));
    }

    #[test]
    fn test_mark_and_backtrack() {
        let mut interner = Interner::new();
        let x = Variable::new(interner.intern_variable("X"));
        let y = Variable::new(interner.intern_variable("Y"));
        let a = Term::Constant(Constant::new(interner.intern_constant("a")));

        let mut subst = Substitution::new();
        subst.bind(x, a.clone());
        let mark = subst.mark();
        subst.bind(y, a);

        assert!(subst.contains(x.id));
        assert!(subst.contains(y.id));

        subst.backtrack(mark);
        assert!(subst.contains(x.id));
        assert!(!subst.contains(y.id));
        assert_eq!(subst.len(), 1);
    }
}
