//! One-way matching and clause subsumption
//!
//! Matching is the directed half of unification: only variables on the
//! pattern side may be substituted. It backs the exact confirmation checks
//! run after every over-approximating index walk, and the real subsumption
//! test between clauses.

use crate::fol::clause::Clause;
use crate::fol::literal::Literal;
use crate::fol::substitution::Substitution;
use crate::fol::term::Term;
use std::collections::HashSet;

/// Try to match a pattern term against a target term, extending the trailed
/// substitution. Only variables in the pattern are bound.
pub fn match_terms(pattern: &Term, term: &Term, subst: &mut Substitution) -> bool {
    match pattern {
        Term::Variable(v) => {
            if let Some(bound) = subst.get(v.id) {
                bound == term
            } else {
                subst.bind(*v, term.clone());
                true
            }
        }
        Term::Constant(c1) => match term {
            Term::Constant(c2) => c1 == c2,
            _ => false,
        },
        Term::Function(f1, args1) => match term {
            Term::Function(f2, args2) => {
                f1 == f2
                    && args1.len() == args2.len()
                    && args1
                        .iter()
                        .zip(args2)
                        .all(|(a1, a2)| match_terms(a1, a2, subst))
            }
            _ => false,
        },
    }
}

/// Try to match two literals with a trailed substitution
pub fn match_literals(lit1: &Literal, lit2: &Literal, subst: &mut Substitution) -> bool {
    if lit1.polarity != lit2.polarity {
        return false;
    }
    if lit1.predicate != lit2.predicate {
        return false;
    }
    if lit1.args.len() != lit2.args.len() {
        return false;
    }
    for (term1, term2) in lit1.args.iter().zip(&lit2.args) {
        if !match_terms(term1, term2, subst) {
            return false;
        }
    }
    true
}

impl Term {
    /// Check whether this term generalizes `other`: some substitution σ
    /// with `self σ = other` exists.
    pub fn generalizes(&self, other: &Term) -> bool {
        let mut subst = Substitution::new();
        match_terms(self, other, &mut subst)
    }

    /// Check whether this term is an instance of `other`: some substitution
    /// applied to `other` yields this term.
    pub fn is_instance_of(&self, other: &Term) -> bool {
        other.generalizes(self)
    }
}

/// Count the number of unique variables in a clause (for capacity hints)
fn count_variables(clause: &Clause) -> usize {
    let mut vars = HashSet::new();
    for lit in &clause.literals {
        lit.collect_variable_ids(&mut vars);
    }
    vars.len()
}

/// Check if a unit clause subsumes another clause
pub fn subsumes_unit(unit: &Clause, clause: &Clause) -> bool {
    if unit.literals.len() != 1 {
        return false;
    }

    let unit_lit = &unit.literals[0];
    let mut subst = Substitution::with_capacity(count_variables(unit));

    for lit in &clause.literals {
        let mark = subst.mark();
        if match_literals(unit_lit, lit, &mut subst) {
            return true;
        }
        subst.backtrack(mark);
    }

    false
}

/// Full subsumption check using trail-based backtracking.
///
/// `subsumer` subsumes `subsumee` if some substitution σ maps each literal
/// of the subsumer onto a distinct literal of the subsumee. This is the
/// complete test, not a greedy approximation: a failed branch backtracks
/// the trail and tries the next target literal.
pub fn subsumes(subsumer: &Clause, subsumee: &Clause) -> bool {
    if subsumer.literals.len() > subsumee.literals.len() {
        return false;
    }
    if subsumer.literals.len() == 1 {
        return subsumes_unit(subsumer, subsumee);
    }

    let mut subst = Substitution::with_capacity(count_variables(subsumer));
    let mut used = vec![false; subsumee.literals.len()];
    find_subsumption_mapping(subsumer, subsumee, 0, &mut subst, &mut used)
}

fn find_subsumption_mapping(
    subsumer: &Clause,
    subsumee: &Clause,
    subsumer_idx: usize,
    subst: &mut Substitution,
    used: &mut Vec<bool>,
) -> bool {
    if subsumer_idx >= subsumer.literals.len() {
        return true;
    }

    let subsumer_lit = &subsumer.literals[subsumer_idx];

    for (i, subsumee_lit) in subsumee.literals.iter().enumerate() {
        if used[i] || subsumee_lit.polarity != subsumer_lit.polarity {
            continue;
        }

        let mark = subst.mark();
        if match_literals(subsumer_lit, subsumee_lit, subst) {
            used[i] = true;
            if find_subsumption_mapping(subsumer, subsumee, subsumer_idx + 1, subst, used) {
                return true;
            }
            used[i] = false;
        }
        subst.backtrack(mark);
    }

    false
}

impl Clause {
    /// Check whether this clause subsumes `other`.
    pub fn subsumes(&self, other: &Clause) -> bool {
        subsumes(self, other)
    }
}
