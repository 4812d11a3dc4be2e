//! Property-based tests for the index structures using proptest.
//!
//! Retrieval is checked against the one-way matching and subsumption
//! predicates as ground truth: whatever the tree walks prune, the reported
//! result sets must be exactly the matching stored entries.

use super::{DiscriminationTree, FeatureVectorIndex, PathTree, SymbolCountFeatures};
use crate::fol::{
    Clause, Constant, FunctionSymbol, Interner, Literal, PredicateSymbol, Term, Variable,
};
use proptest::prelude::*;

/// Term description (before interning)
#[derive(Debug, Clone)]
enum TermDesc {
    Var(u8),
    Const(u8),
    Func(u8, Vec<TermDesc>),
}

fn arb_term_desc(max_depth: u32) -> BoxedStrategy<TermDesc> {
    if max_depth == 0 {
        prop_oneof![
            (0..3u8).prop_map(TermDesc::Var),
            (0..3u8).prop_map(TermDesc::Const),
        ]
        .boxed()
    } else {
        prop_oneof![
            3 => (0..3u8).prop_map(TermDesc::Var),
            3 => (0..3u8).prop_map(TermDesc::Const),
            2 => (0..2u8, proptest::collection::vec(arb_term_desc(max_depth - 1), 1..=2))
                .prop_map(|(f, args)| TermDesc::Func(f, args)),
        ]
        .boxed()
    }
}

fn build_term(desc: &TermDesc, interner: &mut Interner) -> Term {
    match desc {
        TermDesc::Var(i) => {
            let id = interner.intern_variable(&format!("X{}", i));
            Term::Variable(Variable::new(id))
        }
        TermDesc::Const(i) => {
            let id = interner.intern_constant(&format!("c{}", i));
            Term::Constant(Constant::new(id))
        }
        TermDesc::Func(i, args) => {
            // Arity in the name keeps symbols arity-consistent
            let id = interner.intern_function(&format!("f{}_{}", i, args.len()));
            let args: Vec<Term> = args.iter().map(|a| build_term(a, interner)).collect();
            Term::Function(FunctionSymbol::new(id, args.len() as u8), args)
        }
    }
}

fn build_terms(descs: &[TermDesc]) -> Vec<Term> {
    let mut interner = Interner::new();
    let mut terms: Vec<Term> = Vec::new();
    for desc in descs {
        let term = build_term(desc, &mut interner);
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Literal description: (predicate, polarity, args)
type LiteralDesc = (u8, bool, Vec<TermDesc>);

fn arb_clause_desc() -> impl Strategy<Value = Vec<LiteralDesc>> {
    proptest::collection::vec(
        (
            0..2u8,
            proptest::bool::ANY,
            proptest::collection::vec(arb_term_desc(1), 1..=2),
        ),
        1..=3,
    )
}

fn build_clause(desc: &[LiteralDesc], interner: &mut Interner) -> Clause {
    let literals = desc
        .iter()
        .map(|(p, polarity, args)| {
            let predicate =
                PredicateSymbol::new(interner.intern_predicate(&format!("P{}_{}", p, args.len())), args.len() as u8);
            let args: Vec<Term> = args.iter().map(|a| build_term(a, interner)).collect();
            if *polarity {
                Literal::positive(predicate, args)
            } else {
                Literal::negative(predicate, args)
            }
        })
        .collect();
    Clause::new(literals)
}

fn build_clauses(descs: &[Vec<LiteralDesc>]) -> Vec<Clause> {
    let mut interner = Interner::new();
    let mut clauses: Vec<Clause> = Vec::new();
    for desc in descs {
        let clause = build_clause(desc, &mut interner);
        if !clauses.contains(&clause) {
            clauses.push(clause);
        }
    }
    clauses
}

proptest! {
    /// Add/lookup/remove round-trips, and removal leaves no empty nodes.
    #[test]
    fn prop_term_index_round_trip(descs in proptest::collection::vec(arb_term_desc(3), 1..6)) {
        let terms = build_terms(&descs);

        let mut disc = DiscriminationTree::new();
        let mut path = PathTree::new();
        for (i, term) in terms.iter().enumerate() {
            disc.add(term, i).unwrap();
            path.add(term, i).unwrap();
        }
        for (i, term) in terms.iter().enumerate() {
            prop_assert_eq!(disc.get(term), Some(i));
            prop_assert_eq!(path.get(term), Some(i));
        }
        for term in &terms {
            prop_assert!(disc.remove(term));
            prop_assert!(!disc.remove(term));
            prop_assert!(path.remove(term));
            prop_assert!(!path.remove(term));
        }
        prop_assert_eq!(disc.store().node_count(), 1);
        prop_assert_eq!(path.store().node_count(), 1);
    }

    /// Both term indices report exactly the stored terms that the matching
    /// predicates accept.
    #[test]
    fn prop_term_retrieval_matches_ground_truth(
        descs in proptest::collection::vec(arb_term_desc(2), 1..6),
        qdesc in arb_term_desc(2),
    ) {
        let mut all = descs;
        all.push(qdesc);
        let mut terms = build_terms(&all);
        let query = terms.pop().unwrap();

        let mut disc = DiscriminationTree::new();
        let mut path = PathTree::new();
        for (i, term) in terms.iter().enumerate() {
            disc.add(term, i).unwrap();
            path.add(term, i).unwrap();
        }

        let mut expected_gen: Vec<usize> = terms
            .iter()
            .enumerate()
            .filter(|(_, t)| t.generalizes(&query))
            .map(|(i, _)| i)
            .collect();
        expected_gen.sort_unstable();

        let mut expected_inst: Vec<usize> = terms
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_instance_of(&query))
            .map(|(i, _)| i)
            .collect();
        expected_inst.sort_unstable();

        let mut disc_gen = disc.get_generalizations(&query);
        disc_gen.sort_unstable();
        prop_assert_eq!(&disc_gen, &expected_gen);

        let mut path_gen = path.get_generalizations(&query);
        path_gen.sort_unstable();
        prop_assert_eq!(&path_gen, &expected_gen);

        let mut disc_inst = disc.get_instances(&query);
        disc_inst.sort_unstable();
        prop_assert_eq!(&disc_inst, &expected_inst);

        let mut path_inst = path.get_instances(&query);
        path_inst.sort_unstable();
        prop_assert_eq!(&path_inst, &expected_inst);
    }

    /// Generalization/instance duality on single-entry indices: s is found
    /// as a generalization of q exactly when q is found as an instance of s.
    #[test]
    fn prop_generalization_instance_duality(
        sdesc in arb_term_desc(2),
        qdesc in arb_term_desc(2),
    ) {
        let terms = build_terms(&[sdesc, qdesc]);
        let s = terms[0].clone();
        let q = terms.get(1).cloned().unwrap_or_else(|| s.clone());

        let mut with_s = DiscriminationTree::new();
        with_s.add(&s, ()).unwrap();
        let mut with_q = DiscriminationTree::new();
        with_q.add(&q, ()).unwrap();

        prop_assert_eq!(
            with_s.get_generalizations(&q).len(),
            with_q.get_instances(&s).len(),
        );
    }

    /// The feature-vector walks report exactly the stored clauses that the
    /// real subsumption test accepts, in both directions.
    #[test]
    fn prop_fvi_retrieval_matches_ground_truth(
        cdescs in proptest::collection::vec(arb_clause_desc(), 1..5),
        qdesc in arb_clause_desc(),
    ) {
        let mut all = cdescs;
        all.push(qdesc);
        let mut clauses = build_clauses(&all);
        let query = clauses.pop().unwrap();

        let mut index = FeatureVectorIndex::new(SymbolCountFeatures);
        for (i, clause) in clauses.iter().enumerate() {
            index.add(clause, i).unwrap();
        }

        let mut expected_subsuming: Vec<usize> = clauses
            .iter()
            .enumerate()
            .filter(|(_, c)| c.subsumes(&query))
            .map(|(i, _)| i)
            .collect();
        expected_subsuming.sort_unstable();

        let mut expected_subsumed: Vec<usize> = clauses
            .iter()
            .enumerate()
            .filter(|(_, c)| query.subsumes(c))
            .map(|(i, _)| i)
            .collect();
        expected_subsumed.sort_unstable();

        let mut subsuming = index.get_subsuming(&query);
        subsuming.sort_unstable();
        prop_assert_eq!(&subsuming, &expected_subsuming);

        let mut subsumed = index.get_subsumed(&query);
        subsumed.sort_unstable();
        prop_assert_eq!(&subsumed, &expected_subsumed);
    }

    /// After any sequence of try_replace_subsumed calls, no stored clause
    /// subsumes another.
    #[test]
    fn prop_fvi_replacement_keeps_set_minimal(
        cdescs in proptest::collection::vec(arb_clause_desc(), 1..6),
    ) {
        let clauses = build_clauses(&cdescs);

        let mut index = FeatureVectorIndex::new(SymbolCountFeatures);
        for (i, clause) in clauses.iter().enumerate() {
            index.try_replace_subsumed(clause, i).unwrap();
        }

        // The empty clause subsumes everything: use it to enumerate
        let mut survivors = Vec::new();
        index.for_each_subsumed(&Clause::new(vec![]), |clause, _| {
            survivors.push(clause.clone());
            false
        });

        prop_assert!(!survivors.is_empty());
        for c1 in &survivors {
            for c2 in &survivors {
                if c1 != c2 {
                    prop_assert!(!c1.subsumes(c2), "{} subsumes {}", c1, c2);
                }
            }
        }
    }
}
