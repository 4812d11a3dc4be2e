//! termtrie: term and clause indexing for saturation-based reasoning
//!
//! An inference loop that stores thousands of first-order terms and clauses
//! cannot afford a linear scan per retrieval. This crate provides the three
//! classic index structures that make retrieval sub-linear:
//!
//! - [`DiscriminationTree`]: terms flattened to preorder key paths; fast
//!   generalization retrieval.
//! - [`PathTree`]: structure-preserving per-argument-position tree; fast
//!   instance retrieval.
//! - [`FeatureVectorIndex`]: clauses summarized as sparse feature vectors;
//!   fast subsumption retrieval, plus maintenance of a subsumption-minimal
//!   clause set.
//!
//! All three are parameterized over an attached value type and a pluggable
//! [`NodeStore`]; every operation has a synchronous form and a suspending
//! `_async` form with a cancellation token, sharing one algorithm.
//!
//! ```
//! use termtrie::{Constant, DiscriminationTree, FunctionSymbol, Interner, Term, Variable};
//!
//! let mut interner = Interner::new();
//! let f = FunctionSymbol::new(interner.intern_function("f"), 1);
//! let x = Term::Variable(Variable::new(interner.intern_variable("X")));
//! let a = Term::Constant(Constant::new(interner.intern_constant("a")));
//!
//! let mut tree = DiscriminationTree::new();
//! tree.add(&Term::Function(f, vec![x]), "general").unwrap();
//!
//! // f(X) generalizes f(a)
//! let query = Term::Function(f, vec![a]);
//! assert_eq!(tree.get_generalizations(&query), vec!["general"]);
//! assert!(tree.get_instances(&query).is_empty());
//! ```

pub mod fol;
pub mod index;
pub mod store;

// Re-export the fol collaborator types
pub use fol::{
    Clause, ClauseKey, Constant, ConstantId, FunctionId, FunctionSymbol, Interner, Literal,
    PredicateId, PredicateSymbol, Substitution, Term, Variable, VariableId,
};

// Re-export the index families and their key types
pub use index::{
    DiscKey, DiscriminationTree, FeatureExtractor, FeatureKey, FeatureVectorIndex, IndexError,
    PathKey, PathTree, SymbolCountFeatures, SymbolFeature,
};

// Re-export the node storage seam
pub use store::{HashStore, NodeId, NodeStore, SortedStore};
