//! Interned state variables.
//!
//! A state variable is identified by its `(name, scope)` pair. The
//! registry creates each identity at most once per compilation; asking
//! again returns the existing record, and asking again at a different
//! sort is a programmer error. Records are hash-consed, so state
//! variables compare and hash by tag.

use fxhash::FxHashMap;
use hashconsing::{consign, HConsed, HashConsign};
use lazy_static::lazy_static;
use std::fmt::{self, Display, Formatter};
use std::sync::RwLock;

use super::term::{leaf_term, Op, Sort, Term, Var};

/// The instant offset of the initial-state view of an expression.
pub const BASE_OFFSET: i64 = 0;
/// The instant offset of the step-state view of an expression.
pub const CUR_OFFSET: i64 = 1;

/// The interned payload of a state variable.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct StateVarData {
    name: String,
    scope: Vec<String>,
    sort: Sort,
    is_input: bool,
    is_const: bool,
    for_inv_gen: bool,
}

impl StateVarData {
    /// Flattened-leaf name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Disambiguating scope segments.
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// Sort.
    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    /// Is this an input of its node?
    pub fn is_input(&self) -> bool {
        self.is_input
    }

    /// Is this constant over time?
    pub fn is_const(&self) -> bool {
        self.is_const
    }

    /// Should invariant generation consider this variable?
    pub fn for_inv_gen(&self) -> bool {
        self.for_inv_gen
    }
}

impl Display for StateVarData {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for s in &self.scope {
            write!(f, "{}.", s)?;
        }
        write!(f, "{}", self.name)
    }
}

/// A hash-consed state variable.
pub type StateVar = HConsed<StateVarData>;

consign! {
    let SVAR_FACTORY = consign(37) for StateVarData;
}

lazy_static! {
    static ref REGISTRY: RwLock<FxHashMap<(String, Vec<String>), StateVar>> =
        RwLock::new(FxHashMap::default());
}

/// Create, or retrieve, the state variable identified by `(name, scope)`.
///
/// On re-request the existing record wins, flags included. Panics if the
/// sort disagrees with the existing record.
pub fn mk_state_var(
    name: impl Into<String>,
    scope: Vec<String>,
    sort: Sort,
    is_input: bool,
    is_const: bool,
    for_inv_gen: bool,
) -> StateVar {
    let name = name.into();
    let key = (name.clone(), scope.clone());
    if let Some(sv) = REGISTRY.read().unwrap().get(&key) {
        assert_eq!(
            sv.sort(),
            &sort,
            "state variable {} redeclared at a different sort",
            sv.get()
        );
        return sv.clone();
    }
    let sv = SVAR_FACTORY.mk(StateVarData {
        name,
        scope,
        sort,
        is_input,
        is_const,
        for_inv_gen,
    });
    REGISTRY.write().unwrap().insert(key, sv.clone());
    sv
}

/// Retrieve a state variable by identity, if it exists.
pub fn find_state_var(name: &str, scope: &[String]) -> Option<StateVar> {
    REGISTRY
        .read()
        .unwrap()
        .get(&(name.to_owned(), scope.to_vec()))
        .cloned()
}

/// Forget all identities. State variables live for one compilation; the
/// compilation entry point calls this. Existing records stay valid, they
/// are just no longer findable.
pub fn clear_registry() {
    REGISTRY.write().unwrap().clear();
}

/// The term for this state variable at an instant offset.
pub fn instance(sv: &StateVar, offset: i64) -> Term {
    if sv.is_const() {
        const_instance(sv)
    } else {
        leaf_term(Op::Var(Var::Instance {
            svar: sv.clone(),
            offset,
        }))
    }
}

/// The offset-independent term for a constant state variable.
pub fn const_instance(sv: &StateVar) -> Term {
    leaf_term(Op::Var(Var::ConstSvar { svar: sv.clone() }))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identity() {
        let _l = crate::util::testing::lock();
        let a = mk_state_var(
            "x",
            vec!["svar_id_test".into()],
            Sort::Int,
            true,
            false,
            true,
        );
        let b = mk_state_var(
            "x",
            vec!["svar_id_test".into()],
            Sort::Int,
            false,
            false,
            false,
        );
        // same identity, same record: the first declaration wins
        assert_eq!(a, b);
        assert_eq!(a.uid(), b.uid());
        assert!(b.is_input());
        let c = mk_state_var(
            "x",
            vec!["svar_id_test".into(), "sub".into()],
            Sort::Int,
            false,
            false,
            false,
        );
        assert_ne!(a, c);
    }

    #[test]
    #[should_panic]
    fn sort_conflict() {
        let _l = crate::util::testing::lock();
        mk_state_var("y", vec!["svar_sort_test".into()], Sort::Int, false, false, true);
        mk_state_var("y", vec!["svar_sort_test".into()], Sort::Bool, false, false, true);
    }

    #[test]
    fn display() {
        let _l = crate::util::testing::lock();
        let sv = mk_state_var(
            "out",
            vec!["svar_fmt_test".into(), "impl".into()],
            Sort::Bool,
            false,
            false,
            true,
        );
        assert_eq!(format!("{}", sv.get()), "svar_fmt_test.impl.out");
    }
}
