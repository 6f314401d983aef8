//! Term helpers: negation, substitution, named terms, binder
//! destructuring, re-interning.

use super::*;
use crate::term;
use fxhash::FxHashSet;

/// Negate a boolean term, cancelling an outer negation.
pub fn negate(t: &Term) -> Term {
    match &t.op {
        Op::Not => t.cs[0].clone(),
        _ => term![Op::Not; t.clone()],
    }
}

/// Negate a boolean term, also pushing through boolean constants and
/// comparison predicates.
pub fn negate_simplify(t: &Term) -> Term {
    match &t.op {
        Op::Not => t.cs[0].clone(),
        Op::Const(Value::Bool(b)) => bool_lit(!b),
        Op::CompOp(o) => term(Op::CompOp(o.negated()), t.cs.clone()),
        _ => term![Op::Not; t.clone()],
    }
}

/// Is this term an integer numeral?
pub fn is_numeral(t: &Term) -> bool {
    matches!(&t.op, Op::Const(Value::Int(_)))
}

/// The integer under a numeral.
pub fn as_numeral(t: &Term) -> Option<Integer> {
    t.as_int_opt().cloned()
}

/// Conjoin terms, avoiding a unit `and`.
pub fn and_terms(mut ts: Vec<Term>) -> Term {
    match ts.len() {
        0 => bool_lit(true),
        1 => ts.pop().unwrap(),
        _ => term(Op::BoolNaryOp(BoolNaryOp::And), ts),
    }
}

/// Disjoin terms, avoiding a unit `or`.
pub fn or_terms(mut ts: Vec<Term>) -> Term {
    match ts.len() {
        0 => bool_lit(false),
        1 => ts.pop().unwrap(),
        _ => term(Op::BoolNaryOp(BoolNaryOp::Or), ts),
    }
}

/// A term with its top-level binders peeled off.
#[derive(Clone, Debug)]
pub struct Destructed {
    /// Let definitions, outermost first.
    pub lets: Vec<Term>,
    /// Quantifier prefixes, outermost first.
    pub quants: Vec<(Quant, Vec<Sort>)>,
    /// The first non-binder subterm.
    pub body: Term,
}

/// Flatten the top-level binders of `t`.
pub fn destruct(t: &Term) -> Destructed {
    let mut lets = Vec::new();
    let mut quants = Vec::new();
    let mut body = t.clone();
    loop {
        match &body.op {
            Op::Let => {
                lets.push(body.cs[0].clone());
                let next = body.cs[1].clone();
                body = next;
            }
            Op::Quant(q, sorts) => {
                quants.push((q.clone(), sorts.clone()));
                let next = body.cs[0].clone();
                body = next;
            }
            _ => break,
        }
    }
    Destructed { lets, quants, body }
}

/// The namespace reserved for [mk_named].
pub const RESERVED_NAMED_NS: &str = "t";

static NAMED_CTR: AtomicU64 = AtomicU64::new(0);

/// Tag `t` in the reserved namespace, returning the fresh tag index and
/// the tagged term.
pub fn mk_named(t: &Term) -> (usize, Term) {
    let k = NAMED_CTR.fetch_add(1, Ordering::SeqCst) as usize;
    (
        k,
        term![Op::Named(RESERVED_NAMED_NS.to_owned(), k); t.clone()],
    )
}

/// Tag `t` in a caller-chosen namespace. The reserved namespace is
/// rejected.
pub fn mk_named_unsafe(ns: &str, k: usize, t: &Term) -> Term {
    assert_ne!(
        ns, RESERVED_NAMED_NS,
        "namespace {:?} is reserved for mk_named",
        ns
    );
    term![Op::Named(ns.to_owned(), k); t.clone()]
}

/// Rewrites `t`, applying the substitutions in `subs`.
///
/// The substitution map is taken mutably; this function will add rewrites
/// to it. This allows the same map to be re-used across multiple
/// rewrites, with caching.
pub fn substitute_cache(t: &Term, subs: &mut TermMap<Term>) -> Term {
    let mut stack = vec![(t.clone(), false)];

    while let Some((n, children_pushed)) = stack.pop() {
        if subs.contains_key(&n) {
            continue;
        }
        if !children_pushed {
            stack.push((n.clone(), true));
            stack.extend(n.cs.iter().map(|c| (c.clone(), false)));
            continue;
        }
        let new_n = term(
            n.op.clone(),
            n.cs.iter()
                .map(|c| subs.get(c).expect("postorder").clone())
                .collect(),
        );
        subs.insert(n.clone(), new_n);
    }
    subs.get(t).expect("postorder").clone()
}

/// Rewrites `t`, applying `from -> to`.
pub fn substitute_single(t: &Term, from: Term, to: Term) -> Term {
    let mut c = TermMap::new();
    c.insert(from, to);
    substitute_cache(t, &mut c)
}

/// Re-intern `t` bottom-up, preserving its structure.
///
/// With a single process-wide store this returns the canonical record for
/// each node; it is the copying end of moving a term between stores.
pub fn import(t: &Term) -> Term {
    let mut subs = TermMap::new();
    substitute_cache(t, &mut subs)
}

/// Every state variable mentioned in `t`.
pub fn state_vars(t: &Term) -> FxHashSet<StateVar> {
    let mut out = FxHashSet::default();
    for n in PostOrderIter::new(t.clone()) {
        if let Op::Var(v) = &n.op {
            if let Some(sv) = v.svar() {
                out.insert(sv.clone());
            }
        }
    }
    out
}

/// Is `v` a free variable of `t`?
pub fn free_in(v: &str, t: &Term) -> bool {
    PostOrderIter::new(t.clone()).any(|n| match &n.op {
        Op::Var(Var::Free { name, .. }) => name == v,
        _ => false,
    })
}
