#![allow(missing_docs)]

use super::extras::*;
use super::*;
use crate::term;
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn eq() {
    let v = var("a", Sort::Bool);
    let u = var("a", Sort::Bool);
    let w = var("b", Sort::Bool);
    assert_eq!(v, u);
    assert!(v != w);
    assert!(u != w);
}

#[test]
fn pointer_sharing() {
    let a = term![Op::BoolNaryOp(BoolNaryOp::And); var("a", Sort::Bool), var("b", Sort::Bool)];
    let b = term![Op::BoolNaryOp(BoolNaryOp::And); var("a", Sort::Bool), var("b", Sort::Bool)];
    assert_eq!(a.uid(), b.uid());
    assert!(std::ptr::eq(a.get(), b.get()));
}

#[derive(Clone, Debug)]
struct BoolTerm(Term);

impl Arbitrary for BoolTerm {
    fn arbitrary(g: &mut Gen) -> Self {
        let seed = u64::arbitrary(g);
        let mut rng = StdRng::seed_from_u64(seed);
        let size = g.size() % 40 + 1;
        BoolTerm(dist::PureBoolDist(size).sample(&mut rng))
    }
}

#[quickcheck]
fn hashcons_soundness(BoolTerm(t): BoolTerm) -> bool {
    // rebuilding the same structure through a second constructor sequence
    // yields the same record
    let u = import(&t);
    t.uid() == u.uid() && std::ptr::eq(t.get(), u.get())
}

#[quickcheck]
fn hashcons_completeness(BoolTerm(a): BoolTerm, BoolTerm(b): BoolTerm) -> bool {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let h = |t: &Term| {
        let mut s = DefaultHasher::new();
        t.hash(&mut s);
        s.finish()
    };
    (a == b) == (h(&a) == h(&b) && a.uid() == b.uid())
}

#[quickcheck]
fn negation_idempotent(BoolTerm(t): BoolTerm) -> bool {
    negate(&negate(&t)) == t
}

#[test]
fn negate_simplify_flips() {
    let x = var("x", Sort::Int);
    let lt = term![Op::CompOp(CompOp::Lt); x.clone(), int_lit(4)];
    assert_eq!(
        negate_simplify(&lt),
        term![Op::CompOp(CompOp::Ge); x, int_lit(4)]
    );
    assert_eq!(negate_simplify(&bool_lit(true)), bool_lit(false));
    let a = var("a", Sort::Bool);
    assert_eq!(negate_simplify(&negate_simplify(&a)), a);
}

fn t() -> Term {
    let v = var("b", Sort::BitVector(4));
    term![
        Op::BvExtract(0, 0);
        term![
            Op::BvConcat;
            v,
            term![Op::BvUnOp(BvUnOp::Not); var("c", Sort::BitVector(1))]
        ]
    ]
}

#[test]
fn types() {
    let v = var("a", Sort::Bool);
    assert_eq!(check(&v), Sort::Bool);
    let v = var("b", Sort::BitVector(4));
    assert_eq!(check(&v), Sort::BitVector(4));
    assert_eq!(check(&t()), Sort::BitVector(1));
    let r = term![Op::CompOp(CompOp::Le); var("x", Sort::Int), int_lit(5)];
    assert_eq!(check(&r), Sort::Bool);
}

#[test]
fn range_join() {
    let lo = Some(Integer::from(0));
    let hi = Some(Integer::from(7));
    let x = var("rx", Sort::IntRange(lo.clone(), hi.clone()));
    // a subrange is compatible with a plain integer
    let e = term![Op::Eq; x.clone(), int_lit(3)];
    assert_eq!(check(&e), Sort::Bool);
    let i = term![Op::Ite; var("c", Sort::Bool), x, int_lit(3)];
    assert_eq!(check(&i), Sort::Int);
}

#[test]
#[should_panic]
fn ill_typed() {
    term![Op::BoolNaryOp(BoolNaryOp::And); var("a", Sort::Bool), int_lit(0)];
}

#[test]
fn traversal() {
    let tt = t();
    assert_eq!(
        vec![
            Op::Var(Var::Free {
                name: "c".to_owned(),
                sort: Sort::BitVector(1)
            }),
            Op::BvUnOp(BvUnOp::Not),
            Op::Var(Var::Free {
                name: "b".to_owned(),
                sort: Sort::BitVector(4)
            }),
            Op::BvConcat,
            Op::BvExtract(0, 0),
        ],
        PostOrderIter::new(tt)
            .map(|t| t.op.clone())
            .collect::<Vec<_>>()
    );
}

#[test]
fn eval_basics() {
    let mut env = fxhash::FxHashMap::default();
    env.insert("p".to_owned(), Value::Bool(true));
    env.insert("n".to_owned(), Value::Int(Integer::from(3)));
    let e = term![Op::Ite;
        var("p", Sort::Bool),
        term![Op::NumNaryOp(NumNaryOp::Add); var("n", Sort::Int), int_lit(4)],
        int_lit(0)
    ];
    assert_eq!(eval(&e, &env), Value::Int(Integer::from(7)));
}

#[test]
fn eval_let_unfolding() {
    let body = term![Op::NumNaryOp(NumNaryOp::Add); bound_var(0, Sort::Int), bound_var(0, Sort::Int)];
    let l = term![Op::Let; int_lit(21), body];
    assert_eq!(
        eval(&l, &fxhash::FxHashMap::default()),
        Value::Int(Integer::from(42))
    );
}

#[test]
fn destruct_binders() {
    let body = term![Op::CompOp(CompOp::Lt); bound_var(0, Sort::Int), int_lit(10)];
    let q = term![Op::Quant(Quant::Forall, vec![Sort::Int]); body.clone()];
    let l = term![Op::Let; int_lit(1), q];
    let d = destruct(&l);
    assert_eq!(d.lets, vec![int_lit(1)]);
    assert_eq!(d.quants, vec![(Quant::Forall, vec![Sort::Int])]);
    assert_eq!(d.body, body);
}

#[test]
fn named_namespaces() {
    let a = var("nmd", Sort::Bool);
    let (k1, n1) = mk_named(&a);
    let (k2, n2) = mk_named(&a);
    assert!(k2 > k1);
    assert_ne!(n1, n2);
    let u = mk_named_unsafe("grp", 0, &a);
    assert!(matches!(&u.op, Op::Named(ns, 0) if ns == "grp"));
}

#[test]
#[should_panic]
fn named_reserved() {
    mk_named_unsafe("t", 0, &var("nmd2", Sort::Bool));
}

#[test]
fn stats_move() {
    let before = store_stats();
    let fresh = var(format!("stats_{}", before.interned), Sort::Bool);
    let again = var(format!("stats_{}", before.interned), Sort::Bool);
    assert_eq!(fresh, again);
    let after = store_stats();
    assert!(after.interned > before.interned);
    assert!(after.hits > before.hits);
}

#[test]
fn map_and_shift_depth() {
    // replace free var "m" by the innermost bound var, shifted at depth
    let inner = term![Op::NumNaryOp(NumNaryOp::Add); var("m", Sort::Int), int_lit(1)];
    let l = term![Op::Let; int_lit(5), inner];
    let mapped = map_and_shift(
        &mut |depth, t| match &t.op {
            Op::Var(Var::Free { name, sort }) if name == "m" => {
                Some(bound_var(depth, sort.clone()))
            }
            _ => None,
        },
        &l,
    );
    // under one binder, "m" becomes Bound(1): it skips the let
    let want_inner =
        term![Op::NumNaryOp(NumNaryOp::Add); bound_var(1, Sort::Int), int_lit(1)];
    assert_eq!(mapped, term![Op::Let; int_lit(5), want_inner]);
}
