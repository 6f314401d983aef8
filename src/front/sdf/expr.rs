//! The expression layer: typed pairs of terms under the source
//! language's time model.
//!
//! An [Expr] carries an `init` term (its value at the first instant) and
//! a `step` term (its value afterwards), plus a cached sort. `pre`
//! freezes the step view one instant back; `a -> b` takes its init view
//! from `a` and its step view from `b`. All constructors preserve
//! hash-consing and panic on ill-typed operands, which are programmer
//! errors here: the AST arrives type-checked.

use rug::{Integer, Rational};
use std::fmt::{self, Display, Formatter};

use crate::ir::svar::{instance, StateVar, BASE_OFFSET, CUR_OFFSET};
use crate::ir::term::*;

/// Prefix of the free running variables of array definitions.
pub const INDEX_VAR_PREFIX: &str = "__index_";

/// A typed expression: an init view, a step view, and their common sort.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Expr {
    init: Term,
    step: Term,
    sort: Sort,
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.init == self.step {
            write!(f, "{}", self.step)
        } else {
            write!(f, "({} -> {})", self.init, self.step)
        }
    }
}

/// Replace every state-variable instance offset by `offset + d`.
fn shift_offsets(t: &Term, d: i64) -> Term {
    map_and_shift(
        &mut |_, n| match &n.op {
            Op::Var(Var::Instance { svar, offset }) => Some(leaf_term(Op::Var(Var::Instance {
                svar: svar.clone(),
                offset: offset + d,
            }))),
            _ => None,
        },
        t,
    )
}

fn push_select(t: &Term, i: &Term) -> Term {
    match &t.op {
        Op::Ite => {
            let a = push_select(&t.cs[1], i);
            let b = push_select(&t.cs[2], i);
            term![Op::Ite; t.cs[0].clone(), a, b]
        }
        Op::Store => {
            let hit = term![Op::Eq; t.cs[1].clone(), i.clone()];
            let miss = push_select(&t.cs[0], i);
            term![Op::Ite; hit, t.cs[2].clone(), miss]
        }
        _ => term![Op::Select; t.clone(), i.clone()],
    }
}

impl Expr {
    /// Build from explicit views. The views must share a sort.
    pub fn from_parts(init: Term, step: Term) -> Expr {
        let si = check(&init);
        let ss = check(&step);
        let sort = si
            .join(&ss)
            .unwrap_or_else(|| panic!("expression views disagree: {} vs {}", si, ss));
        Expr { init, step, sort }
    }

    /// The init-instant view.
    pub fn init(&self) -> &Term {
        &self.init
    }

    /// The step view.
    pub fn step(&self) -> &Term {
        &self.step
    }

    /// The sort.
    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    /// Both views of a state variable.
    pub fn mk_svar(sv: &StateVar) -> Expr {
        Expr {
            init: instance(sv, BASE_OFFSET),
            step: instance(sv, CUR_OFFSET),
            sort: sv.sort().clone(),
        }
    }

    /// The state variable this expression is an undelayed instance of.
    pub fn as_svar(&self) -> Option<StateVar> {
        match &self.step.op {
            Op::Var(v) => v.svar().cloned(),
            _ => None,
        }
    }

    /// A constant expression.
    pub fn mk_value(v: Value) -> Expr {
        let t = const_(v);
        let sort = check(&t);
        Expr {
            init: t.clone(),
            step: t,
            sort,
        }
    }

    /// A boolean constant.
    pub fn mk_bool(b: bool) -> Expr {
        Expr::mk_value(Value::Bool(b))
    }

    /// An integer constant.
    pub fn mk_int(i: impl Into<Integer>) -> Expr {
        Expr::mk_value(Value::Int(i.into()))
    }

    /// A real constant.
    pub fn mk_real(r: Rational) -> Expr {
        Expr::mk_value(Value::Real(r))
    }

    /// A machine-integer constant.
    pub fn mk_machine(i: Integer, width: usize, signed: bool) -> Expr {
        let bv = BitVector::new(i, width);
        Expr::mk_value(if signed {
            Value::BitVector(bv)
        } else {
            Value::UBitVector(bv)
        })
    }

    /// The free running variable of the `k`-th enclosing array
    /// definition level.
    pub fn mk_index_var(k: usize) -> Expr {
        let t = var(format!("{}{}", INDEX_VAR_PREFIX, k), Sort::Int);
        Expr {
            init: t.clone(),
            step: t,
            sort: Sort::Int,
        }
    }

    fn lift1(&self, f: impl Fn(&Term) -> Term) -> Expr {
        let init = f(&self.init);
        let step = f(&self.step);
        let sort = check(&step);
        Expr { init, step, sort }
    }

    fn lift2(&self, other: &Expr, f: impl Fn(&Term, &Term) -> Term) -> Expr {
        let init = f(&self.init, &other.init);
        let step = f(&self.step, &other.step);
        let sort = check(&step);
        Expr { init, step, sort }
    }

    fn liftn(es: &[Expr], f: impl Fn(Vec<Term>) -> Term) -> Expr {
        let init = f(es.iter().map(|e| e.init.clone()).collect());
        let step = f(es.iter().map(|e| e.step.clone()).collect());
        let sort = check(&step);
        Expr { init, step, sort }
    }

    /// `pre e`: both views are the step view, one instant back.
    pub fn mk_pre(&self) -> Expr {
        let prev = shift_offsets(&self.step, -1);
        Expr {
            init: prev.clone(),
            step: prev,
            sort: self.sort.clone(),
        }
    }

    /// `a -> b`. Branches of different array depth are coalesced by
    /// selecting the deeper side at the enclosing running indices.
    pub fn mk_arrow(&self, other: &Expr) -> Expr {
        let (a, b) = coalesce(self.clone(), other.clone());
        let sort = a
            .sort
            .join(&b.sort)
            .unwrap_or_else(|| panic!("arrow branches disagree: {} vs {}", a.sort, b.sort));
        Expr {
            init: a.init,
            step: b.step,
            sort,
        }
    }

    /// `if c then a else b`, with the same array coalescing as arrows.
    pub fn mk_ite(c: &Expr, a: &Expr, b: &Expr) -> Expr {
        let (a, b) = coalesce(a.clone(), b.clone());
        Expr::liftn(&[c.clone(), a, b], |mut ts| {
            let b = ts.pop().unwrap();
            let a = ts.pop().unwrap();
            let c = ts.pop().unwrap();
            term![Op::Ite; c, a, b]
        })
    }

    /// Boolean negation.
    pub fn mk_not(&self) -> Expr {
        self.lift1(|t| term![Op::Not; t.clone()])
    }

    /// Conjunction.
    pub fn mk_and(es: &[Expr]) -> Expr {
        Expr::liftn(es, extras::and_terms)
    }

    /// Disjunction.
    pub fn mk_or(es: &[Expr]) -> Expr {
        Expr::liftn(es, extras::or_terms)
    }

    /// Exclusive or.
    pub fn mk_xor(&self, other: &Expr) -> Expr {
        self.lift2(other, |a, b| {
            term![Op::BoolNaryOp(BoolNaryOp::Xor); a.clone(), b.clone()]
        })
    }

    /// Implication.
    pub fn mk_impl(&self, other: &Expr) -> Expr {
        self.lift2(other, |a, b| term![Op::Implies; a.clone(), b.clone()])
    }

    /// Equality.
    pub fn mk_eq(&self, other: &Expr) -> Expr {
        self.lift2(other, |a, b| term![Op::Eq; a.clone(), b.clone()])
    }

    /// Disequality.
    pub fn mk_neq(&self, other: &Expr) -> Expr {
        self.mk_eq(other).mk_not()
    }

    fn mk_cmp(&self, other: &Expr, op: CompOp) -> Expr {
        match self.sort.bv_width() {
            Some((_, signed)) => {
                let p = match (op, signed) {
                    (CompOp::Lt, true) => BvBinPred::Slt,
                    (CompOp::Le, true) => BvBinPred::Sle,
                    (CompOp::Gt, true) => BvBinPred::Sgt,
                    (CompOp::Ge, true) => BvBinPred::Sge,
                    (CompOp::Lt, false) => BvBinPred::Ult,
                    (CompOp::Le, false) => BvBinPred::Ule,
                    (CompOp::Gt, false) => BvBinPred::Ugt,
                    (CompOp::Ge, false) => BvBinPred::Uge,
                };
                self.lift2(other, |a, b| {
                    term![Op::BvBinPred(p.clone()); a.clone(), b.clone()]
                })
            }
            None => self.lift2(other, |a, b| {
                term![Op::CompOp(op.clone()); a.clone(), b.clone()]
            }),
        }
    }

    /// Strictly less.
    pub fn mk_lt(&self, other: &Expr) -> Expr {
        self.mk_cmp(other, CompOp::Lt)
    }

    /// Less or equal.
    pub fn mk_le(&self, other: &Expr) -> Expr {
        self.mk_cmp(other, CompOp::Le)
    }

    /// Strictly greater.
    pub fn mk_gt(&self, other: &Expr) -> Expr {
        self.mk_cmp(other, CompOp::Gt)
    }

    /// Greater or equal.
    pub fn mk_ge(&self, other: &Expr) -> Expr {
        self.mk_cmp(other, CompOp::Ge)
    }

    /// Addition.
    pub fn mk_add(&self, other: &Expr) -> Expr {
        if self.sort.bv_width().is_some() {
            self.lift2(other, |a, b| {
                term![Op::BvNaryOp(BvNaryOp::Add); a.clone(), b.clone()]
            })
        } else {
            self.lift2(other, |a, b| {
                term![Op::NumNaryOp(NumNaryOp::Add); a.clone(), b.clone()]
            })
        }
    }

    /// Multiplication.
    pub fn mk_mul(&self, other: &Expr) -> Expr {
        if self.sort.bv_width().is_some() {
            self.lift2(other, |a, b| {
                term![Op::BvNaryOp(BvNaryOp::Mul); a.clone(), b.clone()]
            })
        } else {
            self.lift2(other, |a, b| {
                term![Op::NumNaryOp(NumNaryOp::Mul); a.clone(), b.clone()]
            })
        }
    }

    /// Subtraction.
    pub fn mk_sub(&self, other: &Expr) -> Expr {
        if self.sort.bv_width().is_some() {
            self.lift2(other, |a, b| {
                term![Op::BvBinOp(BvBinOp::Sub); a.clone(), b.clone()]
            })
        } else {
            self.lift2(other, |a, b| {
                term![Op::NumBinOp(NumBinOp::Sub); a.clone(), b.clone()]
            })
        }
    }

    /// Real division.
    pub fn mk_div(&self, other: &Expr) -> Expr {
        self.lift2(other, |a, b| {
            term![Op::NumBinOp(NumBinOp::Div); a.clone(), b.clone()]
        })
    }

    /// Euclidean integer division.
    pub fn mk_int_div(&self, other: &Expr) -> Expr {
        if self.sort.bv_width().is_some() {
            self.lift2(other, |a, b| {
                term![Op::BvBinOp(BvBinOp::Udiv); a.clone(), b.clone()]
            })
        } else {
            self.lift2(other, |a, b| {
                term![Op::NumBinOp(NumBinOp::IntDiv); a.clone(), b.clone()]
            })
        }
    }

    /// Euclidean remainder.
    pub fn mk_mod(&self, other: &Expr) -> Expr {
        if self.sort.bv_width().is_some() {
            self.lift2(other, |a, b| {
                term![Op::BvBinOp(BvBinOp::Urem); a.clone(), b.clone()]
            })
        } else {
            self.lift2(other, |a, b| {
                term![Op::NumBinOp(NumBinOp::Mod); a.clone(), b.clone()]
            })
        }
    }

    /// Numeric negation.
    pub fn mk_neg(&self) -> Expr {
        if self.sort.bv_width().is_some() {
            self.lift1(|t| term![Op::BvUnOp(BvUnOp::Neg); t.clone()])
        } else {
            self.lift1(|t| term![Op::NumUnOp(NumUnOp::Neg); t.clone()])
        }
    }

    /// Integer-to-real cast.
    pub fn mk_to_real(&self) -> Expr {
        self.lift1(|t| term![Op::ToReal; t.clone()])
    }

    /// Real-to-integer cast.
    pub fn mk_to_int(&self) -> Expr {
        self.lift1(|t| term![Op::ToInt; t.clone()])
    }

    /// `select`, distributed under ites and stores for readability.
    pub fn mk_select_and_push(&self, idx: &Expr) -> Expr {
        self.lift2(idx, push_select)
    }

    /// `store`.
    pub fn mk_store(&self, idx: &Expr, v: &Expr) -> Expr {
        Expr::liftn(&[self.clone(), idx.clone(), v.clone()], |mut ts| {
            let v = ts.pop().unwrap();
            let i = ts.pop().unwrap();
            let a = ts.pop().unwrap();
            term![Op::Store; a, i, v]
        })
    }
}

/// Insert `select`s at the enclosing running indices on the deeper side
/// until both expressions have the same array depth.
fn coalesce(a: Expr, b: Expr) -> (Expr, Expr) {
    let da = a.sort.array_depth();
    let db = b.sort.array_depth();
    if da > db {
        (select_down(a, da - db), b)
    } else if db > da {
        let levels = db - da;
        (a, select_down(b, levels))
    } else {
        (a, b)
    }
}

fn select_down(mut e: Expr, levels: usize) -> Expr {
    for k in 0..levels {
        e = e.mk_select_and_push(&Expr::mk_index_var(k));
    }
    e
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::svar::mk_state_var;

    fn sv(name: &str, sort: Sort) -> StateVar {
        mk_state_var(name, vec!["expr_test".into()], sort, false, false, true)
    }

    #[test]
    fn svar_views() {
        let x = sv("x", Sort::Int);
        let e = Expr::mk_svar(&x);
        assert_ne!(e.init(), e.step());
        assert_eq!(e.sort(), &Sort::Int);
        assert_eq!(e.as_svar(), Some(x));
    }

    #[test]
    fn pre_shifts_back() {
        let x = sv("y", Sort::Int);
        let e = Expr::mk_svar(&x);
        let p = e.mk_pre();
        assert_eq!(p.init(), p.step());
        match &p.step().op {
            Op::Var(Var::Instance { offset, .. }) => assert_eq!(*offset, CUR_OFFSET - 1),
            o => panic!("unexpected {:?}", o),
        }
    }

    #[test]
    fn arrow_mixes_views() {
        let x = sv("ar_x", Sort::Int);
        let e = Expr::mk_svar(&x);
        let z = Expr::mk_int(0);
        let a = z.mk_arrow(&e);
        assert_eq!(a.init(), z.init());
        assert_eq!(a.step(), e.step());
    }

    #[test]
    fn ite_coalesces_arrays() {
        let arr = sv(
            "ite_arr",
            Sort::Array(Box::new(Sort::Int), Box::new(Sort::Int)),
        );
        let scalar = sv("ite_scl", Sort::Int);
        let c = sv("ite_c", Sort::Bool);
        let e = Expr::mk_ite(
            &Expr::mk_svar(&c),
            &Expr::mk_svar(&arr),
            &Expr::mk_svar(&scalar),
        );
        assert_eq!(e.sort(), &Sort::Int);
    }

    #[test]
    fn select_pushes_through_ite() {
        let k = Sort::Array(Box::new(Sort::Int), Box::new(Sort::Int));
        let a = Expr::mk_svar(&sv("psh_a", k.clone()));
        let b = Expr::mk_svar(&sv("psh_b", k));
        let c = Expr::mk_svar(&sv("psh_c", Sort::Bool));
        let ite = Expr::mk_ite(&c, &a, &b);
        let sel = ite.mk_select_and_push(&Expr::mk_int(0));
        // the select went under the ite
        assert!(matches!(&sel.step().op, Op::Ite));
    }
}
