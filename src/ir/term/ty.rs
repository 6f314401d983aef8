//! Sort-checking.
//!
//! Every term is checked when it is constructed; results are cached in a
//! global table keyed on weak term handles, so checking a new application
//! only inspects the (already checked) children.

use super::*;
use fxhash::FxHashMap;
use lazy_static::lazy_static;
use std::sync::RwLock;

lazy_static! {
    /// Cache of all term sorts.
    pub(super) static ref TERM_TYPES: RwLock<FxHashMap<TTerm, Sort>> =
        RwLock::new(FxHashMap::default());
}

#[track_caller]
/// The sort of this term. Panics on an ill-typed application.
pub fn check(t: &Term) -> Sort {
    check_raw(t).unwrap()
}

/// Sort-check this term, validating the operands of the top application.
/// All results are stored in the global sort table.
pub fn check_raw(t: &Term) -> Result<Sort, TypeError> {
    if let Some(s) = TERM_TYPES.read().unwrap().get(&t.to_weak()) {
        return Ok(s.clone());
    }
    let tys = t
        .cs
        .iter()
        .map(check_raw)
        .collect::<Result<Vec<_>, _>>()?;
    let ty = check_app(&t.op, &tys).map_err(|reason| TypeError {
        op: t.op.clone(),
        args: tys,
        reason,
    })?;
    TERM_TYPES.write().unwrap().insert(t.to_weak(), ty.clone());
    Ok(ty)
}

fn check_app(op: &Op, tys: &[Sort]) -> Result<Sort, TypeErrorReason> {
    match (op, tys) {
        (Op::Ite, [c, a, b]) => {
            bool_or(c, "ite condition")?;
            join_or(a, b, "ite")
        }
        (Op::Eq, [a, b]) => join_or(a, b, "=").map(|_| Sort::Bool),
        (Op::Distinct, args) => {
            all_join_or(args.iter(), "distinct")?;
            Ok(Sort::Bool)
        }
        (Op::Implies, [a, b]) => {
            bool_or(a, "=>")?;
            bool_or(b, "=>").cloned()
        }
        (Op::Not, [a]) => bool_or(a, "not").cloned(),
        (Op::BoolNaryOp(_), args) => {
            for a in args {
                bool_or(a, "bool nary op")?;
            }
            Ok(Sort::Bool)
        }
        (Op::NumNaryOp(_), args) => all_arith_or(args.iter(), "numeric nary op"),
        (Op::NumBinOp(o), [a, b]) => {
            let s = all_arith_or([a, b].into_iter(), "numeric binary op")?;
            match o {
                NumBinOp::Div if s != Sort::Real => {
                    Err(TypeErrorReason::ExpectedReal(s, "real division"))
                }
                NumBinOp::IntDiv | NumBinOp::Mod if s == Sort::Real => {
                    Err(TypeErrorReason::ExpectedInt(s, "integer division"))
                }
                _ => Ok(s),
            }
        }
        (Op::NumUnOp(_), [a]) => {
            arith_or(a, "numeric unary op")?;
            Ok(a.strip_range())
        }
        (Op::CompOp(_), [a, b]) => {
            all_arith_or([a, b].into_iter(), "comparison")?;
            Ok(Sort::Bool)
        }
        (Op::ToReal, [a]) => {
            if a.is_int() {
                Ok(Sort::Real)
            } else {
                Err(TypeErrorReason::ExpectedInt(a.clone(), "to_real"))
            }
        }
        (Op::ToInt, [a]) => {
            if *a == Sort::Real {
                Ok(Sort::Int)
            } else {
                Err(TypeErrorReason::ExpectedReal(a.clone(), "to_int"))
            }
        }
        (Op::BvBinOp(_), [a, b]) => {
            bv_or(a, "bv binary op")?;
            eq_or(a, b, "bv binary op")?;
            Ok(a.clone())
        }
        (Op::BvBinPred(_), [a, b]) => {
            bv_or(a, "bv binary predicate")?;
            eq_or(a, b, "bv binary predicate")?;
            Ok(Sort::Bool)
        }
        (Op::BvNaryOp(_), args) => {
            let first = args
                .first()
                .ok_or_else(|| TypeErrorReason::EmptyNary("bv nary op".into()))?;
            bv_or(first, "bv nary op")?;
            for a in args {
                eq_or(first, a, "bv nary op")?;
            }
            Ok(first.clone())
        }
        (Op::BvUnOp(_), [a]) => {
            bv_or(a, "bv unary op")?;
            Ok(a.clone())
        }
        (Op::BvExtract(high, low), [a]) => {
            let (w, signed) = bv_or(a, "extract")?;
            if low <= high && *high < w {
                Ok(mk_bv(high - low + 1, signed))
            } else {
                Err(TypeErrorReason::OutOfBounds(format!(
                    "cannot extract bits {}..{} of a {}-bit machine integer",
                    low, high, w
                )))
            }
        }
        (Op::BvConcat, args) => {
            let mut w = 0;
            let mut signed = true;
            for (i, a) in args.iter().enumerate() {
                let (aw, s) = bv_or(a, "concat")?;
                if i == 0 {
                    signed = s;
                }
                w += aw;
            }
            if w == 0 {
                Err(TypeErrorReason::EmptyNary("concat".into()))
            } else {
                Ok(mk_bv(w, signed))
            }
        }
        (Op::BvUext(n), [a]) => {
            let (w, signed) = bv_or(a, "uext")?;
            Ok(mk_bv(w + n, signed))
        }
        (Op::BvSext(n), [a]) => {
            let (w, signed) = bv_or(a, "sext")?;
            Ok(mk_bv(w + n, signed))
        }
        (Op::Select, [a, i]) => match a {
            Sort::Array(k, v) => {
                join_or(&**k, i, "select")?;
                Ok((**v).clone())
            }
            _ => Err(TypeErrorReason::ExpectedArray(a.clone(), "select")),
        },
        (Op::Store, [a, i, x]) => match a {
            Sort::Array(k, v) => {
                join_or(&**k, i, "store")?;
                join_or(&**v, x, "store")?;
                Ok(a.clone())
            }
            _ => Err(TypeErrorReason::ExpectedArray(a.clone(), "store")),
        },
        (Op::Let, [_, b]) => Ok(b.clone()),
        (Op::Quant(_, _), [b]) => bool_or(b, "quantifier body").cloned(),
        (Op::Uf(f), args) => {
            if args.len() != f.args.len() {
                return Err(TypeErrorReason::Custom(format!(
                    "{} expects {} arguments, got {}",
                    f.name,
                    f.args.len(),
                    args.len()
                )));
            }
            for (formal, actual) in f.args.iter().zip(args.iter()) {
                join_or(formal, actual, "uf application")?;
            }
            Ok(f.ret.clone())
        }
        (Op::Named(_, _), [a]) => Ok(a.clone()),
        (Op::Const(c), []) => Ok(c.sort()),
        (Op::Var(v), []) => Ok(v.sort()),
        (_, _) => Err(TypeErrorReason::Custom(format!("bad application of {}", op))),
    }
}

fn mk_bv(w: usize, signed: bool) -> Sort {
    if signed {
        Sort::BitVector(w)
    } else {
        Sort::UBitVector(w)
    }
}

fn bool_or<'a>(a: &'a Sort, ctx: &'static str) -> Result<&'a Sort, TypeErrorReason> {
    if a.is_bool() {
        Ok(a)
    } else {
        Err(TypeErrorReason::ExpectedBool(a.clone(), ctx))
    }
}

fn arith_or<'a>(a: &'a Sort, ctx: &'static str) -> Result<&'a Sort, TypeErrorReason> {
    if a.is_arith() {
        Ok(a)
    } else {
        Err(TypeErrorReason::ExpectedArith(a.clone(), ctx))
    }
}

fn bv_or(a: &Sort, ctx: &'static str) -> Result<(usize, bool), TypeErrorReason> {
    a.bv_width()
        .ok_or_else(|| TypeErrorReason::ExpectedBv(a.clone(), ctx))
}

fn eq_or(a: &Sort, b: &Sort, ctx: &'static str) -> Result<(), TypeErrorReason> {
    if a == b {
        Ok(())
    } else {
        Err(TypeErrorReason::NotEqual(a.clone(), b.clone(), ctx))
    }
}

fn join_or(a: &Sort, b: &Sort, ctx: &'static str) -> Result<Sort, TypeErrorReason> {
    a.join(b)
        .ok_or_else(|| TypeErrorReason::NotEqual(a.clone(), b.clone(), ctx))
}

fn all_join_or<'a, I: Iterator<Item = &'a Sort>>(
    mut a: I,
    ctx: &'static str,
) -> Result<Sort, TypeErrorReason> {
    let first = a
        .next()
        .ok_or_else(|| TypeErrorReason::EmptyNary(ctx.to_owned()))?;
    let mut acc = first.clone();
    for x in a {
        acc = join_or(&acc, x, ctx)?;
    }
    Ok(acc)
}

fn all_arith_or<'a, I: Iterator<Item = &'a Sort>>(
    a: I,
    ctx: &'static str,
) -> Result<Sort, TypeErrorReason> {
    let joined = all_join_or(a, ctx)?;
    arith_or(&joined, ctx)?;
    Ok(joined.strip_range())
}

/// An ill-typed application.
#[derive(Debug, PartialEq, Eq)]
pub struct TypeError {
    /// The offending operator.
    pub op: Op,
    /// The sorts of its operands.
    pub args: Vec<Sort>,
    /// What went wrong.
    pub reason: TypeErrorReason,
}

impl Display for TypeError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "cannot apply {} to (", self.op)?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", a)?;
        }
        write!(f, "): {}", self.reason)
    }
}

impl std::error::Error for TypeError {}

/// Why an application is ill-typed.
#[derive(Debug, PartialEq, Eq)]
pub enum TypeErrorReason {
    /// Two sorts should have been compatible.
    NotEqual(Sort, Sort, &'static str),
    /// A boolean was expected.
    ExpectedBool(Sort, &'static str),
    /// A numeric sort was expected.
    ExpectedArith(Sort, &'static str),
    /// An integer sort was expected.
    ExpectedInt(Sort, &'static str),
    /// A real was expected.
    ExpectedReal(Sort, &'static str),
    /// A machine integer was expected.
    ExpectedBv(Sort, &'static str),
    /// An array was expected.
    ExpectedArray(Sort, &'static str),
    /// An n-ary operator was applied to nothing.
    EmptyNary(String),
    /// A structural index was out of bounds.
    OutOfBounds(String),
    /// Anything else.
    Custom(String),
}

impl Display for TypeErrorReason {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            TypeErrorReason::NotEqual(a, b, c) => write!(f, "{} and {} disagree in {}", a, b, c),
            TypeErrorReason::ExpectedBool(a, c) => write!(f, "expected bool, got {} in {}", a, c),
            TypeErrorReason::ExpectedArith(a, c) => {
                write!(f, "expected a numeric sort, got {} in {}", a, c)
            }
            TypeErrorReason::ExpectedInt(a, c) => write!(f, "expected int, got {} in {}", a, c),
            TypeErrorReason::ExpectedReal(a, c) => write!(f, "expected real, got {} in {}", a, c),
            TypeErrorReason::ExpectedBv(a, c) => {
                write!(f, "expected a machine integer, got {} in {}", a, c)
            }
            TypeErrorReason::ExpectedArray(a, c) => {
                write!(f, "expected an array, got {} in {}", a, c)
            }
            TypeErrorReason::EmptyNary(c) => write!(f, "empty application of {}", c),
            TypeErrorReason::OutOfBounds(m) => write!(f, "{}", m),
            TypeErrorReason::Custom(m) => write!(f, "{}", m),
        }
    }
}
