//! The hash-consed term representation.
//!
//! Every term is built through [term] (or [leaf_term]), which interns the
//! node in a process-wide factory: structurally equal terms share one heap
//! record and one tag ([Term::uid]), so equality and hashing are O(1).
//! Construction type-checks the application; an ill-typed application is a
//! programmer error and panics with the [TypeError].
//!
//! The store is append-only. Entries persist until process exit.

use fxhash::FxHashMap;
use hashconsing::{consign, HConsed, HashConsign, WHConsed};
use rug::{Integer, Rational};
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub mod bv;
pub mod dist;
pub mod extras;
pub mod ty;

#[cfg(test)]
mod test;

pub use crate::ir::svar::StateVar;
pub use bv::BitVector;
pub use ty::{check, check_raw, TypeError, TypeErrorReason};

/// An operator, applied to children terms.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Op {
    Ite,
    Eq,
    Distinct,
    Implies,
    Not,
    BoolNaryOp(BoolNaryOp),

    NumNaryOp(NumNaryOp),
    NumBinOp(NumBinOp),
    NumUnOp(NumUnOp),
    CompOp(CompOp),
    ToReal,
    ToInt,

    BvBinOp(BvBinOp),
    BvBinPred(BvBinPred),
    BvNaryOp(BvNaryOp),
    BvUnOp(BvUnOp),
    // high, low (zero-indexed, inclusive)
    BvExtract(usize, usize),
    BvConcat,
    // number of extra bits
    BvUext(usize),
    BvSext(usize),

    Select,
    Store,

    // children: [defn, body]; `Bound(0)` in the body is the defn
    Let,
    // one child (body); bound vars are `Bound(0..sorts.len())`
    Quant(Quant, Vec<Sort>),
    Uf(Arc<Ufun>),
    // a term tagged for interpolation-group tracking
    Named(String, usize),

    Const(Value),
    Var(Var),
}

impl Op {
    /// The arity of this operator; `None` for n-ary operators.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Op::Ite => Some(3),
            Op::Eq => Some(2),
            Op::Distinct => None,
            Op::Implies => Some(2),
            Op::Not => Some(1),
            Op::BoolNaryOp(_) => None,
            Op::NumNaryOp(_) => None,
            Op::NumBinOp(_) => Some(2),
            Op::NumUnOp(_) => Some(1),
            Op::CompOp(_) => Some(2),
            Op::ToReal => Some(1),
            Op::ToInt => Some(1),
            Op::BvBinOp(_) => Some(2),
            Op::BvBinPred(_) => Some(2),
            Op::BvNaryOp(_) => None,
            Op::BvUnOp(_) => Some(1),
            Op::BvExtract(_, _) => Some(1),
            Op::BvConcat => None,
            Op::BvUext(_) => Some(1),
            Op::BvSext(_) => Some(1),
            Op::Select => Some(2),
            Op::Store => Some(3),
            Op::Let => Some(2),
            Op::Quant(_, _) => Some(1),
            Op::Uf(f) => Some(f.args.len()),
            Op::Named(_, _) => Some(1),
            Op::Const(_) => Some(0),
            Op::Var(_) => Some(0),
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Op::Ite => write!(f, "ite"),
            Op::Eq => write!(f, "="),
            Op::Distinct => write!(f, "distinct"),
            Op::Implies => write!(f, "=>"),
            Op::Not => write!(f, "not"),
            Op::BoolNaryOp(a) => write!(f, "{}", a),
            Op::NumNaryOp(a) => write!(f, "{}", a),
            Op::NumBinOp(a) => write!(f, "{}", a),
            Op::NumUnOp(a) => write!(f, "{}", a),
            Op::CompOp(a) => write!(f, "{}", a),
            Op::ToReal => write!(f, "to_real"),
            Op::ToInt => write!(f, "to_int"),
            Op::BvBinOp(a) => write!(f, "{}", a),
            Op::BvBinPred(a) => write!(f, "{}", a),
            Op::BvNaryOp(a) => write!(f, "{}", a),
            Op::BvUnOp(a) => write!(f, "{}", a),
            Op::BvExtract(a, b) => write!(f, "extract {} {}", a, b),
            Op::BvConcat => write!(f, "concat"),
            Op::BvUext(a) => write!(f, "uext {}", a),
            Op::BvSext(a) => write!(f, "sext {}", a),
            Op::Select => write!(f, "select"),
            Op::Store => write!(f, "store"),
            Op::Let => write!(f, "let"),
            Op::Quant(Quant::Forall, _) => write!(f, "forall"),
            Op::Quant(Quant::Exists, _) => write!(f, "exists"),
            Op::Uf(u) => write!(f, "{}", u.name),
            Op::Named(ns, k) => write!(f, "named {}{}", ns, k),
            Op::Const(c) => write!(f, "{}", c),
            Op::Var(v) => write!(f, "{}", v),
        }
    }
}

/// N-ary boolean connectives.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum BoolNaryOp {
    And,
    Or,
    Xor,
}

impl Display for BoolNaryOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            BoolNaryOp::And => write!(f, "and"),
            BoolNaryOp::Or => write!(f, "or"),
            BoolNaryOp::Xor => write!(f, "xor"),
        }
    }
}

/// N-ary numeric operators, over integers or reals.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum NumNaryOp {
    Add,
    Mul,
}

impl Display for NumNaryOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            NumNaryOp::Add => write!(f, "+"),
            NumNaryOp::Mul => write!(f, "*"),
        }
    }
}

/// Binary numeric operators. `Div` is real division; `IntDiv` and `Mod`
/// are Euclidean.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum NumBinOp {
    Sub,
    Div,
    IntDiv,
    Mod,
}

impl Display for NumBinOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            NumBinOp::Sub => write!(f, "-"),
            NumBinOp::Div => write!(f, "/"),
            NumBinOp::IntDiv => write!(f, "div"),
            NumBinOp::Mod => write!(f, "mod"),
        }
    }
}

/// Unary numeric operators.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum NumUnOp {
    Neg,
    Abs,
}

impl Display for NumUnOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            NumUnOp::Neg => write!(f, "-"),
            NumUnOp::Abs => write!(f, "abs"),
        }
    }
}

/// Numeric comparison predicates.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum CompOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompOp {
    /// The comparison holding exactly when `self` does not.
    pub fn negated(&self) -> CompOp {
        match self {
            CompOp::Lt => CompOp::Ge,
            CompOp::Le => CompOp::Gt,
            CompOp::Gt => CompOp::Le,
            CompOp::Ge => CompOp::Lt,
        }
    }
}

impl Display for CompOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            CompOp::Lt => write!(f, "<"),
            CompOp::Le => write!(f, "<="),
            CompOp::Gt => write!(f, ">"),
            CompOp::Ge => write!(f, ">="),
        }
    }
}

/// Binary bit-vector operators.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum BvBinOp {
    Sub,
    Udiv,
    Urem,
    Shl,
    Ashr,
    Lshr,
}

impl Display for BvBinOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            BvBinOp::Sub => write!(f, "bvsub"),
            BvBinOp::Udiv => write!(f, "bvudiv"),
            BvBinOp::Urem => write!(f, "bvurem"),
            BvBinOp::Shl => write!(f, "bvshl"),
            BvBinOp::Ashr => write!(f, "bvashr"),
            BvBinOp::Lshr => write!(f, "bvlshr"),
        }
    }
}

/// Binary bit-vector predicates.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum BvBinPred {
    Ult,
    Ule,
    Ugt,
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl Display for BvBinPred {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            BvBinPred::Ult => write!(f, "bvult"),
            BvBinPred::Ule => write!(f, "bvule"),
            BvBinPred::Ugt => write!(f, "bvugt"),
            BvBinPred::Uge => write!(f, "bvuge"),
            BvBinPred::Slt => write!(f, "bvslt"),
            BvBinPred::Sle => write!(f, "bvsle"),
            BvBinPred::Sgt => write!(f, "bvsgt"),
            BvBinPred::Sge => write!(f, "bvsge"),
        }
    }
}

/// N-ary bit-vector operators.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum BvNaryOp {
    Add,
    Mul,
    And,
    Or,
    Xor,
}

impl Display for BvNaryOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            BvNaryOp::Add => write!(f, "bvadd"),
            BvNaryOp::Mul => write!(f, "bvmul"),
            BvNaryOp::And => write!(f, "bvand"),
            BvNaryOp::Or => write!(f, "bvor"),
            BvNaryOp::Xor => write!(f, "bvxor"),
        }
    }
}

/// Unary bit-vector operators.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum BvUnOp {
    Not,
    Neg,
}

impl Display for BvUnOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            BvUnOp::Not => write!(f, "bvnot"),
            BvUnOp::Neg => write!(f, "bvneg"),
        }
    }
}

/// Quantifier kinds.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Quant {
    Forall,
    Exists,
}

/// An uninterpreted function symbol.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Ufun {
    /// Symbol name.
    pub name: String,
    /// Argument sorts.
    pub args: Vec<Sort>,
    /// Return sort.
    pub ret: Sort,
}

/// A variable leaf.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Var {
    /// A free variable.
    Free {
        /// Name.
        name: String,
        /// Sort.
        sort: Sort,
    },
    /// A de-Bruijn-indexed bound variable.
    Bound {
        /// Binder distance.
        index: usize,
        /// Sort.
        sort: Sort,
    },
    /// A state variable at an instant offset.
    Instance {
        /// The state variable.
        svar: StateVar,
        /// Offset relative to the current instant.
        offset: i64,
    },
    /// A constant state variable (offset-independent).
    ConstSvar {
        /// The state variable.
        svar: StateVar,
    },
}

impl Var {
    /// The sort of this variable.
    pub fn sort(&self) -> Sort {
        match self {
            Var::Free { sort, .. } | Var::Bound { sort, .. } => sort.clone(),
            Var::Instance { svar, .. } | Var::ConstSvar { svar } => svar.sort().clone(),
        }
    }

    /// The state variable, if this is an instance or constant.
    pub fn svar(&self) -> Option<&StateVar> {
        match self {
            Var::Instance { svar, .. } | Var::ConstSvar { svar } => Some(svar),
            _ => None,
        }
    }
}

impl Display for Var {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Var::Free { name, .. } => write!(f, "{}", name),
            Var::Bound { index, .. } => write!(f, "%{}", index),
            Var::Instance { svar, offset } => write!(f, "{}@{}", svar.get(), offset),
            Var::ConstSvar { svar } => write!(f, "{}", svar.get()),
        }
    }
}

/// A literal value.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// Unbounded integer.
    Int(Integer),
    /// Rational real.
    Real(Rational),
    /// Signed machine integer.
    BitVector(BitVector),
    /// Unsigned machine integer.
    UBitVector(BitVector),
}

impl Value {
    /// The sort of this value.
    pub fn sort(&self) -> Sort {
        match self {
            Value::Bool(_) => Sort::Bool,
            Value::Int(_) => Sort::Int,
            Value::Real(_) => Sort::Real,
            Value::BitVector(b) => Sort::BitVector(b.width()),
            Value::UBitVector(b) => Sort::UBitVector(b.width()),
        }
    }

    #[track_caller]
    /// Unwrap a boolean.
    pub fn as_bool(&self) -> bool {
        if let Value::Bool(b) = self {
            *b
        } else {
            panic!("not a bool: {}", self)
        }
    }

    #[track_caller]
    /// Unwrap an integer.
    pub fn as_int(&self) -> &Integer {
        if let Value::Int(i) = self {
            i
        } else {
            panic!("not an int: {}", self)
        }
    }

    #[track_caller]
    /// Unwrap a real.
    pub fn as_real(&self) -> &Rational {
        if let Value::Real(r) = self {
            r
        } else {
            panic!("not a real: {}", self)
        }
    }

    #[track_caller]
    /// Unwrap a machine integer, signed or not.
    pub fn as_bv(&self) -> &BitVector {
        match self {
            Value::BitVector(b) | Value::UBitVector(b) => b,
            _ => panic!("not a bit-vector: {}", self),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::BitVector(b) => write!(f, "{}", b),
            Value::UBitVector(b) => write!(f, "{}", b),
        }
    }
}

/// An enumeration sort: a name and its ordered constructors.
#[derive(Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct EnumSort {
    /// Declared name.
    pub name: String,
    /// Constructors, in declaration order.
    pub ctors: Vec<String>,
}

impl EnumSort {
    /// The ordinal of a constructor.
    pub fn ordinal(&self, ctor: &str) -> Option<usize> {
        self.ctors.iter().position(|c| c == ctor)
    }
}

/// A scalar or array sort.
#[derive(Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum Sort {
    /// Booleans.
    Bool,
    /// Unbounded integers.
    Int,
    /// An integer subrange; open bounds are `None`.
    IntRange(Option<Integer>, Option<Integer>),
    /// Rational reals.
    Real,
    /// Signed machine integers of the given width.
    BitVector(usize),
    /// Unsigned machine integers of the given width.
    UBitVector(usize),
    /// Functional arrays: index sort, element sort.
    Array(Box<Sort>, Box<Sort>),
    /// An enumeration.
    Enum(Arc<EnumSort>),
    /// An abstract (polymorphic-parameter) sort.
    Abstract(Arc<str>),
}

impl Sort {
    /// Is this `Bool`?
    pub fn is_bool(&self) -> bool {
        matches!(self, Sort::Bool)
    }

    /// Is this an integer sort (including subranges)?
    pub fn is_int(&self) -> bool {
        matches!(self, Sort::Int | Sort::IntRange(_, _))
    }

    /// Is this a numeric sort (integer or real)?
    pub fn is_arith(&self) -> bool {
        self.is_int() || matches!(self, Sort::Real)
    }

    /// Machine-integer width and signedness, if applicable.
    pub fn bv_width(&self) -> Option<(usize, bool)> {
        match self {
            Sort::BitVector(w) => Some((*w, true)),
            Sort::UBitVector(w) => Some((*w, false)),
            _ => None,
        }
    }

    /// Forget subrange information.
    pub fn strip_range(&self) -> Sort {
        match self {
            Sort::IntRange(_, _) => Sort::Int,
            s => s.clone(),
        }
    }

    /// Number of nested array levels.
    pub fn array_depth(&self) -> usize {
        match self {
            Sort::Array(_, e) => 1 + e.array_depth(),
            _ => 0,
        }
    }

    /// Element sort of an array.
    pub fn elem_sort(&self) -> Option<&Sort> {
        match self {
            Sort::Array(_, e) => Some(e),
            _ => None,
        }
    }

    /// The least sort both operands fit, if any. Subranges widen against
    /// each other and collapse to `Int` against `Int`.
    pub fn join(&self, other: &Sort) -> Option<Sort> {
        if self == other {
            return Some(self.clone());
        }
        match (self, other) {
            (Sort::IntRange(la, ha), Sort::IntRange(lb, hb)) => Some(Sort::IntRange(
                match (la, lb) {
                    (Some(a), Some(b)) => Some(a.clone().min(b.clone())),
                    _ => None,
                },
                match (ha, hb) {
                    (Some(a), Some(b)) => Some(a.clone().max(b.clone())),
                    _ => None,
                },
            )),
            (a, b) if a.is_int() && b.is_int() => Some(Sort::Int),
            (Sort::Array(ka, va), Sort::Array(kb, vb)) => {
                let k = ka.join(kb)?;
                let v = va.join(vb)?;
                Some(Sort::Array(Box::new(k), Box::new(v)))
            }
            _ => None,
        }
    }
}

impl Display for Sort {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "bool"),
            Sort::Int => write!(f, "int"),
            Sort::IntRange(lo, hi) => {
                write!(f, "(int ")?;
                match lo {
                    Some(l) => write!(f, "{} ", l)?,
                    None => write!(f, "_ ")?,
                }
                match hi {
                    Some(h) => write!(f, "{})", h),
                    None => write!(f, "_)"),
                }
            }
            Sort::Real => write!(f, "real"),
            Sort::BitVector(n) => write!(f, "(bv {})", n),
            Sort::UBitVector(n) => write!(f, "(ubv {})", n),
            Sort::Array(k, v) => write!(f, "(array {} {})", k, v),
            Sort::Enum(e) => write!(f, "(enum {})", e.name),
            Sort::Abstract(n) => write!(f, "{}", n),
        }
    }
}

/// The interned payload of a term: an operator and its children.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TermData {
    /// Operator.
    pub op: Op,
    /// Children, in application order.
    pub cs: Vec<Term>,
}

impl Display for TermData {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.op.arity() == Some(0) {
            write!(f, "{}", self.op)
        } else {
            write!(f, "({}", self.op)?;
            for c in &self.cs {
                write!(f, " {}", c)?;
            }
            write!(f, ")")
        }
    }
}

impl Debug for TermData {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// A hash-consed term.
pub type Term = HConsed<TermData>;
/// A weak handle on a term, used as a cache key.
pub type TTerm = WHConsed<TermData>;

/// A map keyed on terms.
pub type TermMap<T> = hashconsing::coll::HConMap<Term, T>;
/// A set of terms.
pub type TermSet = hashconsing::coll::HConSet<Term>;

consign! {
    let TERM_FACTORY = consign(100) for TermData;
}

static NEXT_UID: AtomicU64 = AtomicU64::new(0);
static HITS: AtomicU64 = AtomicU64::new(0);

/// Counters over the term store, for observability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreStats {
    /// Distinct terms interned so far. The store is append-only, so this
    /// is also its peak size.
    pub interned: u64,
    /// Constructor calls answered by an existing record.
    pub hits: u64,
}

/// Read the store counters.
pub fn store_stats() -> StoreStats {
    StoreStats {
        interned: NEXT_UID.load(Ordering::Relaxed),
        hits: HITS.load(Ordering::Relaxed),
    }
}

fn mk(data: TermData) -> Term {
    let t = TERM_FACTORY.mk(data);
    let uid = t.uid();
    if uid >= NEXT_UID.load(Ordering::Relaxed) {
        NEXT_UID.store(uid + 1, Ordering::Relaxed);
    } else {
        HITS.fetch_add(1, Ordering::Relaxed);
    }
    t
}

/// Build a term with no children.
pub fn leaf_term(op: Op) -> Term {
    term(op, Vec::new())
}

#[track_caller]
/// Build a term, interning it and type-checking the application.
pub fn term(op: Op, cs: Vec<Term>) -> Term {
    if let Some(a) = op.arity() {
        assert_eq!(a, cs.len(), "wrong arity for {}", op);
    }
    let t = mk(TermData { op, cs });
    check_raw(&t).unwrap();
    t
}

#[macro_export]
/// Build a term: `term![op; child, ...]`.
macro_rules! term {
    ($x:expr; $($y:expr),+) => {
        $crate::ir::term::term($x, vec![$($y),+])
    };
}

/// A boolean literal term.
pub fn bool_lit(b: bool) -> Term {
    leaf_term(Op::Const(Value::Bool(b)))
}

/// An integer literal term.
pub fn int_lit(i: impl Into<Integer>) -> Term {
    leaf_term(Op::Const(Value::Int(i.into())))
}

/// A real literal term.
pub fn real_lit(r: Rational) -> Term {
    leaf_term(Op::Const(Value::Real(r)))
}

/// A signed machine-integer literal term.
pub fn bv_lit(uint: impl Into<Integer>, width: usize) -> Term {
    leaf_term(Op::Const(Value::BitVector(BitVector::new(
        uint.into(),
        width,
    ))))
}

/// A free variable term.
pub fn var(name: impl Into<String>, sort: Sort) -> Term {
    leaf_term(Op::Var(Var::Free {
        name: name.into(),
        sort,
    }))
}

/// A bound variable term.
pub fn bound_var(index: usize, sort: Sort) -> Term {
    leaf_term(Op::Var(Var::Bound { index, sort }))
}

/// A constant term.
pub fn const_(v: Value) -> Term {
    leaf_term(Op::Const(v))
}

impl TermData {
    /// The boolean under a constant, if any.
    pub fn as_bool_opt(&self) -> Option<bool> {
        if let Op::Const(Value::Bool(b)) = &self.op {
            Some(*b)
        } else {
            None
        }
    }

    /// The integer under a constant, if any.
    pub fn as_int_opt(&self) -> Option<&Integer> {
        if let Op::Const(Value::Int(i)) = &self.op {
            Some(i)
        } else {
            None
        }
    }

    /// Is this a variable leaf?
    pub fn is_var(&self) -> bool {
        matches!(&self.op, Op::Var(..))
    }

    /// Is this a constant leaf?
    pub fn is_const(&self) -> bool {
        matches!(&self.op, Op::Const(..))
    }
}

/// Iterates over a term's distinct subterms, children first.
pub struct PostOrderIter {
    // (children stacked, term)
    stack: Vec<(bool, Term)>,
    visited: TermSet,
}

impl PostOrderIter {
    /// Iterate the subterms of `t`.
    pub fn new(t: Term) -> Self {
        Self {
            stack: vec![(false, t)],
            visited: TermSet::new(),
        }
    }
}

impl std::iter::Iterator for PostOrderIter {
    type Item = Term;
    fn next(&mut self) -> Option<Term> {
        while let Some((children_pushed, t)) = self.stack.last() {
            if self.visited.contains(t) {
                self.stack.pop();
            } else if !children_pushed {
                self.stack.last_mut().unwrap().0 = true;
                let cs = self.stack.last().unwrap().1.cs.clone();
                self.stack.extend(cs.into_iter().map(|c| (false, c)));
            } else {
                break;
            }
        }
        self.stack.pop().map(|(_, t)| {
            self.visited.insert(t.clone());
            t
        })
    }
}

/// Evaluate a closed term under an assignment to its free variables.
///
/// Lets are unfolded lazily through a binder environment; state-variable
/// instances cannot be evaluated and panic.
pub fn eval(t: &Term, env: &FxHashMap<String, Value>) -> Value {
    let mut benv = Vec::new();
    eval_b(t, env, &mut benv)
}

fn eval_b(t: &Term, env: &FxHashMap<String, Value>, benv: &mut Vec<Value>) -> Value {
    match &t.op {
        Op::Var(Var::Free { name, .. }) => env
            .get(name)
            .unwrap_or_else(|| panic!("eval: no value for {}", name))
            .clone(),
        Op::Var(Var::Bound { index, .. }) => benv[benv.len() - 1 - index].clone(),
        Op::Var(v) => panic!("eval: cannot evaluate state-variable instance {}", v),
        Op::Const(v) => v.clone(),
        Op::Let => {
            let d = eval_b(&t.cs[0], env, benv);
            benv.push(d);
            let r = eval_b(&t.cs[1], env, benv);
            benv.pop();
            r
        }
        Op::Named(_, _) => eval_b(&t.cs[0], env, benv),
        Op::Ite => {
            if eval_b(&t.cs[0], env, benv).as_bool() {
                eval_b(&t.cs[1], env, benv)
            } else {
                eval_b(&t.cs[2], env, benv)
            }
        }
        Op::Eq => Value::Bool(eval_b(&t.cs[0], env, benv) == eval_b(&t.cs[1], env, benv)),
        Op::Distinct => {
            let vs: Vec<_> = t.cs.iter().map(|c| eval_b(c, env, benv)).collect();
            let mut all = true;
            for i in 0..vs.len() {
                for j in i + 1..vs.len() {
                    all = all && vs[i] != vs[j];
                }
            }
            Value::Bool(all)
        }
        Op::Implies => Value::Bool(
            !eval_b(&t.cs[0], env, benv).as_bool() || eval_b(&t.cs[1], env, benv).as_bool(),
        ),
        Op::Not => Value::Bool(!eval_b(&t.cs[0], env, benv).as_bool()),
        Op::BoolNaryOp(o) => {
            let vs: Vec<bool> = t.cs.iter().map(|c| eval_b(c, env, benv).as_bool()).collect();
            Value::Bool(match o {
                BoolNaryOp::And => vs.iter().all(|b| *b),
                BoolNaryOp::Or => vs.iter().any(|b| *b),
                BoolNaryOp::Xor => vs.iter().fold(false, |a, b| a ^ b),
            })
        }
        Op::NumNaryOp(o) => {
            let vs: Vec<_> = t.cs.iter().map(|c| eval_b(c, env, benv)).collect();
            match &vs[0] {
                Value::Int(_) => {
                    let is = vs.iter().map(|v| v.as_int());
                    Value::Int(match o {
                        NumNaryOp::Add => is.fold(Integer::new(), |a, b| a + b),
                        NumNaryOp::Mul => is.fold(Integer::from(1), |a, b| a * b),
                    })
                }
                _ => {
                    let rs = vs.iter().map(|v| v.as_real());
                    Value::Real(match o {
                        NumNaryOp::Add => rs.fold(Rational::new(), |a, b| a + b),
                        NumNaryOp::Mul => rs.fold(Rational::from(1), |a, b| a * b),
                    })
                }
            }
        }
        Op::NumBinOp(o) => {
            let a = eval_b(&t.cs[0], env, benv);
            let b = eval_b(&t.cs[1], env, benv);
            match (&a, o) {
                (Value::Int(_), NumBinOp::Sub) => Value::Int(Integer::from(a.as_int() - b.as_int())),
                (Value::Int(_), NumBinOp::IntDiv) => {
                    Value::Int(a.as_int().clone().div_rem_euc(b.as_int().clone()).0)
                }
                (Value::Int(_), NumBinOp::Mod) => {
                    Value::Int(a.as_int().clone().div_rem_euc(b.as_int().clone()).1)
                }
                (Value::Int(_), NumBinOp::Div) => panic!("eval: real division of integers"),
                (_, NumBinOp::Sub) => Value::Real(Rational::from(a.as_real() - b.as_real())),
                (_, NumBinOp::Div) => Value::Real(Rational::from(a.as_real() / b.as_real())),
                (_, _) => panic!("eval: {} on reals", o),
            }
        }
        Op::NumUnOp(o) => match eval_b(&t.cs[0], env, benv) {
            Value::Int(i) => Value::Int(match o {
                NumUnOp::Neg => -i,
                NumUnOp::Abs => i.abs(),
            }),
            Value::Real(r) => Value::Real(match o {
                NumUnOp::Neg => -r,
                NumUnOp::Abs => r.abs(),
            }),
            v => panic!("eval: {} of {}", o, v),
        },
        Op::CompOp(o) => {
            let a = eval_b(&t.cs[0], env, benv);
            let b = eval_b(&t.cs[1], env, benv);
            let ord = match (&a, &b) {
                (Value::Int(x), Value::Int(y)) => x.cmp(y),
                (Value::Real(x), Value::Real(y)) => x.cmp(y),
                _ => panic!("eval: {} of {} and {}", o, a, b),
            };
            Value::Bool(match o {
                CompOp::Lt => ord.is_lt(),
                CompOp::Le => ord.is_le(),
                CompOp::Gt => ord.is_gt(),
                CompOp::Ge => ord.is_ge(),
            })
        }
        Op::ToReal => Value::Real(Rational::from(eval_b(&t.cs[0], env, benv).as_int())),
        Op::ToInt => {
            let r = eval_b(&t.cs[0], env, benv);
            let (num, den) = r.as_real().clone().into_numer_denom();
            Value::Int(num.div_rem_euc(den).0)
        }
        Op::BvUnOp(o) => {
            let v = eval_b(&t.cs[0], env, benv);
            let b = v.as_bv().clone();
            rewrap_bv(
                &v,
                match o {
                    BvUnOp::Not => b.not(),
                    BvUnOp::Neg => b.neg(),
                },
            )
        }
        Op::BvBinOp(o) => {
            let va = eval_b(&t.cs[0], env, benv);
            let a = va.as_bv().clone();
            let b = eval_b(&t.cs[1], env, benv).as_bv().clone();
            rewrap_bv(
                &va,
                match o {
                    BvBinOp::Sub => a - b,
                    BvBinOp::Udiv => a.udiv(b),
                    BvBinOp::Urem => a.urem(b),
                    BvBinOp::Shl => a << b,
                    BvBinOp::Ashr => a.ashr(b),
                    BvBinOp::Lshr => a.lshr(b),
                },
            )
        }
        Op::BvNaryOp(o) => {
            let vs: Vec<_> = t.cs.iter().map(|c| eval_b(c, env, benv)).collect();
            let mut it = vs.iter().map(|v| v.as_bv().clone());
            let first = it.next().unwrap();
            let r = it.fold(first, |a, b| match o {
                BvNaryOp::Add => a + b,
                BvNaryOp::Mul => a * b,
                BvNaryOp::And => a.bitand(b),
                BvNaryOp::Or => a.bitor(b),
                BvNaryOp::Xor => a.bitxor(b),
            });
            rewrap_bv(&vs[0], r)
        }
        Op::BvBinPred(o) => {
            let a = eval_b(&t.cs[0], env, benv).as_bv().clone();
            let b = eval_b(&t.cs[1], env, benv).as_bv().clone();
            let (x, y) = match o {
                BvBinPred::Ult | BvBinPred::Ule | BvBinPred::Ugt | BvBinPred::Uge => {
                    (a.uint().clone(), b.uint().clone())
                }
                _ => (a.to_signed(), b.to_signed()),
            };
            Value::Bool(match o {
                BvBinPred::Ult | BvBinPred::Slt => x < y,
                BvBinPred::Ule | BvBinPred::Sle => x <= y,
                BvBinPred::Ugt | BvBinPred::Sgt => x > y,
                BvBinPred::Uge | BvBinPred::Sge => x >= y,
            })
        }
        Op::BvExtract(h, l) => {
            let v = eval_b(&t.cs[0], env, benv);
            let b = v.as_bv().clone();
            rewrap_bv(&v, b.extract(*h, *l))
        }
        Op::BvConcat => {
            let vs: Vec<_> = t.cs.iter().map(|c| eval_b(c, env, benv)).collect();
            let mut it = vs.iter().map(|v| v.as_bv().clone());
            let first = it.next().unwrap();
            rewrap_bv(&vs[0], it.fold(first, BitVector::concat))
        }
        Op::BvUext(n) => {
            let v = eval_b(&t.cs[0], env, benv);
            let b = v.as_bv().clone();
            rewrap_bv(&v, b.uext(*n))
        }
        Op::BvSext(n) => {
            let v = eval_b(&t.cs[0], env, benv);
            let b = v.as_bv().clone();
            rewrap_bv(&v, b.sext(*n))
        }
        o => unimplemented!("eval: {}", o),
    }
}

fn rewrap_bv(like: &Value, b: BitVector) -> Value {
    match like {
        Value::UBitVector(_) => Value::UBitVector(b),
        _ => Value::BitVector(b),
    }
}

/// Rebuild a term bottom-up.
///
/// `f` sees each node together with the number of binders crossed above
/// it, so replacements containing bound variables can be shifted;
/// returning `Some` replaces the node, `None` keeps it (with rebuilt
/// children).
pub fn map_and_shift<F>(f: &mut F, t: &Term) -> Term
where
    F: FnMut(usize, &Term) -> Option<Term>,
{
    let mut cache = FxHashMap::default();
    map_rec(f, t, 0, &mut cache)
}

fn map_rec<F>(f: &mut F, t: &Term, depth: usize, cache: &mut FxHashMap<(u64, usize), Term>) -> Term
where
    F: FnMut(usize, &Term) -> Option<Term>,
{
    if let Some(r) = cache.get(&(t.uid(), depth)) {
        return r.clone();
    }
    let r = match f(depth, t) {
        Some(nt) => nt,
        None => {
            let cs: Vec<Term> = t
                .cs
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let d = match &t.op {
                        Op::Let if i == 1 => depth + 1,
                        Op::Quant(_, sorts) => depth + sorts.len(),
                        _ => depth,
                    };
                    map_rec(f, c, d, cache)
                })
                .collect();
            if cs == t.cs {
                t.clone()
            } else {
                term(t.op.clone(), cs)
            }
        }
    };
    cache.insert((t.uid(), depth), r.clone());
    r
}
