//! The type-checked input AST.
//!
//! This is the shape the parser and surface type checker hand over: node
//! declarations with structured types, equations, assertions, properties
//! and contracts, every expression carrying its source position. This
//! crate rewrites it (normalization) and lowers it; it never builds it
//! from text.

use rug::{Integer, Rational};
use std::fmt::{self, Display, Formatter};

use super::node::Opacity;

/// A source position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pos {
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub col: u32,
}

impl Pos {
    /// A position.
    pub fn new(line: u32, col: u32) -> Self {
        Pos { line, col }
    }
}

impl Display for Pos {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A literal constant.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    /// Boolean.
    Bool(bool),
    /// Unbounded integer.
    Int(Integer),
    /// Real.
    Real(Rational),
    /// Machine integer: value, width, signedness.
    Machine(Integer, usize, bool),
}

/// A surface type.
#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    /// Booleans.
    Bool,
    /// Unbounded integers.
    Int,
    /// Reals.
    Real,
    /// An integer subrange with expression bounds.
    IntRange(Box<Expr>, Box<Expr>),
    /// Signed machine integers.
    Signed(usize),
    /// Unsigned machine integers.
    Unsigned(usize),
    /// A reference to an alias, enum, or abstract type.
    Named(String),
    /// A record, by declared name.
    Record(String, Vec<(String, Type)>),
    /// A tuple.
    Tuple(Vec<Type>),
    /// An array with an element type and a size expression.
    Array(Box<Type>, Box<Expr>),
    /// An enumeration.
    Enum(String, Vec<String>),
    /// An abstract type (a polymorphic parameter).
    Abstract(String),
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    /// Boolean negation.
    Not,
    /// Numeric negation.
    Neg,
    /// Integer-to-real cast.
    ToReal,
    /// Real-to-integer cast.
    ToInt,
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
    /// Exclusive or.
    Xor,
    /// Implication.
    Impl,
    /// Equality.
    Eq,
    /// Disequality.
    Neq,
    /// Strictly less.
    Lt,
    /// Less or equal.
    Le,
    /// Strictly greater.
    Gt,
    /// Greater or equal.
    Ge,
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Real division.
    Div,
    /// Integer division.
    IntDiv,
    /// Modulo.
    Mod,
}

/// A node call site.
#[derive(Clone, Debug, PartialEq)]
pub struct CallExpr {
    /// Callee name.
    pub name: String,
    /// Explicit type arguments, if the callee is polymorphic.
    pub ty_args: Vec<Type>,
    /// Arguments.
    pub args: Vec<Expr>,
}

/// An expression with its position.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    /// Source position.
    pub pos: Pos,
    /// The expression.
    pub kind: ExprKind,
}

/// Expression shapes.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// An identifier.
    Ident(String),
    /// A literal.
    Lit(Literal),
    /// A record literal: type name, field values.
    RecordLit(String, Vec<(String, Expr)>),
    /// A tuple literal.
    TupleLit(Vec<Expr>),
    /// An expression group (a flattened value list).
    Group(Vec<Expr>),
    /// An array literal.
    ArrayLit(Vec<Expr>),
    /// A repeated-element array: value, size.
    ArrayConstr(Box<Expr>, Box<Expr>),
    /// Array indexing.
    ArrayIndex(Box<Expr>, Box<Expr>),
    /// Record field projection.
    RecordProj(Box<Expr>, String),
    /// Tuple position projection.
    TupleProj(Box<Expr>, usize),
    /// A unary operator.
    Unary(UnOp, Box<Expr>),
    /// A binary operator.
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// If-then-else.
    Ite(Box<Expr>, Box<Expr>, Box<Expr>),
    /// The initial-value operator.
    Arrow(Box<Expr>, Box<Expr>),
    /// The one-step delay.
    Pre(Box<Expr>),
    /// The previous value of a stream, initialized to its current value.
    History(Box<Expr>),
    /// A node call.
    Call(CallExpr),
    /// A clocked call with defaults.
    Condact {
        /// Activation condition.
        clock: Box<Expr>,
        /// Values when inactive, one per callee output.
        defaults: Vec<Expr>,
        /// The call.
        call: CallExpr,
    },
    /// A call restarted every time a condition holds.
    RestartEvery {
        /// Restart condition.
        cond: Box<Expr>,
        /// The call.
        call: CallExpr,
    },
}

impl Expr {
    /// An expression at a position.
    pub fn new(pos: Pos, kind: ExprKind) -> Self {
        Expr { pos, kind }
    }

    /// An identifier expression.
    pub fn ident(pos: Pos, name: impl Into<String>) -> Self {
        Expr::new(pos, ExprKind::Ident(name.into()))
    }

    /// An integer literal expression.
    pub fn int(pos: Pos, i: impl Into<Integer>) -> Self {
        Expr::new(pos, ExprKind::Lit(Literal::Int(i.into())))
    }

    /// Is this an identifier or a literal? Normalization lifts every
    /// other shape out of `pre` and call arguments.
    pub fn is_atomic(&self) -> bool {
        matches!(&self.kind, ExprKind::Ident(_) | ExprKind::Lit(_))
    }

    /// The identifier under this expression, if it is one.
    pub fn as_ident(&self) -> Option<&str> {
        if let ExprKind::Ident(n) = &self.kind {
            Some(n)
        } else {
            None
        }
    }
}

/// A typed parameter (input, output, or local).
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// Position.
    pub pos: Pos,
    /// Name.
    pub name: String,
    /// Type.
    pub ty: Type,
    /// Constant-stream flag (inputs only).
    pub is_const: bool,
}

/// A constant declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstDecl {
    /// Position.
    pub pos: Pos,
    /// Name.
    pub name: String,
    /// Declared type, if any.
    pub ty: Option<Type>,
    /// Defining value; absent for free constants.
    pub value: Option<Expr>,
    /// Free (uninterpreted) flag.
    pub free: bool,
}

/// A local declaration inside a node.
#[derive(Clone, Debug, PartialEq)]
pub enum LocalDecl {
    /// A local stream.
    Var(Param),
    /// A node-level constant.
    Const(ConstDecl),
}

/// The left-hand side of one equation slot.
#[derive(Clone, Debug, PartialEq)]
pub enum LhsItem {
    /// A plain identifier.
    Ident(String),
    /// An array definition with running indices: `x[i, j] = ...`.
    ArrayDef(String, Vec<String>),
}

/// An item of a node body.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeItem {
    /// An equation.
    Equation {
        /// Position.
        pos: Pos,
        /// Left-hand slots.
        lhs: Vec<LhsItem>,
        /// Right-hand side.
        rhs: Expr,
    },
    /// An assertion.
    Assert {
        /// Position.
        pos: Pos,
        /// Asserted expression.
        expr: Expr,
    },
    /// A property annotation.
    Property {
        /// Position.
        pos: Pos,
        /// Optional user name.
        name: Option<String>,
        /// The property.
        expr: Expr,
        /// Candidate-invariant flag.
        candidate: bool,
    },
    /// The main-node annotation.
    Main {
        /// Position.
        pos: Pos,
    },
}

/// A named contract item (assume, guarantee, require, or ensure).
#[derive(Clone, Debug, PartialEq)]
pub struct ContractItem {
    /// Position.
    pub pos: Pos,
    /// Optional user name.
    pub name: Option<String>,
    /// The item's expression.
    pub expr: Expr,
}

/// A contract mode.
#[derive(Clone, Debug, PartialEq)]
pub struct ModeSpec {
    /// Position.
    pub pos: Pos,
    /// Mode name.
    pub name: String,
    /// Requirements.
    pub requires: Vec<ContractItem>,
    /// Guarantees under the requirements.
    pub ensures: Vec<ContractItem>,
}

/// An import of a contract node.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractImport {
    /// Position.
    pub pos: Pos,
    /// Imported contract-node name.
    pub name: String,
    /// Type instantiations for its parameters.
    pub ty_args: Vec<Type>,
    /// Actuals bound to its inputs.
    pub inputs: Vec<Expr>,
    /// Identifiers bound to its outputs.
    pub outputs: Vec<String>,
}

/// A contract specification.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ContractSpec {
    /// Ghost constants.
    pub ghost_consts: Vec<ConstDecl>,
    /// Ghost variables with their definitions.
    pub ghost_vars: Vec<(Param, Expr)>,
    /// Assumptions; the flag marks weak assumptions.
    pub assumes: Vec<(ContractItem, bool)>,
    /// Guarantees; the flag marks weak (soft) guarantees.
    pub guarantees: Vec<(ContractItem, bool)>,
    /// Modes.
    pub modes: Vec<ModeSpec>,
    /// Contract-node imports.
    pub imports: Vec<ContractImport>,
}

/// A node (or function-node) declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDecl {
    /// Position.
    pub pos: Pos,
    /// Name.
    pub name: String,
    /// Function flag: no internal state allowed.
    pub is_function: bool,
    /// Body-less (imported) flag.
    pub is_extern: bool,
    /// How much of this node its callers may see.
    pub opacity: Opacity,
    /// Polymorphic type parameters.
    pub ty_params: Vec<String>,
    /// Inputs.
    pub inputs: Vec<Param>,
    /// Outputs.
    pub outputs: Vec<Param>,
    /// Locals.
    pub locals: Vec<LocalDecl>,
    /// Body items.
    pub items: Vec<NodeItem>,
    /// Attached contract.
    pub contract: Option<ContractSpec>,
}

/// A contract-node declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractNodeDecl {
    /// Position.
    pub pos: Pos,
    /// Name.
    pub name: String,
    /// Polymorphic type parameters.
    pub ty_params: Vec<String>,
    /// Formal inputs.
    pub inputs: Vec<Param>,
    /// Formal outputs.
    pub outputs: Vec<Param>,
    /// The specification.
    pub spec: ContractSpec,
}

/// A top-level declaration.
#[derive(Clone, Debug, PartialEq)]
pub enum Decl {
    /// A type alias.
    TypeAlias {
        /// Position.
        pos: Pos,
        /// Alias name.
        name: String,
        /// Aliased type.
        ty: Type,
    },
    /// A constant.
    Const(ConstDecl),
    /// A node.
    Node(NodeDecl),
    /// A contract node.
    ContractNode(ContractNodeDecl),
}

/// A whole program.
pub type Program = Vec<Decl>;
