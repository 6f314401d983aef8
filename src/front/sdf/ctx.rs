//! The typing context the surface checker supplies.
//!
//! The core never re-checks the program; it only asks the context for
//! node signatures, contract-node parameters, refinement predicates, and
//! the types of subexpressions it is about to lift into fresh locals.

use fxhash::FxHashMap;

use super::ast::{BinOp, CallExpr, Expr, ExprKind, Literal, Type, UnOp};

/// A node's input/output types, by position.
#[derive(Clone, Debug)]
pub struct NodeSig {
    /// Input types.
    pub inputs: Vec<Type>,
    /// Output types.
    pub outputs: Vec<Type>,
}

/// The typing context.
#[derive(Clone, Debug, Default)]
pub struct TypeCtx {
    /// Node and function signatures.
    pub node_sigs: FxHashMap<String, NodeSig>,
    /// Polymorphic parameters of contract nodes.
    pub contract_params: FxHashMap<String, Vec<String>>,
    /// Type arguments recorded for polymorphic node calls.
    pub node_ty_args: FxHashMap<String, Vec<Type>>,
    /// Refinement predicates attached to `(node, variable)`.
    pub refinements: FxHashMap<(String, String), Expr>,
    /// Global type aliases, for resolution during inference.
    pub aliases: FxHashMap<String, Type>,
}

impl TypeCtx {
    /// The signature of a node.
    pub fn node_sig(&self, name: &str) -> Option<&NodeSig> {
        self.node_sigs.get(name)
    }

    /// The polymorphic parameters of a contract node.
    pub fn contract_params_of(&self, name: &str) -> Option<&Vec<String>> {
        self.contract_params.get(name)
    }

    /// The refinement predicate on a node variable, if any.
    pub fn refinement_of(&self, node: &str, var: &str) -> Option<&Expr> {
        self.refinements.get(&(node.to_owned(), var.to_owned()))
    }

    /// Is this type an integer subrange?
    pub fn is_subrange(ty: &Type) -> bool {
        matches!(ty, Type::IntRange(_, _))
    }

    /// Follow alias references.
    pub fn resolve(&self, ty: &Type) -> Type {
        let mut t = ty.clone();
        let mut fuel = 64;
        while let Type::Named(n) = &t {
            match self.aliases.get(n) {
                Some(next) if fuel > 0 => {
                    fuel -= 1;
                    t = next.clone();
                }
                _ => break,
            }
        }
        t
    }

    /// The type of an expression under an identifier environment.
    ///
    /// This is synthesis over an already-checked tree: it trusts the
    /// environment and returns `None` only for identifiers it has never
    /// heard of.
    pub fn infer_type(&self, env: &FxHashMap<String, Type>, e: &Expr) -> Option<Type> {
        match &e.kind {
            ExprKind::Ident(n) => env.get(n).cloned(),
            ExprKind::Lit(Literal::Bool(_)) => Some(Type::Bool),
            ExprKind::Lit(Literal::Int(_)) => Some(Type::Int),
            ExprKind::Lit(Literal::Real(_)) => Some(Type::Real),
            ExprKind::Lit(Literal::Machine(_, w, signed)) => Some(if *signed {
                Type::Signed(*w)
            } else {
                Type::Unsigned(*w)
            }),
            ExprKind::RecordLit(name, _) => Some(Type::Named(name.clone())),
            ExprKind::TupleLit(es) => Some(Type::Tuple(
                es.iter()
                    .map(|x| self.infer_type(env, x))
                    .collect::<Option<Vec<_>>>()?,
            )),
            ExprKind::Group(es) => {
                if es.len() == 1 {
                    self.infer_type(env, &es[0])
                } else {
                    Some(Type::Tuple(
                        es.iter()
                            .map(|x| self.infer_type(env, x))
                            .collect::<Option<Vec<_>>>()?,
                    ))
                }
            }
            ExprKind::ArrayLit(es) => {
                let elem = self.infer_type(env, es.first()?)?;
                Some(Type::Array(
                    Box::new(elem),
                    Box::new(Expr::int(e.pos, es.len() as u32)),
                ))
            }
            ExprKind::ArrayConstr(v, n) => {
                let elem = self.infer_type(env, v)?;
                Some(Type::Array(Box::new(elem), n.clone()))
            }
            ExprKind::ArrayIndex(a, _) => match self.resolve(&self.infer_type(env, a)?) {
                Type::Array(elem, _) => Some(*elem),
                _ => None,
            },
            ExprKind::RecordProj(r, field) => match self.resolve(&self.infer_type(env, r)?) {
                Type::Record(_, fields) => {
                    fields.into_iter().find(|(f, _)| f == field).map(|(_, t)| t)
                }
                _ => None,
            },
            ExprKind::TupleProj(t, i) => match self.resolve(&self.infer_type(env, t)?) {
                Type::Tuple(ts) => ts.into_iter().nth(*i),
                _ => None,
            },
            ExprKind::Unary(op, a) => match op {
                UnOp::Not => Some(Type::Bool),
                UnOp::Neg => Some(arith_result(self.resolve(&self.infer_type(env, a)?))),
                UnOp::ToReal => Some(Type::Real),
                UnOp::ToInt => Some(Type::Int),
            },
            ExprKind::Binary(op, a, _) => match op {
                BinOp::And
                | BinOp::Or
                | BinOp::Xor
                | BinOp::Impl
                | BinOp::Eq
                | BinOp::Neq
                | BinOp::Lt
                | BinOp::Le
                | BinOp::Gt
                | BinOp::Ge => Some(Type::Bool),
                BinOp::Div => Some(Type::Real),
                BinOp::IntDiv | BinOp::Mod => Some(Type::Int),
                BinOp::Add | BinOp::Sub | BinOp::Mul => {
                    Some(arith_result(self.resolve(&self.infer_type(env, a)?)))
                }
            },
            ExprKind::Ite(_, t, _) => self.infer_type(env, t),
            ExprKind::Arrow(a, _) => self.infer_type(env, a),
            ExprKind::Pre(a) => self.infer_type(env, a),
            ExprKind::History(a) => self.infer_type(env, a),
            ExprKind::Call(c)
            | ExprKind::Condact { call: c, .. }
            | ExprKind::RestartEvery { call: c, .. } => self.call_type(c),
        }
    }

    fn call_type(&self, c: &CallExpr) -> Option<Type> {
        let sig = self.node_sig(&c.name)?;
        if sig.outputs.len() == 1 {
            Some(sig.outputs[0].clone())
        } else {
            Some(Type::Tuple(sig.outputs.clone()))
        }
    }
}

/// The result type of arithmetic over a numeric type: subranges widen to
/// plain integers, everything else is preserved.
fn arith_result(t: Type) -> Type {
    match t {
        Type::IntRange(_, _) => Type::Int,
        t => t,
    }
}
