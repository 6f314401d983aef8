//! The AST normalizer.
//!
//! Rewrites each node so that
//!
//! * the operand of every `pre` is an identifier or a constant, and every
//!   `pre` outside an arrow's right-hand side is wrapped in
//!   `oracle -> pre _`;
//! * every argument of a call is an identifier or a constant;
//! * every call sits behind fresh output identifiers, with a recorded
//!   call entry;
//! * every assertion, property, and contract item is an identifier.
//!
//! Everything the pass introduces is named off the process-wide counter
//! (`"<n>_glocal"`, `"<n>_oracle"`, `"<n>_call"`) and recorded, per node,
//! in a [GeneratedIdents] table the node generator consumes.

use fxhash::{FxHashMap, FxHashSet};
use log::{debug, trace};

use super::ast::*;
use super::ctx::TypeCtx;
use super::error::{ErrorKind, Result};
use crate::util::ns;

/// How an oracle came to be.
#[derive(Clone, Debug)]
pub enum OracleSource {
    /// The oracle guards a `pre` of this (atomic) expression; it closes
    /// over the state variable behind it.
    Seed(Expr),
    /// The oracle only has a declared type.
    Typed(Type),
}

/// A fresh unconstrained constant introduced by the normalizer.
#[derive(Clone, Debug)]
pub struct OracleDef {
    /// Generated name.
    pub name: String,
    /// Provenance.
    pub source: OracleSource,
}

/// A call lifted out of an expression.
#[derive(Clone, Debug)]
pub struct GeneratedCall {
    /// Position of the call site.
    pub pos: Pos,
    /// Generated output identifiers, one per callee output.
    pub outputs: Vec<String>,
    /// Activation-condition identifier, for clocked calls.
    pub activation: Option<String>,
    /// Restart-condition identifier.
    pub restart: Option<String>,
    /// Callee name.
    pub callee: String,
    /// Type instantiations.
    pub ty_args: Vec<Type>,
    /// Arguments; all atomic after normalization.
    pub args: Vec<Expr>,
    /// Default values while inactive, for clocked calls.
    pub defaults: Option<Vec<Expr>>,
}

/// Where a declared-type constraint comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintSite {
    /// On a node input.
    Input,
    /// On a node output.
    Output,
    /// On a local.
    Local,
    /// On a contract ghost.
    Ghost,
}

/// A lifted subrange or refinement constraint.
#[derive(Clone, Debug)]
pub struct ConstraintIdent {
    /// The generated local holding the constraint.
    pub ident: String,
    /// The constrained variable.
    pub var: String,
    /// Declaration site of the variable.
    pub site: ConstraintSite,
    /// Written by the user (`true`) or derived through an alias.
    pub original: bool,
    /// Position of the declaration.
    pub pos: Pos,
}

/// Everything the normalizer introduced for one node.
#[derive(Clone, Debug, Default)]
pub struct GeneratedIdents {
    /// Generated locals with their defining expressions, in creation
    /// order.
    pub locals: Vec<(String, Expr)>,
    /// Types of the generated locals and call outputs.
    pub local_tys: FxHashMap<String, Type>,
    /// Oracles.
    pub oracles: Vec<OracleDef>,
    /// Lifted calls, in source order.
    pub calls: Vec<GeneratedCall>,
    /// Assertions, as (position, operand identifier).
    pub asserts: Vec<(Pos, String)>,
    /// Subrange and refinement constraints.
    pub constraints: Vec<ConstraintIdent>,
    /// History variables: (fresh name, base identifier).
    pub history_vars: Vec<(String, String)>,
    /// Generated locals that hold array literals.
    pub array_literal_vars: FxHashSet<String>,
    /// Generated locals that hold lifted call arguments.
    pub node_arg_locals: FxHashSet<String>,
    /// Property names carrying a nonvacuity annotation (mode names).
    pub nonvacuity: FxHashSet<String>,
}

/// Normalize a whole program. Returns the rewritten program and the
/// per-node generated-identifier tables.
pub fn normalize(
    program: Program,
    ctx: &TypeCtx,
) -> Result<(Program, FxHashMap<String, GeneratedIdents>)> {
    let mut tables = FxHashMap::default();
    let mut global_env = FxHashMap::default();
    for d in &program {
        if let Decl::Const(c) = d {
            if let Some(ty) = const_type(ctx, &global_env, c) {
                global_env.insert(c.name.clone(), ty);
            }
        }
    }
    let program = program
        .into_iter()
        .map(|d| match d {
            Decl::Node(n) => {
                let name = n.name.clone();
                let (n, gids) = normalize_node(n, ctx, &global_env)?;
                debug!(
                    target: "front::sdf::norm",
                    "normalized {}: {} locals, {} oracles, {} calls",
                    name,
                    gids.locals.len(),
                    gids.oracles.len(),
                    gids.calls.len()
                );
                tables.insert(name, gids);
                Ok(Decl::Node(n))
            }
            d => Ok(d),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((program, tables))
}

fn const_type(ctx: &TypeCtx, env: &FxHashMap<String, Type>, c: &ConstDecl) -> Option<Type> {
    c.ty
        .clone()
        .or_else(|| c.value.as_ref().and_then(|v| ctx.infer_type(env, v)))
}

fn normalize_node(
    mut node: NodeDecl,
    ctx: &TypeCtx,
    global_env: &FxHashMap<String, Type>,
) -> Result<(NodeDecl, GeneratedIdents)> {
    let mut w = Walker {
        ctx,
        env: global_env.clone(),
        node: node.name.clone(),
        gids: GeneratedIdents::default(),
    };
    for p in node.inputs.iter().chain(node.outputs.iter()) {
        w.env.insert(p.name.clone(), p.ty.clone());
    }
    for l in &node.locals {
        match l {
            LocalDecl::Var(p) => {
                w.env.insert(p.name.clone(), p.ty.clone());
            }
            LocalDecl::Const(c) => {
                if let Some(ty) = const_type(ctx, &w.env, c) {
                    w.env.insert(c.name.clone(), ty);
                }
            }
        }
    }

    let items = std::mem::take(&mut node.items);
    node.items = items
        .into_iter()
        .map(|item| w.norm_item(item))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();

    if let Some(spec) = node.contract.take() {
        node.contract = Some(w.norm_contract(spec)?);
    }

    w.declared_constraints(&node);

    Ok((node, w.gids))
}

struct Walker<'a> {
    ctx: &'a TypeCtx,
    env: FxHashMap<String, Type>,
    node: String,
    gids: GeneratedIdents,
}

impl<'a> Walker<'a> {
    /// Lift `e` into a fresh generated local and return the identifier
    /// expression replacing it.
    fn lift_local(&mut self, e: Expr) -> Result<Expr> {
        let pos = e.pos;
        let name = ns::fresh_name(ns::GLOCAL);
        let ty = self.type_of(&e)?;
        if matches!(&e.kind, ExprKind::ArrayLit(_)) {
            self.gids.array_literal_vars.insert(name.clone());
        }
        trace!(target: "front::sdf::norm", "{}: {} := {:?}", self.node, name, e.kind);
        self.env.insert(name.clone(), ty.clone());
        self.gids.local_tys.insert(name.clone(), ty);
        self.gids.locals.push((name.clone(), e));
        Ok(Expr::ident(pos, name))
    }

    fn type_of(&self, e: &Expr) -> Result<Type> {
        self.ctx.infer_type(&self.env, e).ok_or_else(|| {
            crate::front::sdf::error::Error::new(
                ErrorKind::InvariantViolation(format!(
                    "cannot type a lifted expression in {}",
                    self.node
                )),
                e.pos,
            )
        })
    }

    /// Normalize to an atomic expression, lifting if needed.
    fn atomize(&mut self, e: Expr, guard: Option<&Expr>) -> Result<Expr> {
        let e = self.norm_expr(e, guard)?;
        if e.is_atomic() {
            Ok(e)
        } else {
            self.lift_local(e)
        }
    }

    /// Normalize to an identifier, lifting even constants.
    fn identify(&mut self, e: Expr, guard: Option<&Expr>) -> Result<Expr> {
        let e = self.norm_expr(e, guard)?;
        if e.as_ident().is_some() {
            Ok(e)
        } else {
            self.lift_local(e)
        }
    }

    /// Normalize one node item. An equation whose right-hand side is
    /// exactly a call binds the call's outputs to its left-hand
    /// identifiers and disappears.
    fn norm_item(&mut self, item: NodeItem) -> Result<Option<NodeItem>> {
        match item {
            NodeItem::Equation { pos, lhs, rhs } => {
                if let ExprKind::Call(c) = &rhs.kind {
                    let idents: Option<Vec<String>> = lhs
                        .iter()
                        .map(|i| match i {
                            LhsItem::Ident(n) => Some(n.clone()),
                            LhsItem::ArrayDef(_, _) => None,
                        })
                        .collect();
                    if let Some(idents) = idents {
                        let fits = self
                            .ctx
                            .node_sig(&c.name)
                            .map(|sig| sig.outputs.len() == idents.len())
                            .unwrap_or(false);
                        if fits {
                            self.norm_call(pos, c.clone(), None, None, None, None, Some(idents))?;
                            return Ok(None);
                        }
                    }
                }
                let rhs = self.norm_expr(rhs, None)?;
                Ok(Some(NodeItem::Equation { pos, lhs, rhs }))
            }
            NodeItem::Assert { pos, expr } => {
                let expr = self.identify(expr, None)?;
                let ident = expr.as_ident().unwrap().to_owned();
                self.gids.asserts.push((pos, ident));
                Ok(Some(NodeItem::Assert { pos, expr }))
            }
            NodeItem::Property {
                pos,
                name,
                expr,
                candidate,
            } => {
                let expr = self.identify(expr, None)?;
                Ok(Some(NodeItem::Property {
                    pos,
                    name,
                    expr,
                    candidate,
                }))
            }
            NodeItem::Main { pos } => Ok(Some(NodeItem::Main { pos })),
        }
    }

    fn norm_contract(&mut self, mut spec: ContractSpec) -> Result<ContractSpec> {
        for c in &spec.ghost_consts {
            if let Some(ty) = const_type(self.ctx, &self.env, c) {
                self.env.insert(c.name.clone(), ty);
            }
        }
        for (p, _) in &spec.ghost_vars {
            self.env.insert(p.name.clone(), p.ty.clone());
        }
        spec.ghost_vars = spec
            .ghost_vars
            .into_iter()
            .map(|(p, e)| Ok((p, self.norm_expr(e, None)?)))
            .collect::<Result<Vec<_>>>()?;
        spec.assumes = self.norm_contract_items(spec.assumes)?;
        spec.guarantees = self.norm_contract_items(spec.guarantees)?;
        spec.modes = spec
            .modes
            .into_iter()
            .map(|mut m| {
                self.gids.nonvacuity.insert(m.name.clone());
                m.requires = self.norm_items_plain(m.requires)?;
                m.ensures = self.norm_items_plain(m.ensures)?;
                Ok(m)
            })
            .collect::<Result<Vec<_>>>()?;
        spec.imports = spec
            .imports
            .into_iter()
            .map(|mut imp| {
                imp.inputs = imp
                    .inputs
                    .into_iter()
                    .map(|e| self.atomize(e, None))
                    .collect::<Result<Vec<_>>>()?;
                Ok(imp)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(spec)
    }

    fn norm_contract_items(
        &mut self,
        items: Vec<(ContractItem, bool)>,
    ) -> Result<Vec<(ContractItem, bool)>> {
        items
            .into_iter()
            .map(|(mut it, weak)| {
                it.expr = self.identify(it.expr, None)?;
                Ok((it, weak))
            })
            .collect()
    }

    fn norm_items_plain(&mut self, items: Vec<ContractItem>) -> Result<Vec<ContractItem>> {
        items
            .into_iter()
            .map(|mut it| {
                it.expr = self.identify(it.expr, None)?;
                Ok(it)
            })
            .collect()
    }

    /// Record the subrange and refinement constraints of the node's
    /// declared variables.
    fn declared_constraints(&mut self, node: &NodeDecl) {
        let mut sites: Vec<(&Param, ConstraintSite)> = Vec::new();
        for p in &node.inputs {
            sites.push((p, ConstraintSite::Input));
        }
        for p in &node.outputs {
            sites.push((p, ConstraintSite::Output));
        }
        for l in &node.locals {
            if let LocalDecl::Var(p) = l {
                sites.push((p, ConstraintSite::Local));
            }
        }
        if let Some(spec) = &node.contract {
            for (p, _) in &spec.ghost_vars {
                sites.push((p, ConstraintSite::Ghost));
            }
        }
        let mut new: Vec<(String, Expr, ConstraintIdent)> = Vec::new();
        for (p, site) in sites {
            let resolved = self.ctx.resolve(&p.ty);
            let original = TypeCtx::is_subrange(&p.ty);
            if let Type::IntRange(lo, hi) = &resolved {
                let x = || Expr::ident(p.pos, p.name.clone());
                let in_range = Expr::new(
                    p.pos,
                    ExprKind::Binary(
                        BinOp::And,
                        Box::new(Expr::new(
                            p.pos,
                            ExprKind::Binary(BinOp::Le, lo.clone(), Box::new(x())),
                        )),
                        Box::new(Expr::new(
                            p.pos,
                            ExprKind::Binary(BinOp::Le, Box::new(x()), hi.clone()),
                        )),
                    ),
                );
                let ident = ns::fresh_name(ns::GLOCAL);
                new.push((
                    ident.clone(),
                    in_range,
                    ConstraintIdent {
                        ident,
                        var: p.name.clone(),
                        site,
                        original,
                        pos: p.pos,
                    },
                ));
            }
            if let Some(pred) = self.ctx.refinement_of(&self.node, &p.name) {
                let ident = ns::fresh_name(ns::GLOCAL);
                new.push((
                    ident.clone(),
                    pred.clone(),
                    ConstraintIdent {
                        ident,
                        var: p.name.clone(),
                        site,
                        original: true,
                        pos: p.pos,
                    },
                ));
            }
        }
        for (name, expr, c) in new {
            self.env.insert(name.clone(), Type::Bool);
            self.gids.local_tys.insert(name.clone(), Type::Bool);
            self.gids.locals.push((name, expr));
            self.gids.constraints.push(c);
        }
    }

    fn norm_call(
        &mut self,
        pos: Pos,
        call: CallExpr,
        activation: Option<String>,
        restart: Option<String>,
        defaults: Option<Vec<Expr>>,
        guard: Option<&Expr>,
        preset_outputs: Option<Vec<String>>,
    ) -> Result<Expr> {
        let sig = self.ctx.node_sig(&call.name).ok_or_else(|| {
            crate::front::sdf::error::Error::new(
                ErrorKind::UnboundIdentifier(call.name.clone()),
                pos,
            )
        })?;
        let out_tys = sig.outputs.clone();
        let args = call
            .args
            .into_iter()
            .map(|a| {
                let was_atomic = a.is_atomic();
                let a = self.atomize(a, guard)?;
                if !was_atomic {
                    if let Some(n) = a.as_ident() {
                        if ns::is_generated(n) {
                            self.gids.node_arg_locals.insert(n.to_owned());
                        }
                    }
                }
                Ok(a)
            })
            .collect::<Result<Vec<_>>>()?;
        let outputs: Vec<String> = match preset_outputs {
            // an equation-level call defines its left-hand identifiers
            // directly
            Some(outs) => outs,
            None => out_tys
                .iter()
                .map(|ty| {
                    let n = ns::fresh_name(ns::CALL);
                    self.env.insert(n.clone(), ty.clone());
                    self.gids.local_tys.insert(n.clone(), ty.clone());
                    n
                })
                .collect(),
        };
        self.gids.calls.push(GeneratedCall {
            pos,
            outputs: outputs.clone(),
            activation,
            restart,
            callee: call.name,
            ty_args: call.ty_args,
            args,
            defaults,
        });
        if outputs.len() == 1 {
            Ok(Expr::ident(pos, outputs.into_iter().next().unwrap()))
        } else {
            Ok(Expr::new(
                pos,
                ExprKind::Group(
                    outputs
                        .into_iter()
                        .map(|o| Expr::ident(pos, o))
                        .collect(),
                ),
            ))
        }
    }

    fn norm_expr(&mut self, e: Expr, guard: Option<&Expr>) -> Result<Expr> {
        let pos = e.pos;
        let kind = match e.kind {
            k @ (ExprKind::Ident(_) | ExprKind::Lit(_)) => k,
            ExprKind::Arrow(a, b) => {
                let a = self.norm_expr(*a, guard)?;
                let b = self.norm_expr(*b, Some(&a))?;
                ExprKind::Arrow(Box::new(a), Box::new(b))
            }
            ExprKind::Pre(inner) => {
                let operand = self.atomize(*inner, guard)?;
                if guard.is_some() {
                    ExprKind::Pre(Box::new(operand))
                } else {
                    let ty = self.type_of(&operand)?;
                    let name = ns::fresh_name(ns::ORACLE);
                    self.env.insert(name.clone(), ty.clone());
                    self.gids.local_tys.insert(name.clone(), ty);
                    self.gids.oracles.push(OracleDef {
                        name: name.clone(),
                        source: OracleSource::Seed(operand.clone()),
                    });
                    ExprKind::Arrow(
                        Box::new(Expr::ident(pos, name)),
                        Box::new(Expr::new(pos, ExprKind::Pre(Box::new(operand)))),
                    )
                }
            }
            ExprKind::History(inner) => {
                let base = self.identify(*inner, guard)?;
                let base_ident = base.as_ident().unwrap().to_owned();
                let ty = self.type_of(&base)?;
                let name = ns::fresh_name(ns::GLOCAL);
                self.env.insert(name.clone(), ty.clone());
                self.gids.local_tys.insert(name.clone(), ty);
                self.gids.history_vars.push((name.clone(), base_ident));
                ExprKind::Ident(name)
            }
            ExprKind::Call(c) => {
                return self.norm_call(pos, c, None, None, None, guard, None);
            }
            ExprKind::Condact {
                clock,
                defaults,
                call,
            } => {
                let clock = self.identify(*clock, guard)?;
                let clock_ident = clock.as_ident().unwrap().to_owned();
                let defaults = defaults
                    .into_iter()
                    .map(|d| self.norm_expr(d, guard))
                    .collect::<Result<Vec<_>>>()?;
                return self.norm_call(pos, call, Some(clock_ident), None, Some(defaults), guard, None);
            }
            ExprKind::RestartEvery { cond, call } => {
                let cond = self.identify(*cond, guard)?;
                let cond_ident = cond.as_ident().unwrap().to_owned();
                return self.norm_call(pos, call, None, Some(cond_ident), None, guard, None);
            }
            ExprKind::ArrayLit(es) => {
                let es = es
                    .into_iter()
                    .map(|x| self.norm_expr(x, guard))
                    .collect::<Result<Vec<_>>>()?;
                return self.lift_local(Expr::new(pos, ExprKind::ArrayLit(es)));
            }
            ExprKind::RecordLit(n, fields) => ExprKind::RecordLit(
                n,
                fields
                    .into_iter()
                    .map(|(f, x)| Ok((f, self.norm_expr(x, guard)?)))
                    .collect::<Result<Vec<_>>>()?,
            ),
            ExprKind::TupleLit(es) => ExprKind::TupleLit(self.norm_all(es, guard)?),
            ExprKind::Group(es) => ExprKind::Group(self.norm_all(es, guard)?),
            ExprKind::ArrayConstr(v, n) => ExprKind::ArrayConstr(
                Box::new(self.norm_expr(*v, guard)?),
                Box::new(self.norm_expr(*n, guard)?),
            ),
            ExprKind::ArrayIndex(a, i) => ExprKind::ArrayIndex(
                Box::new(self.norm_expr(*a, guard)?),
                Box::new(self.norm_expr(*i, guard)?),
            ),
            ExprKind::RecordProj(r, f) => {
                ExprKind::RecordProj(Box::new(self.norm_expr(*r, guard)?), f)
            }
            ExprKind::TupleProj(t, i) => {
                ExprKind::TupleProj(Box::new(self.norm_expr(*t, guard)?), i)
            }
            ExprKind::Unary(op, a) => ExprKind::Unary(op, Box::new(self.norm_expr(*a, guard)?)),
            ExprKind::Binary(op, a, b) => ExprKind::Binary(
                op,
                Box::new(self.norm_expr(*a, guard)?),
                Box::new(self.norm_expr(*b, guard)?),
            ),
            ExprKind::Ite(c, t, f) => ExprKind::Ite(
                Box::new(self.norm_expr(*c, guard)?),
                Box::new(self.norm_expr(*t, guard)?),
                Box::new(self.norm_expr(*f, guard)?),
            ),
        };
        Ok(Expr::new(pos, kind))
    }

    fn norm_all(&mut self, es: Vec<Expr>, guard: Option<&Expr>) -> Result<Vec<Expr>> {
        es.into_iter()
            .map(|x| self.norm_expr(x, guard))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn p() -> Pos {
        Pos::new(1, 1)
    }

    fn int_node(items: Vec<NodeItem>) -> NodeDecl {
        NodeDecl {
            pos: p(),
            name: "n".into(),
            is_function: false,
            is_extern: false,
            opacity: crate::front::sdf::node::Opacity::Transparent,
            ty_params: vec![],
            inputs: vec![Param {
                pos: p(),
                name: "y".into(),
                ty: Type::Int,
                is_const: false,
            }],
            outputs: vec![Param {
                pos: p(),
                name: "z".into(),
                ty: Type::Int,
                is_const: false,
            }],
            locals: vec![],
            items,
            contract: None,
        }
    }

    fn eq_z(rhs: Expr) -> NodeItem {
        NodeItem::Equation {
            pos: p(),
            lhs: vec![LhsItem::Ident("z".into())],
            rhs,
        }
    }

    /// Every `pre` is inside an arrow's right child, or its guard is an
    /// oracle.
    fn pre_guarded(e: &Expr, guarded: bool) -> bool {
        match &e.kind {
            ExprKind::Pre(inner) => guarded && inner.is_atomic(),
            ExprKind::Arrow(a, b) => pre_guarded(a, guarded) && pre_guarded(b, true),
            ExprKind::Ite(c, t, f) => {
                pre_guarded(c, guarded) && pre_guarded(t, guarded) && pre_guarded(f, guarded)
            }
            ExprKind::Binary(_, a, b) => pre_guarded(a, guarded) && pre_guarded(b, guarded),
            ExprKind::Unary(_, a) => pre_guarded(a, guarded),
            _ => true,
        }
    }

    #[test]
    fn unguarded_pre_gets_oracle() {
        let _l = crate::util::testing::lock();
        let rhs = Expr::new(p(), ExprKind::Pre(Box::new(Expr::ident(p(), "y"))));
        let node = int_node(vec![eq_z(rhs)]);
        let ctx = TypeCtx::default();
        let (prog, tables) = normalize(vec![Decl::Node(node)], &ctx).unwrap();
        let gids = &tables["n"];
        assert_eq!(gids.oracles.len(), 1);
        assert!(gids.oracles[0].name.ends_with("_oracle"));
        match &prog[0] {
            Decl::Node(n) => match &n.items[0] {
                NodeItem::Equation { rhs, .. } => {
                    assert!(matches!(&rhs.kind, ExprKind::Arrow(_, _)));
                    assert!(pre_guarded(rhs, false));
                }
                _ => panic!("expected an equation"),
            },
            _ => panic!("expected a node"),
        }
    }

    #[test]
    fn guarded_pre_untouched() {
        let _l = crate::util::testing::lock();
        let rhs = Expr::new(
            p(),
            ExprKind::Arrow(
                Box::new(Expr::int(p(), 0)),
                Box::new(Expr::new(p(), ExprKind::Pre(Box::new(Expr::ident(p(), "y"))))),
            ),
        );
        let node = int_node(vec![eq_z(rhs)]);
        let ctx = TypeCtx::default();
        let (_, tables) = normalize(vec![Decl::Node(node)], &ctx).unwrap();
        assert!(tables["n"].oracles.is_empty());
    }

    #[test]
    fn pre_of_compound_is_lifted() {
        let _l = crate::util::testing::lock();
        let sum = Expr::new(
            p(),
            ExprKind::Binary(
                BinOp::Add,
                Box::new(Expr::ident(p(), "y")),
                Box::new(Expr::int(p(), 1)),
            ),
        );
        let rhs = Expr::new(
            p(),
            ExprKind::Arrow(
                Box::new(Expr::int(p(), 0)),
                Box::new(Expr::new(p(), ExprKind::Pre(Box::new(sum)))),
            ),
        );
        let node = int_node(vec![eq_z(rhs)]);
        let ctx = TypeCtx::default();
        let (prog, tables) = normalize(vec![Decl::Node(node)], &ctx).unwrap();
        let gids = &tables["n"];
        assert_eq!(gids.locals.len(), 1);
        assert_eq!(gids.local_tys[&gids.locals[0].0], Type::Int);
        match &prog[0] {
            Decl::Node(n) => match &n.items[0] {
                NodeItem::Equation { rhs, .. } => assert!(pre_guarded(rhs, false)),
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn call_arguments_become_atomic() {
        let _l = crate::util::testing::lock();
        let mut ctx = TypeCtx::default();
        ctx.node_sigs.insert(
            "f".into(),
            crate::front::sdf::ctx::NodeSig {
                inputs: vec![Type::Int],
                outputs: vec![Type::Int],
            },
        );
        let call = Expr::new(
            p(),
            ExprKind::Call(CallExpr {
                name: "f".into(),
                ty_args: vec![],
                args: vec![Expr::new(
                    p(),
                    ExprKind::Binary(
                        BinOp::Add,
                        Box::new(Expr::ident(p(), "y")),
                        Box::new(Expr::int(p(), 2)),
                    ),
                )],
            }),
        );
        let node = int_node(vec![eq_z(call)]);
        let (_, tables) = normalize(vec![Decl::Node(node)], &ctx).unwrap();
        let gids = &tables["n"];
        assert_eq!(gids.calls.len(), 1);
        let c = &gids.calls[0];
        assert_eq!(c.callee, "f");
        assert!(c.args.iter().all(|a| a.is_atomic()));
        assert_eq!(c.outputs.len(), 1);
        assert!(c.outputs[0].ends_with("_call"));
        assert_eq!(gids.node_arg_locals.len(), 1);
    }

    #[test]
    fn assertions_are_identified() {
        let _l = crate::util::testing::lock();
        let node = int_node(vec![
            eq_z(Expr::ident(p(), "y")),
            NodeItem::Assert {
                pos: p(),
                expr: Expr::new(
                    p(),
                    ExprKind::Binary(
                        BinOp::Ge,
                        Box::new(Expr::ident(p(), "y")),
                        Box::new(Expr::int(p(), 0)),
                    ),
                ),
            },
        ]);
        let ctx = TypeCtx::default();
        let (prog, tables) = normalize(vec![Decl::Node(node)], &ctx).unwrap();
        let gids = &tables["n"];
        assert_eq!(gids.asserts.len(), 1);
        match &prog[0] {
            Decl::Node(n) => match &n.items[1] {
                NodeItem::Assert { expr, .. } => {
                    assert_eq!(expr.as_ident(), Some(gids.asserts[0].1.as_str()))
                }
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn subrange_inputs_yield_constraints() {
        let _l = crate::util::testing::lock();
        let mut node = int_node(vec![eq_z(Expr::ident(p(), "y"))]);
        node.inputs[0].ty = Type::IntRange(Box::new(Expr::int(p(), 0)), Box::new(Expr::int(p(), 7)));
        let ctx = TypeCtx::default();
        let (_, tables) = normalize(vec![Decl::Node(node)], &ctx).unwrap();
        let gids = &tables["n"];
        assert_eq!(gids.constraints.len(), 1);
        let c = &gids.constraints[0];
        assert_eq!(c.site, ConstraintSite::Input);
        assert!(c.original);
        assert!(gids.locals.iter().any(|(n, _)| n == &c.ident));
    }
}
