//! The node generator.
//!
//! Lowers each normalized declaration into the intermediate node model:
//! structured types flatten into index tries of scalar sorts, every leaf
//! becomes a state variable, equations expand into one scalar equation
//! per leaf, calls become call records, and contracts unfold into
//! assumption/guarantee/mode structures around a `sofar` accumulator.

use fxhash::FxHashMap;
use itertools::Itertools;
use log::{debug, trace};
use rug::Integer;
use std::sync::Arc;

use super::ast::{self, Pos};
use super::ctx::TypeCtx;
use super::error::{Error, ErrorKind, Result};
use super::expr::Expr;
use super::index::{scope_of_index, Index, Trie};
use super::node::*;
use super::norm::{ConstraintSite, GeneratedCall, GeneratedIdents, OracleSource};
use super::state::{leaf_svar_sort, CompilerState, IdentMap};
use crate::ir::svar::{mk_state_var, StateVar};
use crate::ir::term::{EnumSort, Sort};
use crate::util::ns;

/// Lower a normalized program against its generated-identifier tables.
pub fn lower(
    program: &ast::Program,
    tables: &FxHashMap<String, GeneratedIdents>,
    ctx: &TypeCtx,
) -> Result<CompilerState> {
    let mut state = CompilerState::new();
    for d in program {
        match d {
            ast::Decl::TypeAlias { name, ty, .. } => {
                if let ast::Type::Enum(ename, ctors) = ty {
                    register_enum(&mut state, ename, ctors);
                }
                state.type_aliases.insert(name.clone(), ty.clone());
            }
            ast::Decl::Const(c) => compile_global_const(&mut state, c)?,
            ast::Decl::ContractNode(cn) => {
                state.contract_nodes.insert(cn.name.clone(), cn.clone());
            }
            ast::Decl::Node(n) => {
                let gids = tables.get(&n.name).cloned().unwrap_or_default();
                NodeGen::new(&mut state, ctx, n, &gids).compile()?;
            }
        }
    }
    Ok(state)
}

/// Like [lower], but a node failing with a recoverable diagnostic is
/// skipped and reported instead of aborting its siblings. Fatal errors
/// (type mismatches, broken normalization invariants) still abort.
pub fn lower_tolerant(
    program: &ast::Program,
    tables: &FxHashMap<String, GeneratedIdents>,
    ctx: &TypeCtx,
) -> Result<(CompilerState, Vec<Error>)> {
    let mut state = CompilerState::new();
    let mut diags = Vec::new();
    for d in program {
        match d {
            ast::Decl::TypeAlias { name, ty, .. } => {
                if let ast::Type::Enum(ename, ctors) = ty {
                    register_enum(&mut state, ename, ctors);
                }
                state.type_aliases.insert(name.clone(), ty.clone());
            }
            ast::Decl::Const(c) => compile_global_const(&mut state, c)?,
            ast::Decl::ContractNode(cn) => {
                state.contract_nodes.insert(cn.name.clone(), cn.clone());
            }
            ast::Decl::Node(n) => {
                let gids = tables.get(&n.name).cloned().unwrap_or_default();
                match NodeGen::new(&mut state, ctx, n, &gids).compile() {
                    Ok(()) => {}
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => diags.push(e),
                }
            }
        }
    }
    Ok((state, diags))
}

fn register_enum(state: &mut CompilerState, name: &str, ctors: &[String]) {
    let sort = Sort::Enum(Arc::new(EnumSort {
        name: name.to_owned(),
        ctors: ctors.to_vec(),
    }));
    for (ord, ctor) in ctors.iter().enumerate() {
        let sv = mk_state_var(ctor.clone(), Vec::new(), sort.clone(), false, true, false);
        state.enum_ctors.insert(ctor.clone(), (sv, ord));
    }
}

fn compile_global_const(state: &mut CompilerState, c: &ast::ConstDecl) -> Result<()> {
    if c.free {
        let ty = c.ty.as_ref().ok_or_else(|| {
            Error::new(
                ErrorKind::UnsupportedConstruct(format!("untyped free constant {}", c.name)),
                c.pos,
            )
        })?;
        let sorts = compile_type(state, &FxHashMap::default(), ty, c.pos)?;
        let svars = sorts.map(|path, sort| {
            let name = leaf_name(&c.name, path);
            mk_state_var(name, Vec::new(), leaf_svar_sort(path, sort), false, true, true)
        });
        // a subrange on a free constant constrains it globally
        for sv in svars.values() {
            if let Sort::IntRange(lo, hi) = sv.sort() {
                let e = Expr::mk_svar(sv);
                let mut parts = Vec::new();
                if let Some(lo) = lo {
                    parts.push(Expr::mk_int(lo.clone()).mk_le(&e));
                }
                if let Some(hi) = hi {
                    parts.push(e.mk_le(&Expr::mk_int(hi.clone())));
                }
                if !parts.is_empty() {
                    state.global_constraints.push(Expr::mk_and(&parts));
                }
            }
        }
        state.free_constants.push((Vec::new(), c.name.clone(), svars));
    } else if let Some(v) = &c.value {
        state.other_constants.insert(c.name.clone(), v.clone());
    }
    Ok(())
}

/// Flattened-leaf name: the base identifier followed by the naming
/// segments of the index path.
fn leaf_name(base: &str, path: &[Index]) -> String {
    let segs = scope_of_index(path);
    if segs.is_empty() {
        base.to_owned()
    } else {
        format!("{}.{}", base, segs.join("."))
    }
}

/// Resolve a type through the local, then global, alias maps and compile
/// it into a trie of scalar sorts.
fn compile_type(
    state: &CompilerState,
    aliases: &FxHashMap<String, ast::Type>,
    ty: &ast::Type,
    pos: Pos,
) -> Result<Trie<Sort>> {
    match ty {
        ast::Type::Bool => Ok(Trie::leaf(Sort::Bool)),
        ast::Type::Int => Ok(Trie::leaf(Sort::Int)),
        ast::Type::Real => Ok(Trie::leaf(Sort::Real)),
        ast::Type::Signed(w) => Ok(Trie::leaf(Sort::BitVector(*w))),
        ast::Type::Unsigned(w) => Ok(Trie::leaf(Sort::UBitVector(*w))),
        ast::Type::IntRange(lo, hi) => Ok(Trie::leaf(Sort::IntRange(
            const_int_eval(state, lo),
            const_int_eval(state, hi),
        ))),
        ast::Type::Abstract(n) => Ok(Trie::leaf(Sort::Abstract(n.as_str().into()))),
        ast::Type::Enum(n, ctors) => Ok(Trie::leaf(Sort::Enum(Arc::new(EnumSort {
            name: n.clone(),
            ctors: ctors.clone(),
        })))),
        ast::Type::Named(n) => {
            let next = aliases
                .get(n)
                .or_else(|| state.type_aliases.get(n))
                .ok_or_else(|| Error::new(ErrorKind::UnboundIdentifier(n.clone()), pos))?;
            compile_type(state, aliases, &next.clone(), pos)
        }
        ast::Type::Record(_, fields) => {
            let mut out = Trie::new();
            for (f, fty) in fields {
                let sub = compile_type(state, aliases, fty, pos)?;
                out.merge(sub.with_prefix(Index::Record(f.clone())));
            }
            Ok(out)
        }
        ast::Type::Tuple(ts) => {
            let mut out = Trie::new();
            for (i, t) in ts.iter().enumerate() {
                let sub = compile_type(state, aliases, t, pos)?;
                out.merge(sub.with_prefix(Index::Tuple(i)));
            }
            Ok(out)
        }
        ast::Type::Array(elem, size) => {
            let sub = compile_type(state, aliases, elem, pos)?;
            let size = array_size_expr(state, size);
            Ok(sub.with_prefix(Index::ArrayVar(size)))
        }
    }
}

/// The size expression of an array type. Sizes are clamped at zero:
/// the index range is `[0, max(0, n))`.
fn array_size_expr(state: &CompilerState, size: &ast::Expr) -> Expr {
    match const_int_eval(state, size) {
        Some(n) => Expr::mk_int(n.max(Integer::ZERO)),
        None => match &size.kind {
            ast::ExprKind::Ident(n) => Expr::mk_svar(
                &state
                    .free_constants
                    .iter()
                    .find(|(_, cn, _)| cn == n)
                    .and_then(|(_, _, t)| t.get(&[]).cloned())
                    .unwrap_or_else(|| {
                        mk_state_var(n.clone(), Vec::new(), Sort::Int, false, true, true)
                    }),
            ),
            _ => Expr::mk_int(0),
        },
    }
}

/// Evaluate a constant integer expression, inlining defined constants.
fn const_int_eval(state: &CompilerState, e: &ast::Expr) -> Option<Integer> {
    match &e.kind {
        ast::ExprKind::Lit(ast::Literal::Int(i)) => Some(i.clone()),
        ast::ExprKind::Ident(n) => {
            let inner = state.other_constants.get(n)?.clone();
            const_int_eval(state, &inner)
        }
        ast::ExprKind::Unary(ast::UnOp::Neg, a) => Some(-const_int_eval(state, a)?),
        ast::ExprKind::Binary(op, a, b) => {
            let a = const_int_eval(state, a)?;
            let b = const_int_eval(state, b)?;
            match op {
                ast::BinOp::Add => Some(a + b),
                ast::BinOp::Sub => Some(a - b),
                ast::BinOp::Mul => Some(a * b),
                ast::BinOp::IntDiv if b != 0 => Some(a.div_rem_euc(b).0),
                ast::BinOp::Mod if b != 0 => Some(a.div_rem_euc(b).1),
                _ => None,
            }
        }
        _ => None,
    }
}

struct NodeGen<'a> {
    state: &'a mut CompilerState,
    ctx: &'a TypeCtx,
    decl: &'a ast::NodeDecl,
    gids: &'a GeneratedIdents,
    map: IdentMap,
    equations: Vec<Equation>,
    calls: Vec<CallRecord>,
    asserts: Vec<(Pos, StateVar)>,
    props: Vec<Property>,
    oracles: Vec<StateVar>,
    locals: Vec<Trie<StateVar>>,
    inputs_pos: Trie<StateVar>,
    outputs_pos: Trie<StateVar>,
    oracle_map: FxHashMap<StateVar, StateVar>,
    def_map: FxHashMap<StateVar, Expr>,
    assumption_svars: Vec<StateVar>,
    history_svars: std::collections::BTreeMap<Sort, Vec<StateVar>>,
    is_main: bool,
}

impl<'a> NodeGen<'a> {
    fn new(
        state: &'a mut CompilerState,
        ctx: &'a TypeCtx,
        decl: &'a ast::NodeDecl,
        gids: &'a GeneratedIdents,
    ) -> Self {
        NodeGen {
            state,
            ctx,
            decl,
            gids,
            map: IdentMap::new(),
            equations: Vec::new(),
            calls: Vec::new(),
            asserts: Vec::new(),
            props: Vec::new(),
            oracles: Vec::new(),
            locals: Vec::new(),
            inputs_pos: Trie::new(),
            outputs_pos: Trie::new(),
            oracle_map: FxHashMap::default(),
            def_map: FxHashMap::default(),
            assumption_svars: Vec::new(),
            history_svars: std::collections::BTreeMap::new(),
            is_main: false,
        }
    }

    fn err(&self, kind: ErrorKind, pos: Pos) -> Error {
        Error::new(kind, pos)
    }

    fn compile_ty(&self, ty: &ast::Type, pos: Pos) -> Result<Trie<Sort>> {
        compile_type(self.state, &self.map.ty_aliases, ty, pos)
    }

    /// Create the state variables of one identifier and bind them.
    fn compile_var(
        &mut self,
        name: &str,
        ty: &ast::Type,
        pos: Pos,
        scope: Vec<String>,
        is_input: bool,
        is_const: bool,
        for_inv_gen: bool,
        source: SvarSource,
    ) -> Result<Trie<StateVar>> {
        let sorts = self.compile_ty(ty, pos)?;
        let svars = sorts.map(|path, sort| {
            let sv = mk_state_var(
                leaf_name(name, path),
                scope.clone(),
                leaf_svar_sort(path, sort),
                is_input,
                is_const,
                for_inv_gen,
            );
            let bounds: Vec<ArrayBound> = path
                .iter()
                .filter_map(|i| match i {
                    Index::ArrayVar(size) => Some(ArrayBound::Bound(size.step().clone())),
                    _ => None,
                })
                .collect();
            if !bounds.is_empty() {
                self.map.bounds.insert(sv.clone(), bounds.clone());
                self.state.svar_bounds.insert(sv.clone(), bounds);
            }
            self.map.source.insert(sv.clone(), source);
            sv
        });
        self.map.bind(name, svars.clone());
        Ok(svars)
    }

    fn scalar_svar(&self, ident: &str, pos: Pos) -> Result<StateVar> {
        self.map
            .svars_of(ident)
            .and_then(|t| t.get(&[]))
            .cloned()
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvariantViolation(format!(
                        "no scalar state variable behind '{}'",
                        ident
                    )),
                    pos,
                )
            })
    }

    fn compile(mut self) -> Result<()> {
        let decl = self.decl;
        debug!(target: "front::sdf::gen", "compiling node {}", decl.name);

        // polymorphic parameters become abstract aliases
        let mut ty_args = Vec::new();
        for p in &decl.ty_params {
            self.map
                .ty_aliases
                .insert(p.clone(), ast::Type::Abstract(p.clone()));
            ty_args.push((p.clone(), Sort::Abstract(p.as_str().into())));
        }

        let instance_svar = mk_state_var(
            "instance",
            reserved_scope(&decl.name),
            Sort::Int,
            false,
            true,
            false,
        );
        let init_flag = mk_state_var(
            "init_flag",
            reserved_scope(&decl.name),
            Sort::Bool,
            false,
            false,
            false,
        );

        // declared variables
        for (i, p) in decl.inputs.iter().enumerate() {
            let t = self.compile_var(
                &p.name,
                &p.ty,
                p.pos,
                vec![decl.name.clone()],
                true,
                p.is_const,
                true,
                SvarSource::Input,
            )?;
            self.inputs_pos.merge(t.with_prefix(Index::List(i)));
        }
        for (i, p) in decl.outputs.iter().enumerate() {
            let t = self.compile_var(
                &p.name,
                &p.ty,
                p.pos,
                vec![decl.name.clone()],
                false,
                false,
                true,
                SvarSource::Output,
            )?;
            self.outputs_pos.merge(t.with_prefix(Index::List(i)));
        }
        for l in &decl.locals {
            match l {
                ast::LocalDecl::Var(p) => {
                    let t = self.compile_var(
                        &p.name,
                        &p.ty,
                        p.pos,
                        impl_scope(&decl.name),
                        false,
                        false,
                        true,
                        SvarSource::Local,
                    )?;
                    self.locals.push(t);
                }
                ast::LocalDecl::Const(c) => {
                    if c.free {
                        let ty = c.ty.as_ref().ok_or_else(|| {
                            self.err(
                                ErrorKind::UnsupportedConstruct(format!(
                                    "untyped free constant {}",
                                    c.name
                                )),
                                c.pos,
                            )
                        })?;
                        let t = self.compile_var(
                            &c.name,
                            ty,
                            c.pos,
                            vec![decl.name.clone()],
                            false,
                            true,
                            true,
                            SvarSource::Local,
                        )?;
                        self.state.free_constants.push((
                            vec![decl.name.clone()],
                            c.name.clone(),
                            t,
                        ));
                    } else if let Some(v) = &c.value {
                        self.state.other_constants.insert(c.name.clone(), v.clone());
                    }
                }
            }
        }

        // generated locals, constraint locals, node-argument locals
        for (name, _) in &self.gids.locals {
            let ty = self.gids.local_tys[name].clone();
            let t = self.compile_var(
                name,
                &ty,
                decl.pos,
                reserved_scope(&decl.name),
                false,
                false,
                false,
                SvarSource::Generated,
            )?;
            self.locals.push(t);
        }
        // history variables
        for (h, _) in &self.gids.history_vars {
            let ty = self.gids.local_tys[h].clone();
            let t = self.compile_var(
                h,
                &ty,
                decl.pos,
                reserved_scope(&decl.name),
                false,
                false,
                false,
                SvarSource::Generated,
            )?;
            for sv in t.values() {
                self.history_svars
                    .entry(sv.sort().clone())
                    .or_default()
                    .push(sv.clone());
            }
            self.locals.push(t);
        }

        // contract ghost variables and constants
        if let Some(spec) = &decl.contract {
            for c in &spec.ghost_consts {
                if let (Some(ty), Some(v)) = (&c.ty, &c.value) {
                    let t = self.compile_var(
                        &c.name,
                        &ty.clone(),
                        c.pos,
                        contract_scope(&decl.name, &[]),
                        false,
                        true,
                        true,
                        SvarSource::Ghost,
                    )?;
                    self.locals.push(t);
                    let rhs = self.compile_expr(&v.clone())?;
                    self.emit_equations(&c.name, c.pos, rhs)?;
                }
            }
            for (p, def) in &spec.ghost_vars {
                let t = self.compile_var(
                    &p.name,
                    &p.ty.clone(),
                    p.pos,
                    contract_scope(&decl.name, &[]),
                    false,
                    false,
                    true,
                    SvarSource::Ghost,
                )?;
                self.locals.push(t);
                let rhs = self.compile_expr(&def.clone())?;
                self.emit_equations(&p.name, p.pos, rhs)?;
            }
        }

        // oracles
        for o in &self.gids.oracles.clone() {
            let ty = match &o.source {
                OracleSource::Typed(t) => t.clone(),
                OracleSource::Seed(_) => self.gids.local_tys[&o.name].clone(),
            };
            let t = self.compile_var(
                &o.name,
                &ty,
                decl.pos,
                reserved_scope(&decl.name),
                false,
                true,
                false,
                SvarSource::Oracle,
            )?;
            for sv in t.values() {
                self.oracles.push(sv.clone());
            }
            if let OracleSource::Seed(seed) = &o.source {
                if let Some(base) = seed.as_ident() {
                    if let Some(base_t) = self.map.svars_of(base).cloned() {
                        let _ = t.fold2(&base_t, (), |(), _, osv, bsv| {
                            self.oracle_map.insert(osv.clone(), bsv.clone());
                            Ok(())
                        });
                    }
                }
            }
        }

        // calls
        for gc in &self.gids.calls.clone() {
            self.compile_call(gc)?;
        }

        // definitions of generated locals
        for (name, e) in &self.gids.locals.clone() {
            let rhs = self.compile_expr(e)?;
            self.emit_equations(name, e.pos, rhs)?;
        }
        // history accumulators: h = base -> pre base
        for (h, base) in &self.gids.history_vars.clone() {
            let base_t = self
                .map
                .exprs_of(base)
                .cloned()
                .ok_or_else(|| self.err(ErrorKind::UnboundIdentifier(base.clone()), decl.pos))?;
            let rhs = base_t.try_map(|_, b| Ok(b.mk_arrow(&b.mk_pre())))?;
            self.emit_equations(h, decl.pos, rhs)?;
        }

        // node items
        for item in &decl.items {
            self.compile_item(item)?;
        }

        // contract
        let mut contract = self.compile_contract()?;

        // declared-type constraints
        self.compile_constraints(&mut contract)?;

        let gids_empty = self.gids.locals.is_empty() && self.gids.calls.is_empty();
        trace!(
            target: "front::sdf::gen",
            "{}: {} equations, {} calls{}",
            decl.name,
            self.equations.len(),
            self.calls.len(),
            if gids_empty { " (no generated idents)" } else { "" }
        );

        let node = Node {
            name: decl.name.clone(),
            is_extern: decl.is_extern,
            opacity: decl.opacity,
            ty_args,
            instance_svar,
            init_flag,
            inputs: std::mem::take(&mut self.inputs_pos),
            outputs: std::mem::take(&mut self.outputs_pos),
            locals: std::mem::take(&mut self.locals),
            oracles: std::mem::take(&mut self.oracles),
            equations: std::mem::take(&mut self.equations),
            calls: std::mem::take(&mut self.calls),
            asserts: std::mem::take(&mut self.asserts),
            props: std::mem::take(&mut self.props),
            contract,
            is_main: self.is_main,
            is_function: decl.is_function,
            source_map: std::mem::take(&mut self.map.source),
            oracle_map: std::mem::take(&mut self.oracle_map),
            def_map: std::mem::take(&mut self.def_map),
            assumption_svars: std::mem::take(&mut self.assumption_svars),
            history_svars: std::mem::take(&mut self.history_svars),
        };
        self.state.nodes.insert(0, node);
        Ok(())
    }

    /// Expand one identifier-defining trie of expressions into scalar
    /// equations.
    fn emit_equations(&mut self, ident: &str, pos: Pos, rhs: Trie<Expr>) -> Result<()> {
        let lhs = self
            .map
            .svars_of(ident)
            .cloned()
            .ok_or_else(|| self.err(ErrorKind::UnboundIdentifier(ident.to_owned()), pos))?;
        self.expand_tuple(lhs, rhs, pos)
    }

    // ------------------------------------------------------------------
    // expressions

    fn compile_expr(&mut self, e: &ast::Expr) -> Result<Trie<Expr>> {
        let pos = e.pos;
        match &e.kind {
            ast::ExprKind::Ident(n) => self.compile_ident(n, pos),
            ast::ExprKind::Lit(l) => Ok(Trie::leaf(lit_expr(l))),
            ast::ExprKind::RecordLit(_, fields) => {
                let mut out = Trie::new();
                for (f, v) in fields {
                    let sub = self.compile_expr(v)?;
                    out.merge(sub.with_prefix(Index::Record(f.clone())));
                }
                Ok(out)
            }
            ast::ExprKind::TupleLit(es) => {
                let mut out = Trie::new();
                for (i, x) in es.iter().enumerate() {
                    let sub = self.compile_expr(x)?;
                    out.merge(sub.with_prefix(Index::Tuple(i)));
                }
                Ok(out)
            }
            ast::ExprKind::Group(es) => {
                let mut out = Trie::new();
                for (i, x) in es.iter().enumerate() {
                    let sub = self.compile_expr(x)?;
                    out.merge(sub.with_prefix(Index::List(i)));
                }
                Ok(out)
            }
            ast::ExprKind::ArrayLit(es) => {
                let mut out = Trie::new();
                for (i, x) in es.iter().enumerate() {
                    let sub = self.compile_expr(x)?;
                    out.merge(sub.with_prefix(Index::ArrayInt(i)));
                }
                Ok(out)
            }
            ast::ExprKind::ArrayConstr(v, n) => {
                let sub = self.compile_expr(v)?;
                let size = array_size_expr(self.state, n);
                Ok(sub.with_prefix(Index::ArrayVar(size)))
            }
            ast::ExprKind::ArrayIndex(a, i) => {
                let arr = self.compile_expr(a)?;
                let it = self.compile_expr(i)?;
                let idx = self.scalar(it, pos)?;
                self.compile_array_index(arr, idx, pos)
            }
            ast::ExprKind::RecordProj(r, f) => {
                let t = self.compile_expr(r)?;
                let sub = t.find_prefix(&[Index::Record(f.clone())]);
                if sub.is_empty() {
                    Err(self.err(ErrorKind::UnboundIdentifier(format!(".{}", f)), pos))
                } else {
                    Ok(sub)
                }
            }
            ast::ExprKind::TupleProj(tup, i) => {
                let t = self.compile_expr(tup)?;
                let sub = t.find_prefix(&[Index::Tuple(*i)]);
                if sub.is_empty() {
                    Err(self.err(ErrorKind::UnboundIdentifier(format!(".{}", i)), pos))
                } else {
                    Ok(sub)
                }
            }
            ast::ExprKind::Unary(op, a) => {
                let t = self.compile_expr(a)?;
                t.try_map(|_, x| {
                    Ok(match op {
                        ast::UnOp::Not => x.mk_not(),
                        ast::UnOp::Neg => x.mk_neg(),
                        ast::UnOp::ToReal => x.mk_to_real(),
                        ast::UnOp::ToInt => x.mk_to_int(),
                    })
                })
            }
            ast::ExprKind::Binary(op, a, b) => {
                let ta = self.compile_expr(a)?;
                let tb = self.compile_expr(b)?;
                self.compile_binary(*op, ta, tb, pos)
            }
            ast::ExprKind::Ite(c, t, f) => {
                let ct = self.compile_expr(c)?;
                let c = self.scalar(ct, pos)?;
                let tt = self.compile_expr(t)?;
                let tf = self.compile_expr(f)?;
                self.branch2(tt, tf, pos, |a, b| Ok(Expr::mk_ite(&c, a, b)))
            }
            ast::ExprKind::Arrow(a, b) => {
                let ta = self.compile_expr(a)?;
                let tb = self.compile_expr(b)?;
                self.branch2(ta, tb, pos, |x, y| Ok(x.mk_arrow(y)))
            }
            ast::ExprKind::Pre(x) => {
                if !x.is_atomic() {
                    return Err(self.err(
                        ErrorKind::InvariantViolation(
                            "pre of a non-atomic expression survived normalization".into(),
                        ),
                        pos,
                    ));
                }
                let t = self.compile_expr(x)?;
                Ok(t.map(|_, e| e.mk_pre()))
            }
            ast::ExprKind::History(_) => Err(self.err(
                ErrorKind::InvariantViolation("history survived normalization".into()),
                pos,
            )),
            ast::ExprKind::Call(_)
            | ast::ExprKind::Condact { .. }
            | ast::ExprKind::RestartEvery { .. } => Err(self.err(
                ErrorKind::InvariantViolation("a call survived normalization".into()),
                pos,
            )),
        }
    }

    fn compile_ident(&mut self, n: &str, pos: Pos) -> Result<Trie<Expr>> {
        if let Some(e) = self.map.array_index.get(n) {
            return Ok(Trie::leaf(e.clone()));
        }
        if let Some(t) = self.map.exprs_of(n) {
            return Ok(t.clone());
        }
        // free constants: node scope first, then global
        let node_scope = vec![self.decl.name.clone()];
        for want_scope in [node_scope.as_slice(), &[][..]] {
            if let Some((_, _, t)) = self
                .state
                .free_constants
                .iter()
                .find(|(s, cn, _)| cn == n && s.as_slice() == want_scope)
            {
                return Ok(t.map(|_, sv| Expr::mk_svar(sv)));
            }
        }
        if let Some(e) = self.state.other_constants.get(n).cloned() {
            return self.compile_expr(&e);
        }
        if let Some((sv, _)) = self.state.enum_ctors.get(n) {
            return Ok(Trie::leaf(Expr::mk_svar(&sv.clone())));
        }
        Err(self.err(ErrorKind::UnboundIdentifier(n.to_owned()), pos))
    }

    fn scalar(&self, t: Trie<Expr>, pos: Pos) -> Result<Expr> {
        t.get(&[]).cloned().ok_or_else(|| {
            self.err(
                ErrorKind::ShapeMismatch {
                    lhs: "ε".into(),
                    rhs: t.keys().map(|k| super::index::render_path(k)).join(", "),
                },
                pos,
            )
        })
    }

    fn compile_array_index(&self, arr: Trie<Expr>, idx: Expr, pos: Pos) -> Result<Trie<Expr>> {
        // all keys of an array-typed trie start with an array tag
        let var_level = arr.mem_prefix(&[Index::ArrayVar(Expr::mk_int(0))]);
        if var_level {
            let sub = arr.find_prefix(&[Index::ArrayVar(Expr::mk_int(0))]);
            Ok(sub.map(|_, e| e.mk_select_and_push(&idx)))
        } else if let Some(i) = idx.step().as_int_opt() {
            let i = i.to_usize().ok_or_else(|| {
                self.err(
                    ErrorKind::UnsupportedConstruct("negative array index".into()),
                    pos,
                )
            })?;
            let sub = arr.find_prefix(&[Index::ArrayInt(i)]);
            if sub.is_empty() {
                Err(self.err(
                    ErrorKind::UnboundIdentifier(format!("array position {}", i)),
                    pos,
                ))
            } else {
                Ok(sub)
            }
        } else {
            Err(self.err(
                ErrorKind::UnsupportedConstruct(
                    "symbolic indexing into an array literal".into(),
                ),
                pos,
            ))
        }
    }

    fn compile_binary(
        &mut self,
        op: ast::BinOp,
        ta: Trie<Expr>,
        tb: Trie<Expr>,
        pos: Pos,
    ) -> Result<Trie<Expr>> {
        use ast::BinOp::*;
        match op {
            Eq | Neq => {
                // structured equality folds into one boolean leaf
                let conj = ta
                    .fold2(&tb, Vec::new(), |mut acc, _, a, b| {
                        acc.push(a.mk_eq(b));
                        Ok(acc)
                    })
                    .map_err(|e| e.with_pos(pos))?;
                let all = Expr::mk_and(&conj);
                Ok(Trie::leaf(if op == Neq { all.mk_not() } else { all }))
            }
            _ => self.branch2(ta, tb, pos, |a, b| {
                Ok(match op {
                    And => Expr::mk_and(&[a.clone(), b.clone()]),
                    Or => Expr::mk_or(&[a.clone(), b.clone()]),
                    Xor => a.mk_xor(b),
                    Impl => a.mk_impl(b),
                    Lt => a.mk_lt(b),
                    Le => a.mk_le(b),
                    Gt => a.mk_gt(b),
                    Ge => a.mk_ge(b),
                    Add => a.mk_add(b),
                    Sub => a.mk_sub(b),
                    Mul => a.mk_mul(b),
                    Div => a.mk_div(b),
                    IntDiv => a.mk_int_div(b),
                    Mod => a.mk_mod(b),
                    Eq | Neq => unreachable!(),
                })
            }),
        }
    }

    /// Combine two expression tries leaf-wise. Tolerates one side being
    /// scalar while the other is structured (the expression layer
    /// coalesces array depths).
    fn branch2(
        &self,
        ta: Trie<Expr>,
        tb: Trie<Expr>,
        pos: Pos,
        f: impl Fn(&Expr, &Expr) -> Result<Expr>,
    ) -> Result<Trie<Expr>> {
        if ta.len() == 1 && ta.get(&[]).is_some() && tb.len() > 1 {
            let a = ta.get(&[]).unwrap();
            return tb.try_map(|_, b| f(a, b));
        }
        if tb.len() == 1 && tb.get(&[]).is_some() && ta.len() > 1 {
            let b = tb.get(&[]).unwrap();
            return ta.try_map(|_, a| f(a, b));
        }
        ta.map2(&tb, |_, a, b| f(a, b)).map_err(|e| e.with_pos(pos))
    }

    // ------------------------------------------------------------------
    // calls

    fn compile_call(&mut self, gc: &GeneratedCall) -> Result<()> {
        let callee = self
            .state
            .node_by_name(&gc.callee)
            .cloned()
            .ok_or_else(|| self.err(ErrorKind::UnboundIdentifier(gc.callee.clone()), gc.pos))?;

        // instantiate the callee's polymorphic parameters
        let mut inst: FxHashMap<String, Sort> = FxHashMap::default();
        for ((p, _), arg) in callee.ty_args.iter().zip(gc.ty_args.iter()) {
            let t = self.compile_ty(arg, gc.pos)?;
            let sort = t.get(&[]).cloned().ok_or_else(|| {
                self.err(
                    ErrorKind::UnsupportedConstruct(format!(
                        "structured type argument for parameter {}",
                        p
                    )),
                    gc.pos,
                )
            })?;
            inst.insert(p.clone(), sort);
        }

        // outputs: the bound identifier's state variables when the call
        // defines an equation directly, fresh ones otherwise
        let mut outputs = Trie::new();
        for (slot, out_name) in gc.outputs.iter().enumerate() {
            let svars = if let Some(t) = self.map.svars_of(out_name) {
                t.clone()
            } else {
                let sub = callee.outputs.find_prefix(&[Index::List(slot)]);
                let svars = sub.map(|path, csv| {
                    let sort = subst_abstract(csv.sort(), &inst);
                    let sv = mk_state_var(
                        leaf_name(out_name, path),
                        reserved_scope(&self.decl.name),
                        sort,
                        false,
                        false,
                        true,
                    );
                    self.map.source.insert(sv.clone(), SvarSource::Call);
                    sv
                });
                self.map.bind(out_name, svars.clone());
                self.locals.push(svars.clone());
                svars
            };
            outputs.merge(svars.with_prefix(Index::List(slot)));
        }

        // propagated oracles
        let mut call_oracles = Vec::new();
        for callee_oracle in &callee.oracles {
            let sort = subst_abstract(callee_oracle.sort(), &inst);
            let sv = mk_state_var(
                ns::fresh_name(ns::PORACLE),
                reserved_scope(&self.decl.name),
                sort,
                false,
                true,
                false,
            );
            self.map.source.insert(sv.clone(), SvarSource::Oracle);
            self.oracles.push(sv.clone());
            call_oracles.push(sv);
        }

        // inputs: argument state variables, positionally
        let mut inputs = Trie::new();
        for (slot, arg) in gc.args.iter().enumerate() {
            let t = match &arg.kind {
                ast::ExprKind::Ident(n) if self.map.svars_of(n).is_some() => {
                    self.map.svars_of(n).unwrap().clone()
                }
                ast::ExprKind::Ident(_) | ast::ExprKind::Lit(_) => {
                    // a constant argument gets its own state variable,
                    // bound by an equation
                    let t = self.compile_expr(arg)?;
                    let e = self.scalar(t, arg.pos)?;
                    let sv = mk_state_var(
                        ns::fresh_name(ns::GLOCAL),
                        reserved_scope(&self.decl.name),
                        e.sort().strip_range(),
                        false,
                        false,
                        false,
                    );
                    self.map.source.insert(sv.clone(), SvarSource::Generated);
                    self.equations.push(Equation {
                        lhs: EqLhs {
                            svar: sv.clone(),
                            bounds: Vec::new(),
                        },
                        rhs: e.clone(),
                    });
                    self.def_map.insert(sv.clone(), e);
                    Trie::leaf(sv)
                }
                _ => {
                    return Err(self.err(
                        ErrorKind::InvariantViolation(
                            "non-atomic call argument survived normalization".into(),
                        ),
                        arg.pos,
                    ))
                }
            };
            inputs.merge(t.with_prefix(Index::List(slot)));
        }

        // conditions
        let mut conds = Vec::new();
        if let Some(act) = &gc.activation {
            conds.push((CondKind::Activate, self.scalar_svar(act, gc.pos)?));
        }
        if let Some(rst) = &gc.restart {
            conds.push((CondKind::Restart, self.scalar_svar(rst, gc.pos)?));
        }

        // defaults
        let defaults = match &gc.defaults {
            None => None,
            Some(ds) => {
                let mut out = Vec::new();
                for d in ds {
                    let t = self.compile_expr(d)?;
                    out.extend(t.values().cloned());
                }
                Some(out)
            }
        };

        let id = self.state.fresh_call_id();
        self.calls.push(CallRecord {
            id,
            pos: gc.pos,
            callee: gc.callee.clone(),
            conds,
            inputs,
            oracles: call_oracles,
            outputs,
            defaults,
            inlined: callee.is_function,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // items

    fn compile_item(&mut self, item: &ast::NodeItem) -> Result<()> {
        match item {
            ast::NodeItem::Main { .. } => {
                self.is_main = true;
                Ok(())
            }
            ast::NodeItem::Assert { pos, expr } => {
                let ident = expr.as_ident().ok_or_else(|| {
                    self.err(
                        ErrorKind::InvariantViolation(
                            "assertion operand survived normalization unlifted".into(),
                        ),
                        *pos,
                    )
                })?;
                let sv = self.scalar_svar(ident, *pos)?;
                self.asserts.push((*pos, sv));
                Ok(())
            }
            ast::NodeItem::Property {
                pos,
                name,
                expr,
                candidate,
            } => {
                let ident = expr.as_ident().ok_or_else(|| {
                    self.err(
                        ErrorKind::InvariantViolation(
                            "property operand survived normalization unlifted".into(),
                        ),
                        *pos,
                    )
                })?;
                let sv = self.scalar_svar(ident, *pos)?;
                let name = name
                    .clone()
                    .unwrap_or_else(|| format!("prop_{}_{}", pos.line, pos.col));
                // a nonvacuity annotation wins over a plain property
                let kind = if self.gids.nonvacuity.contains(&name) {
                    PropertyKind::NonVacuity
                } else if *candidate {
                    PropertyKind::Candidate
                } else {
                    PropertyKind::User
                };
                self.props.push(Property {
                    svar: sv,
                    name,
                    pos: *pos,
                    kind,
                });
                Ok(())
            }
            ast::NodeItem::Equation { pos, lhs, rhs } => self.compile_equation(*pos, lhs, rhs),
        }
    }

    fn compile_equation(&mut self, pos: Pos, lhs: &[ast::LhsItem], rhs: &ast::Expr) -> Result<()> {
        self.map.array_index.clear();
        let mut lhs_trie: Trie<StateVar> = Trie::new();
        for (slot, item) in lhs.iter().enumerate() {
            let (name, idxs) = match item {
                ast::LhsItem::Ident(n) => (n, &[][..]),
                ast::LhsItem::ArrayDef(n, idxs) => (n, &idxs[..]),
            };
            for (k, idx) in idxs.iter().enumerate() {
                self.map
                    .array_index
                    .insert(idx.clone(), Expr::mk_index_var(k));
            }
            let t = self
                .map
                .svars_of(name)
                .cloned()
                .ok_or_else(|| self.err(ErrorKind::UnboundIdentifier(name.clone()), pos))?;
            lhs_trie.merge(t.with_prefix(Index::List(slot)));
        }
        let rhs_trie = self.compile_expr(rhs)?;
        let r = self.expand_tuple(lhs_trie, rhs_trie, pos);
        self.map.array_index.clear();
        r
    }

    // ------------------------------------------------------------------
    // tuple expansion

    /// Walk an LHS state-variable trie and an RHS expression trie
    /// simultaneously, emitting one scalar equation per matched leaf.
    fn expand_tuple(
        &mut self,
        lhs: Trie<StateVar>,
        rhs: Trie<Expr>,
        pos: Pos,
    ) -> Result<()> {
        if lhs.len() == rhs.len() {
            let pairs: Vec<_> = lhs
                .bindings()
                .zip(rhs.bindings())
                .map(|((lp, sv), (rp, e))| (lp.clone(), sv.clone(), rp.clone(), e.clone()))
                .collect();
            for (lp, sv, rp, e) in pairs {
                let (bounds, e) = self.match_paths(&lp, &rp, e, pos)?;
                self.def_map.insert(sv.clone(), e.clone());
                self.equations.push(Equation {
                    lhs: EqLhs { svar: sv, bounds },
                    rhs: e,
                });
            }
            return Ok(());
        }
        // an array literal feeding a symbolic array: one leaf on the
        // left, one equation per known position on the right
        if lhs.len() == 1 {
            let (lp, sv) = lhs.bindings().next().unwrap();
            if lp.iter().any(|i| matches!(i, Index::ArrayVar(_))) {
                let pairs: Vec<_> = rhs
                    .bindings()
                    .map(|(rp, e)| (rp.clone(), e.clone()))
                    .collect();
                let (lp, sv) = (lp.clone(), sv.clone());
                for (rp, e) in pairs {
                    let (bounds, e) = self.match_paths(&lp, &rp, e, pos)?;
                    self.def_map.insert(sv.clone(), e.clone());
                    self.equations.push(Equation {
                        lhs: EqLhs {
                            svar: sv.clone(),
                            bounds,
                        },
                        rhs: e,
                    });
                }
                return Ok(());
            }
        }
        Err(self.err(
            ErrorKind::ShapeMismatch {
                lhs: lhs.keys().map(|k| super::index::render_path(k)).join(", "),
                rhs: rhs.keys().map(|k| super::index::render_path(k)).join(", "),
            },
            pos,
        ))
    }

    /// Match one LHS path against one RHS path, deriving the equation's
    /// array bounds and adjusting the expression where the shapes only
    /// coincide up to coercion.
    fn match_paths(
        &self,
        lp: &[Index],
        rp: &[Index],
        mut e: Expr,
        pos: Pos,
    ) -> Result<(Vec<ArrayBound>, Expr)> {
        // list indexes are equation plumbing, not structure
        let l: Vec<&Index> = lp.iter().filter(|i| !matches!(i, Index::List(_))).collect();
        let r: Vec<&Index> = rp.iter().filter(|i| !matches!(i, Index::List(_))).collect();
        let mut bounds = Vec::new();
        let mut lhs_level = 0;
        let mut li = 0;
        let mut ri = 0;
        while li < l.len() && ri < r.len() {
            match (l[li], r[ri]) {
                (Index::Record(a), Index::Record(b)) if a == b => {}
                (Index::Tuple(a), Index::Tuple(b)) if a == b => {}
                (Index::Abstract(a), Index::Abstract(b)) if a == b => {}
                // shapes coinciding by integer position
                (Index::Tuple(a), Index::ArrayInt(b)) | (Index::ArrayInt(b), Index::Tuple(a))
                    if a == b => {}
                (Index::ArrayVar(lb), Index::ArrayVar(rb)) => {
                    bounds.push(join_bounds(lb, rb));
                    // a still-array right-hand side gets selected at the
                    // level's running index to stay one-value-per-leaf
                    if e.sort().array_depth() > 0 {
                        e = e.mk_select_and_push(&Expr::mk_index_var(lhs_level));
                    }
                    lhs_level += 1;
                }
                (Index::ArrayVar(_), Index::ArrayInt(i)) => {
                    bounds.push(ArrayBound::Fixed(crate::ir::term::int_lit(*i as u32)));
                    lhs_level += 1;
                }
                (Index::ArrayInt(a), Index::ArrayInt(b)) if a == b => {
                    bounds.push(ArrayBound::Fixed(crate::ir::term::int_lit(*a as u32)));
                    lhs_level += 1;
                }
                (a, b) => {
                    return Err(self.err(
                        ErrorKind::ShapeMismatch {
                            lhs: a.to_string(),
                            rhs: b.to_string(),
                        },
                        pos,
                    ))
                }
            }
            li += 1;
            ri += 1;
        }
        // leftover symbolic levels on the left broadcast the right-hand
        // side; leftover levels on the right are selected away
        for rest in &l[li..] {
            match rest {
                Index::ArrayVar(size) => {
                    bounds.push(ArrayBound::Bound(size.step().clone()));
                    if e.sort().array_depth() > 0 {
                        e = e.mk_select_and_push(&Expr::mk_index_var(lhs_level));
                    }
                    lhs_level += 1;
                }
                other => {
                    return Err(self.err(
                        ErrorKind::ShapeMismatch {
                            lhs: other.to_string(),
                            rhs: "ε".into(),
                        },
                        pos,
                    ))
                }
            }
        }
        for rest in &r[ri..] {
            match rest {
                Index::ArrayVar(_) => {
                    e = e.mk_select_and_push(&Expr::mk_index_var(lhs_level));
                    lhs_level += 1;
                }
                other => {
                    return Err(self.err(
                        ErrorKind::ShapeMismatch {
                            lhs: "ε".into(),
                            rhs: other.to_string(),
                        },
                        pos,
                    ))
                }
            }
        }
        Ok((bounds, e))
    }

    // ------------------------------------------------------------------
    // contracts

    fn compile_contract(&mut self) -> Result<Option<Contract>> {
        let spec = match &self.decl.contract {
            Some(s) => s.clone(),
            None => return Ok(None),
        };

        let mut assumes = Vec::new();
        let mut sorted_assumes = spec.assumes.clone();
        sorted_assumes.sort_by_key(|(it, _)| it.pos);
        for (i, (it, weak)) in sorted_assumes.iter().enumerate() {
            let sv = self.contract_item_svar(it)?;
            assumes.push(ContractSvar {
                kind: if *weak {
                    ContractKind::WeakAssumption
                } else {
                    ContractKind::Assumption
                },
                pos: it.pos,
                index: i,
                name: it.name.clone(),
                svar: sv,
                scope: self.map.contract_scope.clone(),
            });
        }

        let mut guarantees = Vec::new();
        let mut sorted_guarantees = spec.guarantees.clone();
        sorted_guarantees.sort_by_key(|(it, _)| it.pos);
        for (i, (it, soft)) in sorted_guarantees.iter().enumerate() {
            let sv = self.contract_item_svar(it)?;
            guarantees.push((
                ContractSvar {
                    kind: if *soft {
                        ContractKind::WeakGuarantee
                    } else {
                        ContractKind::Guarantee
                    },
                    pos: it.pos,
                    index: i,
                    name: it.name.clone(),
                    svar: sv,
                    scope: self.map.contract_scope.clone(),
                },
                *soft,
            ));
        }

        let mut modes = Vec::new();
        let mut sorted_modes = spec.modes.clone();
        sorted_modes.sort_by_key(|m| m.pos);
        for m in &sorted_modes {
            let mut requires = Vec::new();
            for (i, it) in m.requires.iter().enumerate() {
                requires.push(ContractSvar {
                    kind: ContractKind::Require,
                    pos: it.pos,
                    index: i,
                    name: it.name.clone(),
                    svar: self.contract_item_svar(it)?,
                    scope: self.map.contract_scope.clone(),
                });
            }
            let mut ensures = Vec::new();
            for (i, it) in m.ensures.iter().enumerate() {
                ensures.push(ContractSvar {
                    kind: ContractKind::Ensure,
                    pos: it.pos,
                    index: i,
                    name: it.name.clone(),
                    svar: self.contract_item_svar(it)?,
                    scope: self.map.contract_scope.clone(),
                });
            }
            let mut path = self.map.contract_scope.clone();
            path.push(m.name.clone());
            modes.push(Mode {
                name: m.name.clone(),
                pos: m.pos,
                path,
                requires,
                ensures,
            });
        }

        // contract imports, each under a fresh identifier map
        for (k, imp) in spec.imports.iter().enumerate() {
            self.compile_contract_import(imp, k, &mut assumes, &mut guarantees, &mut modes)?;
        }

        // mode-derived guarantees
        if !modes.is_empty() {
            let req_disj: Vec<Expr> = modes
                .iter()
                .map(|m| {
                    Expr::mk_and(
                        &m.requires
                            .iter()
                            .map(|r| Expr::mk_svar(&r.svar))
                            .collect::<Vec<_>>(),
                    )
                })
                .collect();
            let one_active = self.bind_generated(Expr::mk_or(&req_disj), SvarSource::Generated);
            guarantees.push((
                ContractSvar {
                    kind: ContractKind::GuaranteeOneModeActive,
                    pos: self.decl.pos,
                    index: guarantees.len(),
                    name: None,
                    svar: one_active,
                    scope: self.map.contract_scope.clone(),
                },
                false,
            ));
            for m in &modes {
                let req = Expr::mk_and(
                    &m.requires
                        .iter()
                        .map(|r| Expr::mk_svar(&r.svar))
                        .collect::<Vec<_>>(),
                );
                let ens = Expr::mk_and(
                    &m.ensures
                        .iter()
                        .map(|r| Expr::mk_svar(&r.svar))
                        .collect::<Vec<_>>(),
                );
                let sv = self.bind_generated(req.mk_impl(&ens), SvarSource::Generated);
                guarantees.push((
                    ContractSvar {
                        kind: ContractKind::GuaranteeModeImplication,
                        pos: m.pos,
                        index: guarantees.len(),
                        name: Some(m.name.clone()),
                        svar: sv,
                        scope: m.path.clone(),
                    },
                    false,
                ));
            }
        }

        // sofar = A -> (A /\ pre sofar)
        let sofar = mk_state_var(
            "sofar",
            reserved_scope(&self.decl.name),
            Sort::Bool,
            false,
            false,
            false,
        );
        self.map.source.insert(sofar.clone(), SvarSource::Generated);
        let conj = Expr::mk_and(
            &assumes
                .iter()
                .map(|a| Expr::mk_svar(&a.svar))
                .collect::<Vec<_>>(),
        );
        let sofar_e = Expr::mk_svar(&sofar);
        let rhs = conj.mk_arrow(&Expr::mk_and(&[conj.clone(), sofar_e.mk_pre()]));
        self.def_map.insert(sofar.clone(), rhs.clone());
        self.equations.push(Equation {
            lhs: EqLhs {
                svar: sofar.clone(),
                bounds: Vec::new(),
            },
            rhs,
        });

        Ok(Some(Contract {
            assumes,
            sofar,
            guarantees,
            modes,
        }))
    }

    fn contract_item_svar(&self, it: &ast::ContractItem) -> Result<StateVar> {
        let ident = it.expr.as_ident().ok_or_else(|| {
            self.err(
                ErrorKind::InvariantViolation(
                    "contract item survived normalization unlifted".into(),
                ),
                it.pos,
            )
        })?;
        self.scalar_svar(ident, it.pos)
    }

    /// A fresh generated state variable defined by `e`.
    fn bind_generated(&mut self, e: Expr, source: SvarSource) -> StateVar {
        let sv = mk_state_var(
            ns::fresh_name(ns::GLOCAL),
            reserved_scope(&self.decl.name),
            e.sort().strip_range(),
            false,
            false,
            false,
        );
        self.map.source.insert(sv.clone(), source);
        self.def_map.insert(sv.clone(), e.clone());
        self.equations.push(Equation {
            lhs: EqLhs {
                svar: sv.clone(),
                bounds: Vec::new(),
            },
            rhs: e,
        });
        sv
    }

    /// Unfold one contract-node import: bind the callee's formals to the
    /// caller's actuals under a fresh identifier map, instantiate its
    /// polymorphic parameters, and compile its items under the import's
    /// scope.
    fn compile_contract_import(
        &mut self,
        imp: &ast::ContractImport,
        ordinal: usize,
        assumes: &mut Vec<ContractSvar>,
        guarantees: &mut Vec<(ContractSvar, bool)>,
        modes: &mut Vec<Mode>,
    ) -> Result<()> {
        let callee = self
            .state
            .contract_nodes
            .get(&imp.name)
            .cloned()
            .ok_or_else(|| self.err(ErrorKind::UnboundIdentifier(imp.name.clone()), imp.pos))?;

        let scope_path = vec![imp.name.clone(), ordinal.to_string()];

        // fresh identifier map for the callee; never shared with the
        // caller
        let mut child = IdentMap::new();
        let params = self
            .ctx
            .contract_params_of(&imp.name)
            .cloned()
            .unwrap_or_else(|| callee.ty_params.clone());
        for (p, arg) in params.iter().zip(imp.ty_args.iter()) {
            // resolve through the importer's aliases before binding
            let resolved = match arg {
                ast::Type::Named(n) => self
                    .map
                    .ty_aliases
                    .get(n)
                    .cloned()
                    .unwrap_or_else(|| arg.clone()),
                _ => arg.clone(),
            };
            child.ty_aliases.insert(p.clone(), resolved);
        }
        child.contract_scope = {
            let mut s = self.map.contract_scope.clone();
            s.extend(scope_path.iter().cloned());
            s
        };
        for (formal, actual) in callee.inputs.iter().zip(imp.inputs.iter()) {
            let t = self.compile_expr(actual)?;
            child.bind_exprs(formal.name.clone(), t);
        }
        for (formal, actual) in callee.outputs.iter().zip(imp.outputs.iter()) {
            let t = self
                .map
                .exprs_of(actual)
                .cloned()
                .ok_or_else(|| self.err(ErrorKind::UnboundIdentifier(actual.clone()), imp.pos))?;
            child.bind_exprs(formal.name.clone(), t);
        }

        std::mem::swap(&mut self.map, &mut child);
        let result = self.compile_imported_spec(&callee.spec, assumes, guarantees, modes);
        std::mem::swap(&mut self.map, &mut child);
        // keep the child's equations' sources visible on the node
        for (sv, src) in child.source {
            self.map.source.entry(sv).or_insert(src);
        }
        result
    }

    fn compile_imported_spec(
        &mut self,
        spec: &ast::ContractSpec,
        assumes: &mut Vec<ContractSvar>,
        guarantees: &mut Vec<(ContractSvar, bool)>,
        modes: &mut Vec<Mode>,
    ) -> Result<()> {
        for (p, def) in &spec.ghost_vars {
            let rhs = self.compile_expr(def)?;
            let e = self.scalar(rhs, p.pos)?;
            let sv = self.bind_generated(e, SvarSource::Ghost);
            self.map.bind_exprs(p.name.clone(), Trie::leaf(Expr::mk_svar(&sv)));
        }
        let mut sorted = spec.assumes.clone();
        sorted.sort_by_key(|(it, _)| it.pos);
        for (i, (it, weak)) in sorted.iter().enumerate() {
            let t = self.compile_expr(&it.expr)?;
            let e = self.scalar(t, it.pos)?;
            let sv = self.bind_generated(e, SvarSource::Generated);
            assumes.push(ContractSvar {
                kind: if *weak {
                    ContractKind::WeakAssumption
                } else {
                    ContractKind::Assumption
                },
                pos: it.pos,
                index: i,
                name: it.name.clone(),
                svar: sv,
                scope: self.map.contract_scope.clone(),
            });
        }
        let mut sorted = spec.guarantees.clone();
        sorted.sort_by_key(|(it, _)| it.pos);
        for (i, (it, soft)) in sorted.iter().enumerate() {
            let t = self.compile_expr(&it.expr)?;
            let e = self.scalar(t, it.pos)?;
            let sv = self.bind_generated(e, SvarSource::Generated);
            guarantees.push((
                ContractSvar {
                    kind: if *soft {
                        ContractKind::WeakGuarantee
                    } else {
                        ContractKind::Guarantee
                    },
                    pos: it.pos,
                    index: i,
                    name: it.name.clone(),
                    svar: sv,
                    scope: self.map.contract_scope.clone(),
                },
                *soft,
            ));
        }
        for m in &spec.modes {
            let mut requires = Vec::new();
            for (i, it) in m.requires.iter().enumerate() {
                let t = self.compile_expr(&it.expr)?;
                let e = self.scalar(t, it.pos)?;
                requires.push(ContractSvar {
                    kind: ContractKind::Require,
                    pos: it.pos,
                    index: i,
                    name: it.name.clone(),
                    svar: self.bind_generated(e, SvarSource::Generated),
                    scope: self.map.contract_scope.clone(),
                });
            }
            let mut ensures = Vec::new();
            for (i, it) in m.ensures.iter().enumerate() {
                let t = self.compile_expr(&it.expr)?;
                let e = self.scalar(t, it.pos)?;
                ensures.push(ContractSvar {
                    kind: ContractKind::Ensure,
                    pos: it.pos,
                    index: i,
                    name: it.name.clone(),
                    svar: self.bind_generated(e, SvarSource::Generated),
                    scope: self.map.contract_scope.clone(),
                });
            }
            let mut path = self.map.contract_scope.clone();
            path.push(m.name.clone());
            modes.push(Mode {
                name: m.name.clone(),
                pos: m.pos,
                path,
                requires,
                ensures,
            });
        }
        // nested imports
        for (k, nested) in spec.imports.iter().enumerate() {
            self.compile_contract_import(nested, k, assumes, guarantees, modes)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // declared-type constraints

    /// Integer-subrange and refinement constraints become contract
    /// assumptions on inputs, guarantees on outputs and ghosts,
    /// invariant properties on locals; derived constraints become
    /// candidates.
    fn compile_constraints(&mut self, contract: &mut Option<Contract>) -> Result<()> {
        for c in &self.gids.constraints.clone() {
            let sv = self.scalar_svar(&c.ident, c.pos)?;
            let name = format!("{}.bounds", c.var);
            if !c.original {
                self.props.push(Property {
                    svar: sv,
                    name,
                    pos: c.pos,
                    kind: PropertyKind::Candidate,
                });
                continue;
            }
            match c.site {
                ConstraintSite::Input => {
                    self.assumption_svars.push(sv.clone());
                    if let Some(ct) = contract {
                        let index = ct.assumes.len();
                        ct.assumes.push(ContractSvar {
                            kind: ContractKind::Assumption,
                            pos: c.pos,
                            index,
                            name: Some(name),
                            svar: sv,
                            scope: Vec::new(),
                        });
                    }
                }
                ConstraintSite::Output | ConstraintSite::Ghost => {
                    if let Some(ct) = contract {
                        let index = ct.guarantees.len();
                        ct.guarantees.push((
                            ContractSvar {
                                kind: ContractKind::Guarantee,
                                pos: c.pos,
                                index,
                                name: Some(name),
                                svar: sv,
                                scope: Vec::new(),
                            },
                            false,
                        ));
                    } else {
                        self.props.push(Property {
                            svar: sv,
                            name,
                            pos: c.pos,
                            kind: PropertyKind::Invariant,
                        });
                    }
                }
                ConstraintSite::Local => {
                    self.props.push(Property {
                        svar: sv,
                        name,
                        pos: c.pos,
                        kind: PropertyKind::Invariant,
                    });
                }
            }
        }
        Ok(())
    }
}

fn reserved_scope(node: &str) -> Vec<String> {
    vec![node.to_owned(), "res".to_owned()]
}

fn impl_scope(node: &str) -> Vec<String> {
    vec![node.to_owned(), "impl".to_owned()]
}

fn contract_scope(node: &str, path: &[String]) -> Vec<String> {
    let mut s = vec![node.to_owned(), "contract".to_owned()];
    s.extend(path.iter().cloned());
    s
}

/// Replace abstract sorts by their instantiations.
fn subst_abstract(sort: &Sort, inst: &FxHashMap<String, Sort>) -> Sort {
    match sort {
        Sort::Abstract(n) => inst.get(n.as_ref()).cloned().unwrap_or_else(|| sort.clone()),
        Sort::Array(k, v) => Sort::Array(
            Box::new(subst_abstract(k, inst)),
            Box::new(subst_abstract(v, inst)),
        ),
        s => s.clone(),
    }
}

/// Join an LHS array bound with an RHS one: the smaller wins when both
/// are numeric, the left otherwise. Bound equality is not decided here.
fn join_bounds(lb: &Expr, rb: &Expr) -> ArrayBound {
    let num = |e: &Expr| e.step().as_int_opt().cloned();
    match (num(lb), num(rb)) {
        (Some(a), Some(b)) => ArrayBound::Bound(crate::ir::term::int_lit(a.min(b))),
        _ => ArrayBound::Bound(lb.step().clone()),
    }
}

fn lit_expr(l: &ast::Literal) -> Expr {
    match l {
        ast::Literal::Bool(b) => Expr::mk_bool(*b),
        ast::Literal::Int(i) => Expr::mk_int(i.clone()),
        ast::Literal::Real(r) => Expr::mk_real(r.clone()),
        ast::Literal::Machine(i, w, signed) => Expr::mk_machine(i.clone(), *w, *signed),
    }
}
