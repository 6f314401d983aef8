#![allow(missing_docs)]

use super::ast::*;
use super::compile;
use super::ctx::{NodeSig, TypeCtx};
use super::node::*;
use super::testing;
use crate::ir::term::{Op, Var};

fn p(line: u32, col: u32) -> Pos {
    Pos::new(line, col)
}

fn param(name: &str, ty: Type) -> Param {
    Param {
        pos: p(1, 1),
        name: name.into(),
        ty,
        is_const: false,
    }
}

fn plain_node(name: &str, inputs: Vec<Param>, outputs: Vec<Param>, items: Vec<NodeItem>) -> NodeDecl {
    NodeDecl {
        pos: p(1, 1),
        name: name.into(),
        is_function: false,
        is_extern: false,
        opacity: Opacity::Transparent,
        ty_params: vec![],
        inputs,
        outputs,
        locals: vec![],
        items,
        contract: None,
    }
}

fn eq1(lhs: &str, rhs: Expr) -> NodeItem {
    NodeItem::Equation {
        pos: p(2, 1),
        lhs: vec![LhsItem::Ident(lhs.into())],
        rhs,
    }
}

fn ident(n: &str) -> Expr {
    Expr::ident(p(2, 5), n)
}

#[test]
fn identity_node() {
    let _l = testing::lock();
    let node = plain_node(
        "q_id",
        vec![param("y", Type::Int)],
        vec![param("z", Type::Int)],
        vec![eq1("z", ident("y"))],
    );
    let state = compile(vec![Decl::Node(node)], &TypeCtx::default()).unwrap();
    assert_eq!(state.nodes.len(), 1);
    let n = &state.nodes[0];
    assert_eq!(n.inputs.len(), 1);
    assert_eq!(n.outputs.len(), 1);
    assert!(n.oracles.is_empty());
    assert!(n.calls.is_empty());
    assert_eq!(n.equations.len(), 1);
    let e = &n.equations[0];
    assert_eq!(e.lhs.svar.name(), "z");
    assert!(e.lhs.bounds.is_empty());
    let y = n.inputs.values().next().unwrap();
    assert_eq!(e.rhs.as_svar().as_ref(), Some(y));
    // equation totality: each output leaf is defined exactly once
    for out in n.output_svars() {
        assert_eq!(
            n.equations.iter().filter(|e| &e.lhs.svar == out).count(),
            1
        );
    }
}

#[test]
fn unguarded_pre_compiles_to_oracle_arrow() {
    let _l = testing::lock();
    let node = plain_node(
        "f_pre",
        vec![param("y", Type::Int)],
        vec![param("z", Type::Int)],
        vec![eq1("z", Expr::new(p(2, 5), ExprKind::Pre(Box::new(ident("y")))))],
    );
    let state = compile(vec![Decl::Node(node)], &TypeCtx::default()).unwrap();
    let n = &state.nodes[0];
    assert_eq!(n.oracles.len(), 1);
    let o = &n.oracles[0];
    assert!(o.is_const());
    // the oracle closes over y
    let y = n.inputs.values().next().unwrap();
    assert_eq!(n.oracle_map.get(o), Some(y));
    assert_eq!(n.equations.len(), 1);
    let e = &n.equations[0];
    assert_eq!(e.lhs.svar.name(), "z");
    // init view: the oracle constant
    match &e.rhs.init().op {
        Op::Var(Var::ConstSvar { svar }) => assert_eq!(svar, o),
        other => panic!("unexpected init {:?}", other),
    }
    // step view: y one instant back
    match &e.rhs.step().op {
        Op::Var(Var::Instance { svar, offset }) => {
            assert_eq!(svar, y);
            assert_eq!(*offset, 0);
        }
        other => panic!("unexpected step {:?}", other),
    }
}

#[test]
fn record_output_expands_to_leaves() {
    let _l = testing::lock();
    let r_ty = Type::Record(
        "R".into(),
        vec![("a".into(), Type::Int), ("b".into(), Type::Bool)],
    );
    let alias = Decl::TypeAlias {
        pos: p(1, 1),
        name: "R".into(),
        ty: r_ty,
    };
    let rhs = Expr::new(
        p(3, 5),
        ExprKind::RecordLit(
            "R".into(),
            vec![
                ("a".into(), Expr::int(p(3, 7), 1)),
                ("b".into(), Expr::new(p(3, 9), ExprKind::Lit(Literal::Bool(true)))),
            ],
        ),
    );
    let node = plain_node(
        "rec_n",
        vec![],
        vec![param("r", Type::Named("R".into()))],
        vec![eq1("r", rhs)],
    );
    let state = compile(vec![alias, Decl::Node(node)], &TypeCtx::default()).unwrap();
    let n = &state.nodes[0];
    assert_eq!(n.outputs.len(), 2);
    let mut names: Vec<String> = n
        .equations
        .iter()
        .map(|e| e.lhs.svar.name().to_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["r.a", "r.b"]);
    for e in &n.equations {
        if e.lhs.svar.name() == "r.a" {
            assert_eq!(e.rhs.step().as_int_opt().and_then(|i| i.to_u32()), Some(1));
        }
    }
    for out in n.output_svars() {
        assert_eq!(
            n.equations.iter().filter(|e| &e.lhs.svar == out).count(),
            1
        );
    }
}

#[test]
fn node_call_with_constant_argument() {
    let _l = testing::lock();
    let mut ctx = TypeCtx::default();
    ctx.node_sigs.insert(
        "q_callee".into(),
        NodeSig {
            inputs: vec![Type::Int],
            outputs: vec![Type::Int],
        },
    );
    let callee = plain_node(
        "q_callee",
        vec![param("y", Type::Int)],
        vec![param("z", Type::Int)],
        vec![eq1("z", ident("y"))],
    );
    let caller = plain_node(
        "main_call",
        vec![],
        vec![param("z", Type::Int)],
        vec![eq1(
            "z",
            Expr::new(
                p(2, 5),
                ExprKind::Call(CallExpr {
                    name: "q_callee".into(),
                    ty_args: vec![],
                    args: vec![Expr::int(p(2, 8), 1)],
                }),
            ),
        )],
    );
    let state = compile(vec![Decl::Node(callee), Decl::Node(caller)], &ctx).unwrap();
    assert_eq!(state.nodes.len(), 2);
    let main = state.node_by_name("main_call").unwrap();
    assert_eq!(main.calls.len(), 1);
    let c = &main.calls[0];
    assert_eq!(c.id, 1);
    assert_eq!(c.callee, "q_callee");
    // the constant argument got a fresh state variable bound to 1
    assert_eq!(c.inputs.len(), 1);
    let arg = c.inputs.values().next().unwrap();
    let def = main
        .equations
        .iter()
        .find(|e| &e.lhs.svar == arg)
        .expect("no defining equation for the constant argument");
    assert_eq!(def.rhs.step().as_int_opt().and_then(|i| i.to_u32()), Some(1));
    // the call defines the output z directly
    assert_eq!(c.outputs.len(), 1);
    assert_eq!(c.outputs.values().next().unwrap().name(), "z");
    // and no equation redefines z
    assert!(main.equations.iter().all(|e| e.lhs.svar.name() != "z"));
}

fn item(line: u32, e: Expr) -> ContractItem {
    ContractItem {
        pos: p(line, 3),
        name: None,
        expr: e,
    }
}

fn ge0(line: u32, n: &str) -> Expr {
    Expr::new(
        p(line, 3),
        ExprKind::Binary(
            BinOp::Ge,
            Box::new(Expr::ident(p(line, 3), n)),
            Box::new(Expr::int(p(line, 8), 0)),
        ),
    )
}

#[test]
fn contract_builds_sofar_accumulator() {
    let _l = testing::lock();
    let mut node = plain_node(
        "ctr_n",
        vec![param("y", Type::Int)],
        vec![param("z", Type::Int)],
        vec![eq1("z", ident("y"))],
    );
    node.contract = Some(ContractSpec {
        // listed out of source order on purpose
        assumes: vec![(item(7, ge0(7, "y")), false), (item(4, ge0(4, "y")), false)],
        guarantees: vec![(item(9, ge0(9, "z")), false)],
        ..Default::default()
    });
    let state = compile(vec![Decl::Node(node)], &TypeCtx::default()).unwrap();
    let n = &state.nodes[0];
    let c = n.contract.as_ref().expect("contract missing");
    assert_eq!(c.assumes.len(), 2);
    // sorted by source position
    assert_eq!(c.assumes[0].pos.line, 4);
    assert_eq!(c.assumes[1].pos.line, 7);
    assert_eq!(c.assumes[0].index, 0);
    assert_eq!(c.guarantees.len(), 1);
    assert_eq!(c.guarantees[0].0.kind, ContractKind::Guarantee);
    // sofar = A -> (A /\ pre sofar)
    let sofar_eq = n
        .equations
        .iter()
        .find(|e| e.lhs.svar == c.sofar)
        .expect("no sofar equation");
    match &sofar_eq.rhs.step().op {
        Op::BoolNaryOp(crate::ir::term::BoolNaryOp::And) => {}
        other => panic!("unexpected sofar step {:?}", other),
    }
}

#[test]
fn contract_import_unfolds_with_scope() {
    let _l = testing::lock();
    let cn = ContractNodeDecl {
        pos: p(1, 1),
        name: "cn_pos".into(),
        ty_params: vec![],
        inputs: vec![param("x", Type::Int)],
        outputs: vec![],
        spec: ContractSpec {
            guarantees: vec![(item(2, ge0(2, "x")), false)],
            ..Default::default()
        },
    };
    let mut node = plain_node(
        "imp_n",
        vec![param("y", Type::Int)],
        vec![param("z", Type::Int)],
        vec![eq1("z", ident("y"))],
    );
    node.contract = Some(ContractSpec {
        imports: vec![ContractImport {
            pos: p(5, 3),
            name: "cn_pos".into(),
            ty_args: vec![],
            inputs: vec![ident("y")],
            outputs: vec![],
        }],
        ..Default::default()
    });
    let state = compile(
        vec![Decl::ContractNode(cn), Decl::Node(node)],
        &TypeCtx::default(),
    )
    .unwrap();
    let n = &state.nodes[0];
    let c = n.contract.as_ref().unwrap();
    assert_eq!(c.guarantees.len(), 1);
    let (g, soft) = &c.guarantees[0];
    assert!(!soft);
    assert_eq!(g.scope, vec!["cn_pos".to_owned(), "0".to_owned()]);
    // the imported item is backed by an equation over y
    assert!(n.equations.iter().any(|e| e.lhs.svar == g.svar));
}

#[test]
fn mode_derives_guarantees_and_nonvacuity_wins() {
    let _l = testing::lock();
    let mut node = plain_node(
        "mode_n",
        vec![param("y", Type::Int)],
        vec![param("z", Type::Int)],
        vec![
            eq1("z", ident("y")),
            NodeItem::Property {
                pos: p(9, 1),
                name: Some("engaged".into()),
                expr: ge0(9, "y"),
                candidate: false,
            },
        ],
    );
    node.contract = Some(ContractSpec {
        modes: vec![ModeSpec {
            pos: p(5, 3),
            name: "engaged".into(),
            requires: vec![item(6, ge0(6, "y"))],
            ensures: vec![item(7, ge0(7, "z"))],
        }],
        ..Default::default()
    });
    let state = compile(vec![Decl::Node(node)], &TypeCtx::default()).unwrap();
    let n = &state.nodes[0];
    let c = n.contract.as_ref().unwrap();
    assert_eq!(c.modes.len(), 1);
    assert_eq!(c.modes[0].path, vec!["engaged".to_owned()]);
    assert_eq!(c.modes[0].requires.len(), 1);
    assert_eq!(c.modes[0].requires[0].kind, ContractKind::Require);
    assert!(c
        .guarantees
        .iter()
        .any(|(g, _)| g.kind == ContractKind::GuaranteeOneModeActive));
    assert!(c
        .guarantees
        .iter()
        .any(|(g, _)| g.kind == ContractKind::GuaranteeModeImplication));
    // the property named like the mode is a nonvacuity check
    let prop = n.props.iter().find(|pr| pr.name == "engaged").unwrap();
    assert_eq!(prop.kind, PropertyKind::NonVacuity);
}

#[test]
fn array_definition_binds_running_index() {
    let _l = testing::lock();
    let node = plain_node(
        "arr_n",
        vec![param("y", Type::Int)],
        vec![param(
            "arr",
            Type::Array(Box::new(Type::Int), Box::new(Expr::int(p(1, 20), 3))),
        )],
        vec![NodeItem::Equation {
            pos: p(2, 1),
            lhs: vec![LhsItem::ArrayDef("arr".into(), vec!["i".into()])],
            rhs: ident("y"),
        }],
    );
    let state = compile(vec![Decl::Node(node)], &TypeCtx::default()).unwrap();
    let n = &state.nodes[0];
    assert_eq!(n.equations.len(), 1);
    let e = &n.equations[0];
    assert_eq!(e.lhs.bounds.len(), 1);
    match &e.lhs.bounds[0] {
        ArrayBound::Bound(t) => assert_eq!(t.as_int_opt().map(|i| i.to_u32()), Some(Some(3))),
        b => panic!("unexpected bound {}", b),
    }
    // the output leaf keeps its array sort
    let out = n.outputs.values().next().unwrap();
    assert!(matches!(out.sort(), crate::ir::term::Sort::Array(_, _)));
}

#[test]
fn array_literal_expands_to_fixed_positions() {
    let _l = testing::lock();
    let arr_ty = Type::Array(Box::new(Type::Int), Box::new(Expr::int(p(1, 20), 3)));
    let lit = Expr::new(
        p(2, 7),
        ExprKind::ArrayLit(vec![
            Expr::int(p(2, 8), 1),
            Expr::int(p(2, 10), 2),
            Expr::int(p(2, 12), 3),
        ]),
    );
    let node = plain_node(
        "arrlit_n",
        vec![],
        vec![param("v", arr_ty)],
        vec![eq1("v", lit)],
    );
    let state = compile(vec![Decl::Node(node)], &TypeCtx::default()).unwrap();
    let n = &state.nodes[0];
    // three equations pin the literal's positions, one copies it into v
    let fixed: Vec<_> = n
        .equations
        .iter()
        .filter(|e| matches!(e.lhs.bounds.first(), Some(ArrayBound::Fixed(_))))
        .collect();
    assert_eq!(fixed.len(), 3);
    let v_eq = n
        .equations
        .iter()
        .find(|e| e.lhs.svar.name() == "v")
        .expect("no equation for v");
    assert!(matches!(v_eq.lhs.bounds.first(), Some(ArrayBound::Bound(_))));
}

#[test]
fn condact_records_activation_condition() {
    let _l = testing::lock();
    let mut ctx = TypeCtx::default();
    ctx.node_sigs.insert(
        "q_ck".into(),
        NodeSig {
            inputs: vec![Type::Int],
            outputs: vec![Type::Int],
        },
    );
    let callee = plain_node(
        "q_ck",
        vec![param("y", Type::Int)],
        vec![param("z", Type::Int)],
        vec![eq1("z", ident("y"))],
    );
    let caller = plain_node(
        "cond_n",
        vec![param("c", Type::Bool), param("y", Type::Int)],
        vec![param("z", Type::Int)],
        vec![eq1(
            "z",
            Expr::new(
                p(2, 5),
                ExprKind::Condact {
                    clock: Box::new(ident("c")),
                    defaults: vec![Expr::int(p(2, 30), 0)],
                    call: CallExpr {
                        name: "q_ck".into(),
                        ty_args: vec![],
                        args: vec![ident("y")],
                    },
                },
            ),
        )],
    );
    let state = compile(vec![Decl::Node(callee), Decl::Node(caller)], &ctx).unwrap();
    let n = state.node_by_name("cond_n").unwrap();
    assert_eq!(n.calls.len(), 1);
    let c = &n.calls[0];
    assert_eq!(c.conds.len(), 1);
    assert_eq!(c.conds[0].0, CondKind::Activate);
    assert_eq!(c.conds[0].1.name(), "c");
    assert_eq!(c.defaults.as_ref().map(|d| d.len()), Some(1));
}

#[test]
fn subrange_constraints_follow_declaration_site() {
    let _l = testing::lock();
    let sub = |lo: i32, hi: i32| {
        Type::IntRange(
            Box::new(Expr::int(p(1, 10), lo as u32)),
            Box::new(Expr::int(p(1, 13), hi as u32)),
        )
    };
    let mut node = plain_node(
        "rng_n",
        vec![param("y", sub(0, 7))],
        vec![param("z", Type::Int)],
        vec![
            eq1("l", ident("y")),
            eq1("z", ident("l")),
        ],
    );
    node.locals = vec![LocalDecl::Var(param("l", sub(0, 7)))];
    let state = compile(vec![Decl::Node(node)], &TypeCtx::default()).unwrap();
    let n = &state.nodes[0];
    // the input constraint is an assumption, the local one an invariant
    assert_eq!(n.assumption_svars.len(), 1);
    assert!(n
        .props
        .iter()
        .any(|pr| pr.kind == PropertyKind::Invariant && pr.name == "l.bounds"));
    // both constraints are defined by equations
    for sv in n.assumption_svars.iter() {
        assert!(n.equations.iter().any(|e| &e.lhs.svar == sv));
    }
}

#[test]
fn state_variables_are_unique_per_identity() {
    let _l = testing::lock();
    let node = plain_node(
        "uniq_n",
        vec![param("y", Type::Int)],
        vec![param("z", Type::Int)],
        vec![eq1("z", ident("y"))],
    );
    let state = compile(vec![Decl::Node(node)], &TypeCtx::default()).unwrap();
    let n = &state.nodes[0];
    let mut seen = std::collections::HashSet::new();
    for sv in n.inputs.values().chain(n.outputs.values()) {
        assert!(seen.insert((sv.name().to_owned(), sv.scope().to_vec())));
    }
}

#[test]
fn unbound_identifier_is_recoverable() {
    let _l = testing::lock();
    let bad = plain_node(
        "bad_n",
        vec![],
        vec![param("z", Type::Int)],
        vec![eq1("z", ident("ghost"))],
    );
    let good = plain_node(
        "good_n",
        vec![param("y", Type::Int)],
        vec![param("z", Type::Int)],
        vec![eq1("z", ident("y"))],
    );
    let (state, diags) = super::compile_tolerant(
        vec![Decl::Node(bad), Decl::Node(good)],
        &TypeCtx::default(),
    )
    .unwrap();
    assert_eq!(diags.len(), 1);
    assert!(!diags[0].is_fatal());
    assert!(state.node_by_name("good_n").is_some());
    assert!(state.node_by_name("bad_n").is_none());
}
