//! Dependency graph over state variables.
//!
//! Built from a transition system and a set of terms marked as
//! definitions (`= lhs rhs`): a definition contributes edges from its
//! left-hand state variables to its right-hand ones, any other term
//! contributes a clique, and subsystem bindings contribute edges both
//! ways. Cone-of-influence queries are forward reachability, memoized
//! per root.

use fxhash::FxHashMap;
use fxhash::FxHashSet;
use log::debug;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::rc::Rc;

use super::svar::StateVar;
use super::term::extras::state_vars;
use super::term::{Op, Term, TermSet};
use super::trans::{SysProperty, TransitionSystem};

/// DOT fill for vertices outside the cone.
const BASE_COLOR: &str = "#e8e8f0";
/// DOT fill for vertices inside the cone.
const CONE_COLOR: &str = "#ffcc80";
/// DOT foreground color.
const FG_COLOR: &str = "#202030";

/// Is this term a state-variable definition, `= lhs rhs`?
fn definition_parts(t: &Term) -> Option<(FxHashSet<StateVar>, FxHashSet<StateVar>)> {
    if let Op::Eq = &t.op {
        let lhs = state_vars(&t.cs[0]);
        if lhs.is_empty() {
            return None;
        }
        Some((lhs, state_vars(&t.cs[1])))
    } else {
        None
    }
}

/// Drop from `defs` every definition transitively reachable from the
/// atoms of a guarantee. Those terms constrain rather than define, and
/// treating them as definitions would hide dependencies.
pub fn prune_guarantee_definitions(defs: &TermSet, guarantees: &[Term]) -> TermSet {
    let mut tainted: FxHashSet<StateVar> = FxHashSet::default();
    for g in guarantees {
        tainted.extend(state_vars(g));
    }
    let mut remaining: Vec<Term> = defs.iter().cloned().collect();
    let total = remaining.len();
    loop {
        let mut changed = false;
        let mut still = Vec::new();
        for d in remaining {
            match definition_parts(&d) {
                Some((lhs, rhs)) if lhs.iter().any(|sv| tainted.contains(sv)) => {
                    tainted.extend(rhs);
                    changed = true;
                }
                _ => still.push(d),
            }
        }
        remaining = still;
        if !changed {
            break;
        }
    }
    debug!(
        target: "ir::deps",
        "{} of {} definitions pruned under guarantees",
        total - remaining.len(),
        total
    );
    let mut kept = TermSet::new();
    for d in remaining {
        kept.insert(d);
    }
    kept
}

/// A directed dependency graph over state variables.
pub struct DepGraph {
    graph: DiGraph<StateVar, ()>,
    idx: FxHashMap<StateVar, NodeIndex>,
    memo: FxHashMap<StateVar, Rc<FxHashSet<StateVar>>>,
}

impl DepGraph {
    /// Build the graph of `sys`, treating the terms in `defs` as
    /// state-variable definitions. Self-edges are omitted.
    pub fn of_system(sys: &TransitionSystem, defs: &TermSet) -> Self {
        let mut this = DepGraph {
            graph: DiGraph::new(),
            idx: FxHashMap::default(),
            memo: FxHashMap::default(),
        };
        for t in sys.init.iter().chain(sys.trans.iter()) {
            this.add_term(t, defs);
        }
        for inst in &sys.instances {
            for (parent, child) in &inst.var_map {
                this.add_edge(parent, child);
                this.add_edge(child, parent);
            }
        }
        debug!(
            target: "ir::deps",
            "dependency graph of {}: {} vertices, {} edges",
            sys.name,
            this.graph.node_count(),
            this.graph.edge_count()
        );
        this
    }

    fn node(&mut self, sv: &StateVar) -> NodeIndex {
        if let Some(i) = self.idx.get(sv) {
            *i
        } else {
            let i = self.graph.add_node(sv.clone());
            self.idx.insert(sv.clone(), i);
            i
        }
    }

    fn add_edge(&mut self, from: &StateVar, to: &StateVar) {
        if from == to {
            return;
        }
        let a = self.node(from);
        let b = self.node(to);
        if self.graph.find_edge(a, b).is_none() {
            self.graph.add_edge(a, b, ());
        }
    }

    fn add_term(&mut self, t: &Term, defs: &TermSet) {
        if defs.contains(t) {
            if let Some((lhs, rhs)) = definition_parts(t) {
                for l in &lhs {
                    for r in &rhs {
                        self.add_edge(l, r);
                    }
                }
                return;
            }
        }
        // not a definition: every variable of the term depends on every
        // other
        let svs: Vec<StateVar> = state_vars(t).into_iter().collect();
        for a in &svs {
            for b in &svs {
                self.add_edge(a, b);
            }
        }
    }

    /// The state variables forward-reachable from `sv`, `sv` included,
    /// memoized.
    pub fn reachable(&mut self, sv: &StateVar) -> Rc<FxHashSet<StateVar>> {
        if let Some(r) = self.memo.get(sv) {
            return r.clone();
        }
        let mut out = FxHashSet::default();
        if let Some(&start) = self.idx.get(sv) {
            let mut dfs = Dfs::new(&self.graph, start);
            while let Some(nx) = dfs.next(&self.graph) {
                out.insert(self.graph[nx].clone());
            }
        } else {
            out.insert(sv.clone());
        }
        let out = Rc::new(out);
        self.memo.insert(sv.clone(), out.clone());
        out
    }

    /// The cone of influence of `props`: the union of the reachable sets
    /// of every state variable each property mentions.
    pub fn cone_of_influence(&mut self, props: &[SysProperty]) -> FxHashSet<StateVar> {
        let mut cone = FxHashSet::default();
        for p in props {
            for sv in state_vars(&p.term) {
                cone.extend(self.reachable(&sv).iter().cloned());
            }
        }
        cone
    }

    /// Render the graph as DOT; `cone` vertices are filled in the
    /// highlight color.
    pub fn to_dot(&self, cone: &FxHashSet<StateVar>) -> String {
        // Edge weights are `()`, which has no `Display` impl; map them to
        // an empty string (never actually shown, since `EdgeNoLabel` is
        // set below) purely so `Dot`'s `Display` bound is satisfied.
        let graph: DiGraph<StateVar, &'static str> = self.graph.map(|_, sv| sv.clone(), |_, _| "");
        let node_attrs = |_: &DiGraph<StateVar, &'static str>,
                          (_, sv): (NodeIndex, &StateVar)|
         -> String {
            let fill = if cone.contains(sv) {
                CONE_COLOR
            } else {
                BASE_COLOR
            };
            format!(
                "style=filled fillcolor=\"{}\" color=\"{}\" fontcolor=\"{}\"",
                fill, FG_COLOR, FG_COLOR
            )
        };
        let edge_attrs = |_: &DiGraph<StateVar, &'static str>,
                          _: petgraph::graph::EdgeReference<&'static str>|
         -> String { format!("color=\"{}\"", FG_COLOR) };
        format!(
            "{}",
            Dot::with_attr_getters(&graph, &[Config::EdgeNoLabel], &edge_attrs, &node_attrs,)
        )
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Is the graph empty?
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::svar::{instance, mk_state_var, CUR_OFFSET};
    use crate::ir::term::*;

    fn sv(name: &str) -> StateVar {
        mk_state_var(name, vec!["deps_test".into()], Sort::Int, false, false, true)
    }

    fn def(lhs: &StateVar, rhs: Term) -> Term {
        term![Op::Eq; instance(lhs, CUR_OFFSET), rhs]
    }

    #[test]
    fn cone_follows_definitions() {
        // a = b + 1, b = c, prop: a > 0
        let a = sv("a");
        let b = sv("b");
        let c = sv("c");
        let d = sv("d");
        let e1 = def(
            &a,
            term![Op::NumNaryOp(NumNaryOp::Add); instance(&b, CUR_OFFSET), int_lit(1)],
        );
        let e2 = def(&b, instance(&c, CUR_OFFSET));
        let e3 = def(&d, int_lit(0));
        let mut defs = TermSet::new();
        defs.insert(e1.clone());
        defs.insert(e2.clone());
        defs.insert(e3.clone());
        let sys = crate::ir::trans::TransitionSystem {
            name: "deps_test".into(),
            init: vec![],
            trans: vec![e1, e2, e3],
            instances: vec![],
            properties: vec![],
        };
        let mut g = DepGraph::of_system(&sys, &defs);
        let prop = SysProperty {
            name: "positive".into(),
            term: term![Op::CompOp(CompOp::Gt); instance(&a, CUR_OFFSET), int_lit(0)],
        };
        let cone = g.cone_of_influence(&[prop]);
        assert!(cone.contains(&a));
        assert!(cone.contains(&b));
        assert!(cone.contains(&c));
        assert!(!cone.contains(&d));
    }

    #[test]
    fn non_definitions_are_cliques() {
        let x = sv("cl_x");
        let y = sv("cl_y");
        let constraint = term![Op::CompOp(CompOp::Le);
            instance(&x, CUR_OFFSET),
            instance(&y, CUR_OFFSET)
        ];
        let sys = crate::ir::trans::TransitionSystem {
            name: "deps_clique".into(),
            init: vec![],
            trans: vec![constraint],
            instances: vec![],
            properties: vec![],
        };
        let mut g = DepGraph::of_system(&sys, &TermSet::new());
        assert!(g.reachable(&x).contains(&y));
        assert!(g.reachable(&y).contains(&x));
    }

    #[test]
    fn guarantee_pruning() {
        let p = sv("pr_p");
        let q = sv("pr_q");
        let d = def(&p, instance(&q, CUR_OFFSET));
        let mut defs = TermSet::new();
        defs.insert(d);
        let guarantee = term![Op::CompOp(CompOp::Ge); instance(&p, CUR_OFFSET), int_lit(0)];
        let kept = prune_guarantee_definitions(&defs, &[guarantee]);
        assert!(kept.iter().next().is_none());
    }

    #[test]
    fn dot_highlights_cone() {
        let a = sv("dot_a");
        let b = sv("dot_b");
        let e = def(&a, instance(&b, CUR_OFFSET));
        let mut defs = TermSet::new();
        defs.insert(e.clone());
        let sys = crate::ir::trans::TransitionSystem {
            name: "deps_dot".into(),
            init: vec![],
            trans: vec![e],
            instances: vec![],
            properties: vec![],
        };
        let mut g = DepGraph::of_system(&sys, &defs);
        let cone = g.cone_of_influence(&[SysProperty {
            name: "p".into(),
            term: term![Op::CompOp(CompOp::Gt); instance(&a, CUR_OFFSET), int_lit(0)],
        }]);
        let dot = g.to_dot(&cone);
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains(CONE_COLOR));
    }
}
