//! The compiler-state accumulator and the per-node identifier map.

use fxhash::FxHashMap;

use super::ast;
use super::expr::Expr;
use super::index::Trie;
use super::node::{ArrayBound, Node, SvarSource};
use crate::ir::svar::StateVar;
use crate::ir::term::Sort;

/// The persistent accumulator threaded through a whole compilation.
#[derive(Debug, Default)]
pub struct CompilerState {
    /// Compiled nodes, newest first.
    pub nodes: Vec<Node>,
    /// Global type aliases.
    pub type_aliases: FxHashMap<String, ast::Type>,
    /// Free constants: scope, name, and their flattened state variables.
    pub free_constants: Vec<(Vec<String>, String, Trie<StateVar>)>,
    /// Defined constants, inlined on identifier lookup.
    pub other_constants: FxHashMap<String, ast::Expr>,
    /// Enumeration constructors: constant state variable and ordinal.
    pub enum_ctors: FxHashMap<String, (StateVar, usize)>,
    /// Declarations of contract nodes, for imports.
    pub contract_nodes: FxHashMap<String, ast::ContractNodeDecl>,
    /// Array bounds of state variables.
    pub svar_bounds: FxHashMap<StateVar, Vec<ArrayBound>>,
    /// Constraints holding globally (free-constant subranges).
    pub global_constraints: Vec<Expr>,
    /// Next call identifier.
    pub next_call_id: u64,
}

impl CompilerState {
    /// An empty state.
    pub fn new() -> Self {
        CompilerState {
            next_call_id: 1,
            ..Default::default()
        }
    }

    /// Look a compiled node up by name.
    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Draw the next call identifier.
    pub fn fresh_call_id(&mut self) -> u64 {
        let id = self.next_call_id;
        self.next_call_id += 1;
        id
    }
}

/// The per-node identifier map: everything the generator knows about the
/// node it is currently lowering. Created empty when the node's
/// compilation begins, discarded at its end.
#[derive(Debug, Default)]
pub struct IdentMap {
    /// Identifier to its flattened state variables.
    pub svars: FxHashMap<String, Trie<StateVar>>,
    /// Identifier to its flattened expressions.
    pub exprs: FxHashMap<String, Trie<Expr>>,
    /// What each state variable stands for.
    pub source: FxHashMap<StateVar, SvarSource>,
    /// Array bounds of state variables.
    pub bounds: FxHashMap<StateVar, Vec<ArrayBound>>,
    /// Running array indices of the equation being compiled. Transient:
    /// cleared between equations.
    pub array_index: FxHashMap<String, Expr>,
    /// The contract scope currently being compiled under.
    pub contract_scope: Vec<String>,
    /// Node-local type aliases (polymorphic parameters, instantiations).
    pub ty_aliases: FxHashMap<String, ast::Type>,
}

impl IdentMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an identifier to its state variables and the matching
    /// expressions.
    pub fn bind(&mut self, name: impl Into<String>, svars: Trie<StateVar>) {
        let name = name.into();
        let exprs = svars.map(|_, sv| Expr::mk_svar(sv));
        self.svars.insert(name.clone(), svars);
        self.exprs.insert(name, exprs);
    }

    /// Bind an identifier to expressions only (no backing state
    /// variables of its own).
    pub fn bind_exprs(&mut self, name: impl Into<String>, exprs: Trie<Expr>) {
        self.exprs.insert(name.into(), exprs);
    }

    /// The expressions of an identifier.
    pub fn exprs_of(&self, name: &str) -> Option<&Trie<Expr>> {
        self.exprs.get(name)
    }

    /// The state variables of an identifier.
    pub fn svars_of(&self, name: &str) -> Option<&Trie<StateVar>> {
        self.svars.get(name)
    }
}

/// The sort a leaf state variable gets: symbolic array levels on its
/// path wrap the scalar sort back into arrays.
pub fn leaf_svar_sort(path: &[super::index::Index], scalar: &Sort) -> Sort {
    let mut sort = scalar.clone();
    for idx in path.iter().rev() {
        if let super::index::Index::ArrayVar(_) = idx {
            sort = Sort::Array(Box::new(Sort::Int), Box::new(sort));
        }
    }
    sort
}
