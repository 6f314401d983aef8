//! The intermediate node model.
//!
//! One [Node] per source node: flattened inputs/outputs/locals as
//! state-variable tries, scalar equations, call records, the contract,
//! properties, and the source maps the analyses trace back through.

use fxhash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use super::ast::Pos;
use super::expr::Expr;
use super::index::Trie;
use crate::ir::svar::StateVar;
use crate::ir::term::{Sort, Term};

/// How much of a node its callers may see.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opacity {
    /// Only the contract.
    Opaque,
    /// The body.
    Transparent,
    /// Decided per call site.
    Translucent,
}

impl Display for Opacity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Opacity::Opaque => write!(f, "opaque"),
            Opacity::Transparent => write!(f, "transparent"),
            Opacity::Translucent => write!(f, "translucent"),
        }
    }
}

/// What a state variable stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SvarSource {
    /// A node input.
    Input,
    /// A node output.
    Output,
    /// A user local.
    Local,
    /// A contract ghost.
    Ghost,
    /// An oracle.
    Oracle,
    /// A call output.
    Call,
    /// Introduced by normalization.
    Generated,
}

/// An array bound attached to an equation's left-hand side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArrayBound {
    /// A running index below this bound.
    Bound(Term),
    /// A fixed index.
    Fixed(Term),
}

impl Display for ArrayBound {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ArrayBound::Bound(t) => write!(f, "< {}", t),
            ArrayBound::Fixed(t) => write!(f, "= {}", t),
        }
    }
}

/// The left-hand side of a scalar equation.
#[derive(Clone, Debug)]
pub struct EqLhs {
    /// Defined state variable.
    pub svar: StateVar,
    /// Array bounds, outermost first.
    pub bounds: Vec<ArrayBound>,
}

/// A scalar equation.
#[derive(Clone, Debug)]
pub struct Equation {
    /// Left-hand side.
    pub lhs: EqLhs,
    /// Right-hand side.
    pub rhs: Expr,
}

impl Display for Equation {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.lhs.svar.get())?;
        for b in &self.lhs.bounds {
            write!(f, "[{}]", b)?;
        }
        write!(f, " = {}", self.rhs)
    }
}

/// A call-condition kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CondKind {
    /// Activation condition of a clocked call.
    Activate,
    /// Restart condition.
    Restart,
}

/// An abstracted node call.
#[derive(Clone, Debug)]
pub struct CallRecord {
    /// Monotone call identifier.
    pub id: u64,
    /// Call-site position.
    pub pos: Pos,
    /// Callee name.
    pub callee: String,
    /// Condition state variables, in application order.
    pub conds: Vec<(CondKind, StateVar)>,
    /// Input state variables, positionally.
    pub inputs: Trie<StateVar>,
    /// Oracles propagated from the callee.
    pub oracles: Vec<StateVar>,
    /// Output state variables, positionally.
    pub outputs: Trie<StateVar>,
    /// Default values while a clocked call is inactive.
    pub defaults: Option<Vec<Expr>>,
    /// Whether encoders inline the callee at this site.
    pub inlined: bool,
}

impl Display for CallRecord {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "call #{} of {} at {}: {} -> {}",
            self.id,
            self.callee,
            self.pos,
            self.inputs.map(|_, sv| sv.get().to_string()),
            self.outputs.map(|_, sv| sv.get().to_string()),
        )
    }
}

/// What a contract item is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContractKind {
    /// An assumption.
    Assumption,
    /// A weak assumption.
    WeakAssumption,
    /// A guarantee.
    Guarantee,
    /// A weak guarantee.
    WeakGuarantee,
    /// A mode requirement.
    Require,
    /// A mode guarantee.
    Ensure,
    /// The generated one-mode-active guarantee.
    GuaranteeOneModeActive,
    /// A generated requires-implies-ensures guarantee.
    GuaranteeModeImplication,
}

/// A state-variable reference carrying contract metadata.
#[derive(Clone, Debug)]
pub struct ContractSvar {
    /// What the item is.
    pub kind: ContractKind,
    /// Source position.
    pub pos: Pos,
    /// Ordinal among its siblings.
    pub index: usize,
    /// Optional user name.
    pub name: Option<String>,
    /// The state variable holding the item.
    pub svar: StateVar,
    /// The scope the item was defined under.
    pub scope: Vec<String>,
}

impl Display for ContractSvar {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "[{:?} #{}] {}", self.kind, self.index, self.svar.get())?;
        if let Some(n) = &self.name {
            write!(f, " ({})", n)?;
        }
        Ok(())
    }
}

/// A contract mode.
#[derive(Clone, Debug)]
pub struct Mode {
    /// Mode name.
    pub name: String,
    /// Position.
    pub pos: Pos,
    /// Dotted path: contract scope plus the mode name.
    pub path: Vec<String>,
    /// Requirements.
    pub requires: Vec<ContractSvar>,
    /// Guarantees under the requirements.
    pub ensures: Vec<ContractSvar>,
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "mode {} ({} requires, {} ensures)",
            self.path.join("."),
            self.requires.len(),
            self.ensures.len()
        )
    }
}

/// A compiled contract.
#[derive(Clone, Debug)]
pub struct Contract {
    /// Assumptions, in source order.
    pub assumes: Vec<ContractSvar>,
    /// The accumulator: all assumptions have held at every instant so
    /// far.
    pub sofar: StateVar,
    /// Guarantees with their softness flag.
    pub guarantees: Vec<(ContractSvar, bool)>,
    /// Modes.
    pub modes: Vec<Mode>,
}

impl Display for Contract {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "contract (sofar {}):", self.sofar.get())?;
        for a in &self.assumes {
            writeln!(f, "  assume {}", a)?;
        }
        for (g, soft) in &self.guarantees {
            writeln!(f, "  guarantee{} {}", if *soft { " (weak)" } else { "" }, g)?;
        }
        for m in &self.modes {
            writeln!(f, "  {}", m)?;
        }
        Ok(())
    }
}

/// Why a property is tracked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyKind {
    /// Written by the user.
    User,
    /// A generated invariant (e.g. a local subrange constraint).
    Invariant,
    /// A candidate invariant.
    Candidate,
    /// A nonvacuity check.
    NonVacuity,
}

/// A property of a node.
#[derive(Clone, Debug)]
pub struct Property {
    /// The state variable holding the property.
    pub svar: StateVar,
    /// Property name.
    pub name: String,
    /// Source position.
    pub pos: Pos,
    /// Kind.
    pub kind: PropertyKind,
}

/// A compiled node.
#[derive(Clone, Debug)]
pub struct Node {
    /// Node name.
    pub name: String,
    /// Body-less (imported) flag.
    pub is_extern: bool,
    /// Caller visibility.
    pub opacity: Opacity,
    /// Polymorphic parameters bound to abstract sorts.
    pub ty_args: Vec<(String, Sort)>,
    /// Distinguishes instances of this node.
    pub instance_svar: StateVar,
    /// True exactly at the first instant.
    pub init_flag: StateVar,
    /// Inputs, positionally: list index per slot, then the flattened
    /// leaves.
    pub inputs: Trie<StateVar>,
    /// Outputs, positionally.
    pub outputs: Trie<StateVar>,
    /// Locals, one trie per identifier (user then generated).
    pub locals: Vec<Trie<StateVar>>,
    /// Oracles, in creation order.
    pub oracles: Vec<StateVar>,
    /// Scalar equations.
    pub equations: Vec<Equation>,
    /// Node calls.
    pub calls: Vec<CallRecord>,
    /// Assertions: position and operand.
    pub asserts: Vec<(Pos, StateVar)>,
    /// Properties.
    pub props: Vec<Property>,
    /// The contract, if any.
    pub contract: Option<Contract>,
    /// Main-node annotation.
    pub is_main: bool,
    /// Stateless-function flag.
    pub is_function: bool,
    /// What each state variable stands for.
    pub source_map: FxHashMap<StateVar, SvarSource>,
    /// Oracle to the state variable it closes over.
    pub oracle_map: FxHashMap<StateVar, StateVar>,
    /// State variable to its defining expression.
    pub def_map: FxHashMap<StateVar, Expr>,
    /// Assumption state variables from input constraints.
    pub assumption_svars: Vec<StateVar>,
    /// History state variables, grouped by sort.
    pub history_svars: BTreeMap<Sort, Vec<StateVar>>,
}

impl Node {
    /// All output leaves, in index order.
    pub fn output_svars(&self) -> impl Iterator<Item = &StateVar> {
        self.outputs.values()
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "node {}", self.name)?;
        if self.is_function {
            write!(f, " (function)")?;
        }
        if self.is_main {
            write!(f, " (main)")?;
        }
        writeln!(f, " [{}]", self.opacity)?;
        writeln!(f, "  inputs  {}", self.inputs.map(|_, s| s.get().to_string()))?;
        writeln!(f, "  outputs {}", self.outputs.map(|_, s| s.get().to_string()))?;
        for l in &self.locals {
            writeln!(f, "  local   {}", l.map(|_, s| s.get().to_string()))?;
        }
        for o in &self.oracles {
            writeln!(f, "  oracle  {}", o.get())?;
        }
        for e in &self.equations {
            writeln!(f, "  {}", e)?;
        }
        for c in &self.calls {
            writeln!(f, "  {}", c)?;
        }
        for (pos, sv) in &self.asserts {
            writeln!(f, "  assert {} at {}", sv.get(), pos)?;
        }
        for p in &self.props {
            writeln!(f, "  prop {} ({:?}) = {}", p.name, p.kind, p.svar.get())?;
        }
        if let Some(c) = &self.contract {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}
