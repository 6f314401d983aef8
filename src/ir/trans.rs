//! The transition-system view of a compiled node tree.
//!
//! The encoder (outside this crate) turns the node graph into initial and
//! transition relations; this module is the minimal shape of that result
//! that the dependency analysis consumes.

use super::svar::StateVar;
use super::term::Term;
use std::fmt::{self, Display, Formatter};

/// A transition system: conjunctions of terms over state-variable
/// instances, plus instantiated subsystems.
#[derive(Clone, Debug, Default)]
pub struct TransitionSystem {
    /// System name.
    pub name: String,
    /// Conjuncts of the initial-state relation.
    pub init: Vec<Term>,
    /// Conjuncts of the transition relation.
    pub trans: Vec<Term>,
    /// Instantiated subsystems.
    pub instances: Vec<Instance>,
    /// Properties to analyze.
    pub properties: Vec<SysProperty>,
}

/// One instantiation of a subsystem.
#[derive(Clone, Debug)]
pub struct Instance {
    /// Name of the instantiated system.
    pub subsystem: String,
    /// Parent-to-child state-variable bindings.
    pub var_map: Vec<(StateVar, StateVar)>,
}

/// A property over a system's state variables.
#[derive(Clone, Debug)]
pub struct SysProperty {
    /// Property name.
    pub name: String,
    /// The property term.
    pub term: Term,
}

impl Display for TransitionSystem {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "system {} {{", self.name)?;
        for t in &self.init {
            writeln!(f, "  init  {}", t)?;
        }
        for t in &self.trans {
            writeln!(f, "  trans {}", t)?;
        }
        for i in &self.instances {
            writeln!(f, "  instance {} ({} bindings)", i.subsystem, i.var_map.len())?;
        }
        for p in &self.properties {
            writeln!(f, "  prop {} = {}", p.name, p.term)?;
        }
        write!(f, "}}")
    }
}
