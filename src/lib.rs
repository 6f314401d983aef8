//! The front-end compilation core of a model checker for a synchronous
//! dataflow language.
//!
//! The pipeline implemented here takes a type-checked AST describing a
//! hierarchy of reactive nodes and produces an intermediate node graph
//! suitable for transition-system encoding:
//!
//! * [ir::term]: a hash-consed term store. Structurally equal terms share
//!   one record and one tag.
//! * [front::sdf::norm]: the AST normalizer. Guards every temporally
//!   unbounded `pre`, lifts call arguments, and names everything it
//!   introduces.
//! * [front::sdf::gen]: the node generator. Flattens structured data into
//!   scalar state variables and lowers nodes, calls and contracts.
//! * [ir::deps]: a dependency graph over state variables, with
//!   cone-of-influence queries and DOT rendering.
//!
//! The parser, the surface type checker, the solver bridges and the
//! analysis loop are external collaborators: this crate starts from a
//! checked AST and stops at the compiled node graph.

#[macro_use]
pub mod ir;
pub mod front;
pub mod util;
