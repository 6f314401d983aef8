//! The intermediate representation: hash-consed terms, state variables,
//! the transition-system view, and the dependency graph over it.

#[macro_use]
pub mod term;
pub mod deps;
pub mod svar;
pub mod trans;
