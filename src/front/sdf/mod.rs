//! The synchronous-dataflow front-end.
//!
//! [compile] is the entry point: it resets the fresh-name counter and
//! the state-variable registry, normalizes the type-checked program
//! ([norm]), and lowers it into the intermediate node model ([gen]).
//! Compilation is sequential by declaration: a node may only call nodes
//! compiled before it.

pub mod ast;
pub mod ctx;
pub mod error;
pub mod expr;
pub mod gen;
pub mod index;
pub mod node;
pub mod norm;
pub mod state;

use self::error::Result;

/// Compile a type-checked program into the intermediate node graph.
pub fn compile(program: ast::Program, ctx: &ctx::TypeCtx) -> Result<state::CompilerState> {
    crate::util::ns::reset_fresh_ids();
    crate::ir::svar::clear_registry();
    let (program, tables) = norm::normalize(program, ctx)?;
    gen::lower(&program, &tables, ctx)
}

/// Compile, continuing past nodes that fail with a recoverable
/// diagnostic. Fatal errors still abort. Returns the state and the
/// diagnostics of the skipped nodes.
pub fn compile_tolerant(
    program: ast::Program,
    ctx: &ctx::TypeCtx,
) -> Result<(state::CompilerState, Vec<error::Error>)> {
    crate::util::ns::reset_fresh_ids();
    crate::ir::svar::clear_registry();
    let (program, tables) = norm::normalize(program, ctx)?;
    gen::lower_tolerant(&program, &tables, ctx)
}

#[cfg(test)]
pub(crate) use crate::util::testing;

#[cfg(test)]
mod test;
