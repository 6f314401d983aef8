//! Error implementation for the synchronous-dataflow front-end.

use thiserror::Error;

use super::ast::Pos;

use std::fmt::{self, Display, Formatter};

/// An error in node compilation.
#[derive(Error, Debug)]
pub enum ErrorKind {
    /// Operand types disagree with a symbol's signature.
    #[error("operand types disagree: {0}")]
    TypeMismatch(String),
    /// Two index tries have incompatible key shapes.
    #[error("index shapes disagree: {lhs} vs {rhs}")]
    ShapeMismatch {
        /// Rendered left-hand shape.
        lhs: String,
        /// Rendered right-hand shape.
        rhs: String,
    },
    /// A reference points to an identifier that was neither declared nor
    /// generated.
    #[error("unbound identifier '{0}'")]
    UnboundIdentifier(String),
    /// A normalization postcondition was violated.
    #[error("normalization invariant violated: {0}")]
    InvariantViolation(String),
    /// A construct an earlier pass must eliminate is still present.
    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),
}

/// An error with an optional source position.
#[derive(Debug)]
pub struct Error {
    /// The error.
    pub kind: Box<ErrorKind>,
    /// Where it happened.
    pub pos: Option<Pos>,
}

impl Error {
    /// New error, with position.
    pub fn new(kind: ErrorKind, pos: Pos) -> Self {
        Error {
            kind: Box::new(kind),
            pos: Some(pos),
        }
    }

    /// Attach a position, if none is present yet.
    pub fn with_pos(mut self, pos: Pos) -> Self {
        self.pos.get_or_insert(pos);
        self
    }

    /// Does this error abort the whole compilation, as opposed to the
    /// current node?
    pub fn is_fatal(&self) -> bool {
        matches!(
            &*self.kind,
            ErrorKind::TypeMismatch(_) | ErrorKind::InvariantViolation(_)
        )
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "error: {}", self.kind)?;
        if let Some(p) = &self.pos {
            write!(f, " at {}", p)?;
        }
        Ok(())
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind: Box::new(kind),
            pos: None,
        }
    }
}

impl From<crate::ir::term::TypeError> for Error {
    fn from(e: crate::ir::term::TypeError) -> Self {
        ErrorKind::TypeMismatch(e.to_string()).into()
    }
}

/// Fallible value.
pub type Result<T> = std::result::Result<T, Error>;
