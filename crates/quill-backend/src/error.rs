//! Compilation errors
//!
//! Two classes exist: construction-time defects raised while the front end
//! drives the builder, and internal invariant violations raised when a
//! pipeline pass meets a stream shape it does not recognize. Modeled program
//! failures (throws, yields) are ordinary IR and never surface here.

use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("no exception target in scope (builder used outside a function body)")]
    NoExceptionTarget,

    #[error("value v{value} belongs to function {owner} but was used in function {used_in}")]
    ForeignValue { value: u32, owner: u32, used_in: u32 },

    #[error("`{name}` is not assignable")]
    NotAssignable { name: String },

    #[error("duplicate declaration of `{name}` in the same scope")]
    DuplicateBinding { name: String },

    #[error("emission into closed scope {scope}")]
    ClosedScope { scope: u32 },

    #[error("scope {scope} was never closed")]
    UnclosedScope { scope: u32 },

    #[error("function `{name}` was never finalized")]
    UnclosedFunction { name: String },

    #[error("suspend emitted in non-generator function `{name}`")]
    NotAGenerator { name: String },

    #[error("try construct needs a catch or a finally arm")]
    EmptyTryConstruct,

    #[error("closure over `{name}` is not possible: bound to a computed variable")]
    UncapturableBinding { name: String },

    #[error("stream verification failed: {message}")]
    Verification { message: String },

    #[error("internal compiler error: {message}")]
    Internal { message: String },
}

impl CompileError {
    /// Shorthand for internal invariant violations inside pipeline passes.
    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal {
            message: message.into(),
        }
    }
}
