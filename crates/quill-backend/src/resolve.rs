//! Stub resolution
//!
//! Flattens a function's scope tree into one linear stream by splicing each
//! child scope's buffer over its stub placeholder, preserving the order the
//! stubs were planted in.

use crate::builder::ScopeData;
use crate::error::{CompileError, CompileResult};
use crate::ir::{Instr, ScopeId};

/// Flatten the tree rooted at `root` into a single stream.
pub(crate) fn flatten(scopes: &[ScopeData], root: ScopeId) -> CompileResult<Vec<Instr>> {
    let mut out = Vec::new();
    expand(scopes, root, &mut out)?;
    Ok(out)
}

fn expand(scopes: &[ScopeData], scope: ScopeId, out: &mut Vec<Instr>) -> CompileResult<()> {
    let data = scopes
        .get(scope.index())
        .ok_or_else(|| CompileError::internal(format!("unknown scope {}", scope)))?;
    for instr in &data.instrs {
        match instr {
            Instr::Stub { scope: child } => expand(scopes, *child, out)?,
            other => out.push(other.clone()),
        }
    }
    Ok(())
}
