//! Stream verification
//!
//! Structural checks run after stub resolution: every jump lands on a label
//! defined exactly once, no stub placeholder survives, and every value in
//! the stream belongs to the function it appears in. Violations are internal
//! defects, not user errors.

use super::{FunctionIr, Instr, ModuleIr};
use crate::error::{CompileError, CompileResult};
use rustc_hash::{FxHashMap, FxHashSet};

/// Verify one flattened function against the module side tables.
pub fn verify_function(module: &ModuleIr, func: &FunctionIr) -> CompileResult<()> {
    let mut labels = FxHashMap::default();
    for instr in &func.instrs {
        if let Instr::Stub { scope } = instr {
            return Err(CompileError::Verification {
                message: format!("{}: unresolved stub for {}", func.name, scope),
            });
        }
        if let Some(label) = instr.defined_label() {
            if labels.insert(label.id, label).is_some() {
                return Err(CompileError::Verification {
                    message: format!("{}: label {} defined twice", func.name, label),
                });
            }
        }
    }

    let mut seen_refs = FxHashSet::default();
    for instr in &func.instrs {
        let mut bad = None;
        instr.for_each_target(|t| {
            if !labels.contains_key(&t.id) {
                bad = Some(t);
            }
        });
        if let Some(t) = bad {
            return Err(CompileError::Verification {
                message: format!("{}: jump to undefined label {}", func.name, t),
            });
        }

        let mut foreign = None;
        instr.for_each_read(|v| {
            if module.values.owner(v) != func.id {
                foreign = Some(v);
            }
        });
        if let Some(v) = instr.result() {
            if module.values.owner(v) != func.id {
                foreign = Some(v);
            }
        }
        if let Some(v) = foreign {
            return Err(CompileError::Verification {
                message: format!("{}: value {} owned by another function", func.name, v),
            });
        }

        if let Some((var, _)) = instr.ref_use() {
            seen_refs.insert(var);
            if module.vars.get(var).owner != func.id {
                let captured = func.captures.iter().any(|c| c.inner == var);
                if !captured {
                    return Err(CompileError::Verification {
                        message: format!("{}: reference {} owned by another function", func.name, var),
                    });
                }
            }
        }
    }

    Ok(())
}

/// Verify every function of a module.
pub fn verify_module(module: &ModuleIr) -> CompileResult<()> {
    for func in &module.functions {
        verify_function(module, func)?;
    }
    Ok(())
}
