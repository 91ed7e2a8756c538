//! Transform pipeline
//!
//! Ordered passes over each flattened function stream. Pass selection comes
//! from [`Options`](crate::config::Options); disabled passes are skipped,
//! never replaced by weaker variants, except slot resolution whose toggle
//! selects grouped versus flat numbering. Retain/release synthesis always
//! runs: it is semantics, not an optimization.

mod assign;
mod autorelease;
mod fold;
mod loads;
mod merge;
mod retain;
mod slots;
mod varref;

use crate::config::Options;
use crate::error::CompileResult;
use crate::ir::verify::verify_function;
use crate::ir::{FunctionIr, ModuleIr};
use tracing::{debug, trace};

pub struct Pipeline<'a> {
    options: &'a Options,
}

impl<'a> Pipeline<'a> {
    pub fn new(options: &'a Options) -> Self {
        Self { options }
    }

    /// Run every enabled pass over every function, then re-verify.
    pub fn run(&self, module: &mut ModuleIr) -> CompileResult<()> {
        let mut functions = std::mem::take(&mut module.functions);
        for func in &mut functions {
            self.run_function(module, func)?;
        }
        module.functions = functions;
        for func in &module.functions {
            verify_function(module, func)?;
        }
        Ok(())
    }

    fn run_function(&self, module: &mut ModuleIr, func: &mut FunctionIr) -> CompileResult<()> {
        debug!(function = %func.name, instrs = func.len(), "transform");

        if self.options.fold_constants {
            let mut iterations = 0u32;
            loop {
                let changes = fold::run(func);
                trace!(function = %func.name, changes, "fold");
                iterations += 1;
                if changes == 0 || iterations >= self.options.max_fold_iterations {
                    break;
                }
            }
        }
        if self.options.optimize_var_refs {
            let removed = varref::run(func, &module.vars);
            trace!(function = %func.name, removed, "varref");
        }
        if self.options.optimize_loads {
            let forwarded = loads::run(func, &module.vars);
            trace!(function = %func.name, forwarded, "loads");
        }
        if self.options.optimize_assignments {
            let removed = assign::run(func, &module.values);
            trace!(function = %func.name, removed, "assign");
        }

        slots::run(func, &module.values, &module.vars, self.options.resolve_slots);
        retain::run(func, &mut module.values)?;
        if self.options.auto_release {
            autorelease::run(func);
        }
        if self.options.merge_releases {
            merge::run(func);
        }

        trace!(function = %func.name, instrs = func.len(), "transform done");
        Ok(())
    }
}
