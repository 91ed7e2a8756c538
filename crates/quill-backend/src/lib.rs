//! Quill backend
//!
//! Turns semantic build requests from a front end into a typed,
//! reference-counted intermediate representation and lowers it to C source
//! against the `qu_*` runtime ABI. A front end drives a [`ModuleBuilder`]
//! through the authoring API; [`Backend::compile`] then flattens the scope
//! tree, runs the transform pipeline, allocates property-cache slots, and
//! renders the target text.
//!
//! ```no_run
//! use quill_backend::{Backend, ModuleBuilder, Options};
//! use quill_backend::ir::FunctionKind;
//!
//! # fn main() -> Result<(), quill_backend::CompileError> {
//! let mut builder = ModuleBuilder::new("hello");
//! let (main, root) = builder.begin_function("main", FunctionKind::Ordinary, None, false)?;
//! let greeting = builder.const_str(root, "hello")?;
//! builder.ret(root, Some(greeting))?;
//! builder.end_function(main)?;
//!
//! let source = Backend::new(Options::default()).compile(builder)?;
//! println!("{}", source);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cache;
pub mod config;
pub mod context;
pub mod emit;
pub mod error;
pub mod intrinsics;
pub mod ir;
mod resolve;
pub mod transform;

pub use builder::{ModuleBuilder, TryBlock};
pub use config::Options;
pub use error::{CompileError, CompileResult};

use ir::ModuleIr;
use tracing::info;

/// Compilation facade: one instance per option set, reusable across
/// modules.
#[derive(Debug, Default)]
pub struct Backend {
    options: Options,
}

impl Backend {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Finalize a fully authored module and render its target text.
    pub fn compile(&self, builder: ModuleBuilder) -> CompileResult<String> {
        let module = self.finalize(builder)?;
        emit::emit_module(&module, &self.options)
    }

    /// Finalize without emission; the transformed IR is returned for
    /// inspection.
    pub fn finalize(&self, builder: ModuleBuilder) -> CompileResult<ModuleIr> {
        let name = builder.module_name().to_string();
        let mut module = builder.finish()?;
        transform::Pipeline::new(&self.options).run(&mut module)?;
        if self.options.inline_property_cache {
            cache::assign_cache_slots(&mut module);
        }
        info!(
            module = %name,
            functions = module.functions.len(),
            cache_slots = module.property_cache_size,
            "module compiled"
        );
        Ok(module)
    }
}
