//! Target-text emission
//!
//! Renders the finalized module as C source against the `qu_*` runtime ABI:
//! atom and string-constant tables, the property-cache table, one static
//! function per compiled function, per-function descriptors, and the module
//! registration entry point. The emitter is a pure function of the
//! finalized IR; every semantic decision was made upstream.

mod function;

use crate::config::Options;
use crate::error::CompileResult;
use crate::ir::{FunctionIr, FunctionKind, ModuleIr};
use std::fmt::Write;
use tracing::debug;

pub(crate) struct Emitter<'a> {
    module: &'a ModuleIr,
    options: &'a Options,
    /// Named `#define` for each atom, in table order.
    atom_syms: Vec<String>,
    out: String,
}

/// Render a whole module to target text.
pub fn emit_module(module: &ModuleIr, options: &Options) -> CompileResult<String> {
    debug!(module = %module.name, functions = module.functions.len(), "emit");
    let mut emitter = Emitter {
        module,
        options,
        atom_syms: atom_symbols(module),
        out: String::new(),
    };
    emitter.run()?;
    Ok(emitter.out)
}

/// Constant names for the atom table. Mangling can collide ("a-b" and
/// "a_b"); the table index disambiguates.
fn atom_symbols(module: &ModuleIr) -> Vec<String> {
    let mut seen = rustc_hash::FxHashSet::default();
    module
        .atoms
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mut sym = format!("qu_atom_{}", c_ident(name));
            while !seen.insert(sym.clone()) {
                sym = format!("{}_{}", sym, i);
            }
            sym
        })
        .collect()
}

/// Mangle an arbitrary name into a C identifier fragment.
pub(crate) fn c_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() || out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

pub(crate) fn function_symbol(func: &FunctionIr) -> String {
    format!("fn{}_{}", func.id.as_u32(), c_ident(&func.name))
}

fn escape_c(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Parameter list for a function's shape. Constructors receive the
/// construction target explicitly; every other shape reads the shared
/// calling convention.
pub(crate) fn param_list(kind: FunctionKind) -> &'static str {
    if kind.has_new_target() {
        "qu_ctx *ctx, qu_value self, qu_value new_target, int argc, qu_value *argv"
    } else {
        "qu_ctx *ctx, qu_value self, int argc, qu_value *argv"
    }
}

fn shape_flag(kind: FunctionKind) -> &'static str {
    match kind {
        FunctionKind::Ordinary => "QU_FN_ORDINARY",
        FunctionKind::Arrow => "QU_FN_ARROW",
        FunctionKind::Method => "QU_FN_METHOD",
        FunctionKind::Constructor => "QU_FN_CONSTRUCTOR",
    }
}

impl<'a> Emitter<'a> {
    // Writing into a String cannot fail; the emitter only errors on
    // malformed IR (see function.rs).
    pub(crate) fn w(&mut self, args: std::fmt::Arguments<'_>) {
        let _ = self.out.write_fmt(args);
        self.out.push('\n');
    }

    pub(crate) fn atom_sym(&self, atom: crate::ir::Atom) -> &str {
        &self.atom_syms[atom.0 as usize]
    }

    fn run(&mut self) -> CompileResult<()> {
        self.prelude();
        self.tables();
        self.forward_declarations();
        let module = self.module;
        for func in &module.functions {
            self.emit_function(func)?;
        }
        self.descriptors();
        self.registration();
        Ok(())
    }

    fn prelude(&mut self) {
        self.w(format_args!(
            "/* module \"{}\" */",
            escape_c(&self.module.name)
        ));
        self.w(format_args!("#include \"quill_runtime.h\""));
        self.w(format_args!(""));
    }

    fn tables(&mut self) {
        if !self.module.atoms.is_empty() {
            self.w(format_args!("static const char *const qu_atom_names[] = {{"));
            let names: Vec<String> = self.module.atoms.iter().map(escape_c).collect();
            for name in names {
                self.w(format_args!("    \"{}\",", name));
            }
            self.w(format_args!("}};"));
            self.w(format_args!(
                "static qu_atom qu_atoms[{}];",
                self.module.atoms.len()
            ));
            for i in 0..self.atom_syms.len() {
                let sym = self.atom_syms[i].clone();
                self.w(format_args!("#define {} qu_atoms[{}]", sym, i));
            }
            self.w(format_args!(""));
        }

        if !self.module.strings.is_empty() {
            self.w(format_args!(
                "static const char *const qu_string_texts[] = {{"
            ));
            let texts: Vec<String> = self.module.strings.iter().map(escape_c).collect();
            for text in texts {
                self.w(format_args!("    \"{}\",", text));
            }
            self.w(format_args!("}};"));
            self.w(format_args!(
                "static qu_value qu_string_consts[{}];",
                self.module.strings.len()
            ));
            self.w(format_args!(""));
        }

        if self.module.property_cache_size > 0 {
            self.w(format_args!(
                "static qu_cache_slot qu_prop_cache[{}];",
                self.module.property_cache_size
            ));
            self.w(format_args!(""));
        }
    }

    fn forward_declarations(&mut self) {
        let module = self.module;
        for func in &module.functions {
            self.w(format_args!(
                "static qu_value {}({});",
                function_symbol(func),
                param_list(func.kind)
            ));
        }
        self.w(format_args!(""));
    }

    fn descriptors(&mut self) {
        self.w(format_args!("static const qu_func_desc qu_funcs[] = {{"));
        let module = self.module;
        for func in &module.functions {
            self.w(format_args!(
                "    {{ \"{}\", {}, {}, {}, {} }},",
                escape_c(&func.name),
                function_symbol(func),
                func.param_count,
                shape_flag(func.kind),
                u8::from(func.is_generator),
            ));
        }
        self.w(format_args!("}};"));
        self.w(format_args!(""));
    }

    fn registration(&mut self) {
        let name = c_ident(&self.module.name);
        self.w(format_args!(
            "qu_module *qu_module_register_{}(qu_ctx *ctx) {{",
            name
        ));
        self.w(format_args!(
            "    qu_module *m = qu_module_new(ctx, \"{}\");",
            escape_c(&self.module.name)
        ));
        if !self.module.atoms.is_empty() {
            self.w(format_args!(
                "    qu_module_atoms(m, {}, qu_atom_names, qu_atoms);",
                self.module.atoms.len()
            ));
        }
        if !self.module.strings.is_empty() {
            self.w(format_args!(
                "    qu_module_strings(m, {}, qu_string_texts, qu_string_consts);",
                self.module.strings.len()
            ));
        }
        if self.module.property_cache_size > 0 {
            self.w(format_args!(
                "    qu_module_cache(m, {}, qu_prop_cache);",
                self.module.property_cache_size
            ));
        }
        self.w(format_args!(
            "    qu_module_funcs(m, {}, qu_funcs);",
            self.module.functions.len()
        ));
        self.w(format_args!("    return m;"));
        self.w(format_args!("}}"));
        self.w(format_args!(""));
        // Startup hook: hand the factory to the process-wide module table.
        self.w(format_args!(
            "__attribute__((constructor)) static void qu_module_init_{}(void) {{",
            name
        ));
        self.w(format_args!(
            "    qu_module_table_add(\"{}\", qu_module_register_{});",
            escape_c(&self.module.name),
            name
        ));
        self.w(format_args!("}}"));
    }
}
