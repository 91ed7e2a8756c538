//! IR pretty-printing
//!
//! Human-readable dump of finalized streams, used by tests and tracing
//! output.

use super::{CallArgs, FunctionIr, Instr};
use std::fmt::Write;

fn fmt_args(args: &CallArgs) -> String {
    match args {
        CallArgs::List(list) => {
            let parts: Vec<String> = list.iter().map(|v| v.to_string()).collect();
            parts.join(", ")
        }
        CallArgs::Spread(v) => format!("...{}", v),
        CallArgs::Forward => "@forward".to_string(),
    }
}

/// Render one instruction on one line.
pub fn fmt_instr(instr: &Instr) -> String {
    match instr {
        Instr::LoadConst { dest, value } => format!("{} = const {}", dest, value),
        Instr::Copy { dest, src } => format!("{} = {}", dest, src),
        Instr::LoadArg { dest, index } => format!("{} = arg[{}]", dest, index),
        Instr::LoadThis { dest } => format!("{} = this", dest),
        Instr::LoadNewTarget { dest } => format!("{} = new.target", dest),
        Instr::DeclareRef { var } => format!("declare {}", var),
        Instr::LoadRef { dest, var } => format!("{} = load {}", dest, var),
        Instr::StoreRef { var, value } => format!("store {} <- {}", var, value),
        Instr::GetProperty { dest, object, name, cache, on_error } => {
            let cache = cache.map(|c| format!(" cache[{}]", c)).unwrap_or_default();
            format!("{} = {}.{}{} !{}", dest, object, name, cache, on_error)
        }
        Instr::SetProperty { object, name, value, on_error } => {
            format!("{}.{} = {} !{}", object, name, value, on_error)
        }
        Instr::DeleteProperty { dest, object, name, on_error } => {
            format!("{} = delete {}.{} !{}", dest, object, name, on_error)
        }
        Instr::GetElement { dest, object, key, on_error } => {
            format!("{} = {}[{}] !{}", dest, object, key, on_error)
        }
        Instr::DeleteElement { dest, object, key, on_error } => {
            format!("{} = delete {}[{}] !{}", dest, object, key, on_error)
        }
        Instr::SetElement { object, key, value, on_error } => {
            format!("{}[{}] = {} !{}", object, key, value, on_error)
        }
        Instr::Unary { dest, op, operand, on_error } => {
            let err = on_error.map(|t| format!(" !{}", t)).unwrap_or_default();
            format!("{} = {} {}{}", dest, op, operand, err)
        }
        Instr::Binary { dest, op, left, right, on_error } => {
            let err = on_error.map(|t| format!(" !{}", t)).unwrap_or_default();
            format!("{} = {} {} {}{}", dest, left, op, right, err)
        }
        Instr::Call { dest, callee, receiver, args, on_error } => {
            let recv = receiver.map(|r| format!("{}.", r)).unwrap_or_default();
            format!("{} = call {}{}({}) !{}", dest, recv, callee, fmt_args(args), on_error)
        }
        Instr::Construct { dest, callee, args, on_error } => {
            format!("{} = new {}({}) !{}", dest, callee, fmt_args(args), on_error)
        }
        Instr::NewObject { dest, prototype, on_error } => {
            let proto = prototype.map(|p| format!(" proto {}", p)).unwrap_or_default();
            format!("{} = object{} !{}", dest, proto, on_error)
        }
        Instr::NewFunction { dest, function, captures, on_error } => {
            let caps: Vec<String> = captures.iter().map(|c| c.to_string()).collect();
            format!("{} = closure {} [{}] !{}", dest, function, caps.join(", "), on_error)
        }
        Instr::NewClass { dest, constructor, parent, captures, on_error } => {
            let parent = parent.map(|p| format!(" extends {}", p)).unwrap_or_default();
            let caps: Vec<String> = captures.iter().map(|c| c.to_string()).collect();
            format!("{} = class {}{} [{}] !{}", dest, constructor, parent, caps.join(", "), on_error)
        }
        Instr::NewIterator { dest, object, keys, on_error } => {
            let kind = if *keys { "keys" } else { "values" };
            format!("{} = iter {} {} !{}", dest, kind, object, on_error)
        }
        Instr::IteratorNext { dest, iterator, exhausted, on_error } => {
            format!("{} = next {} ?{} !{}", dest, iterator, exhausted, on_error)
        }
        Instr::Label { target } => format!("{}:", target),
        Instr::Jump { target } => format!("jump {}", target),
        Instr::Branch { value, mode, expect, target } => {
            format!("branch {} {:?}={} -> {}", value, mode, expect, target)
        }
        Instr::Return { value } => match value {
            Some(v) => format!("return {}", v),
            None => "return".to_string(),
        },
        Instr::Propagate => "propagate".to_string(),
        Instr::Throw { value, on_error } => format!("throw {} !{}", value, on_error),
        Instr::CatchException { dest } => format!("{} = catch", dest),
        Instr::RaisePending { target } => format!("raise-pending -> {}", target),
        Instr::Suspend { value, resume, yield_to } => {
            format!("suspend {} resume {} yield {}", value, resume, yield_to)
        }
        Instr::ResumeDispatch { targets } => {
            let parts: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
            format!("dispatch [{}]", parts.join(", "))
        }
        Instr::ResumeValue { dest } => format!("{} = resume-value", dest),
        Instr::FinishGenerator => "finish-generator".to_string(),
        Instr::Retain { dest, value } => format!("{} = retain {}", dest, value),
        Instr::Release { value } => format!("release {}", value),
        Instr::ReleaseMany { values } => {
            let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            format!("release [{}]", parts.join(", "))
        }
        Instr::AutoRelease { value } => format!("autorelease {}", value),
        Instr::Stub { scope } => format!("stub {}", scope),
    }
}

/// Render a whole function stream, one indented instruction per line.
pub fn dump_function(func: &FunctionIr) -> String {
    let mut out = String::new();
    let gen = if func.is_generator { " generator" } else { "" };
    let _ = writeln!(out, "{} `{}`{} ({} params):", func.id, func.name, gen, func.param_count);
    for instr in &func.instrs {
        match instr {
            Instr::Label { .. } => {
                let _ = writeln!(out, "{}", fmt_instr(instr));
            }
            _ => {
                let _ = writeln!(out, "  {}", fmt_instr(instr));
            }
        }
    }
    out
}
