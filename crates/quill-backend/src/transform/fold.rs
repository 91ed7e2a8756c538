//! Constant folding
//!
//! Replaces operators over provably-constant operands with literal loads and
//! decides constant branches. Reports a change count; the driver re-runs the
//! pass until it reports none or the iteration bound is hit.

use crate::ir::{BinaryOp, BranchMode, Constant, Instr, UnaryOp};
use rustc_hash::FxHashMap;

fn to_i32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let m = n.trunc() as i64;
    (m & 0xFFFF_FFFF) as u32 as i32
}

fn eval_unary(op: UnaryOp, c: Constant) -> Option<Constant> {
    match (op, c) {
        (UnaryOp::Neg, Constant::Number(n)) => Some(Constant::Number(-n)),
        (UnaryOp::BitNot, Constant::Number(n)) => Some(Constant::Number(!to_i32(n) as f64)),
        (UnaryOp::Not, c) => c.truthy().map(|b| Constant::Bool(!b)),
        (UnaryOp::Void, _) => Some(Constant::Undefined),
        _ => None,
    }
}

fn eval_binary(op: BinaryOp, left: Constant, right: Constant) -> Option<Constant> {
    use BinaryOp::*;
    if let (Constant::Number(a), Constant::Number(b)) = (left, right) {
        return match op {
            Add => Some(Constant::Number(a + b)),
            Sub => Some(Constant::Number(a - b)),
            Mul => Some(Constant::Number(a * b)),
            Div => Some(Constant::Number(a / b)),
            Mod => Some(Constant::Number(a % b)),
            Eq | StrictEq => Some(Constant::Bool(a == b)),
            Ne | StrictNe => Some(Constant::Bool(a != b)),
            Lt => Some(Constant::Bool(a < b)),
            Le => Some(Constant::Bool(a <= b)),
            Gt => Some(Constant::Bool(a > b)),
            Ge => Some(Constant::Bool(a >= b)),
            BitAnd => Some(Constant::Number((to_i32(a) & to_i32(b)) as f64)),
            BitOr => Some(Constant::Number((to_i32(a) | to_i32(b)) as f64)),
            BitXor => Some(Constant::Number((to_i32(a) ^ to_i32(b)) as f64)),
            Shl => Some(Constant::Number((to_i32(a) << (to_i32(b) & 31)) as f64)),
            Shr => Some(Constant::Number((to_i32(a) >> (to_i32(b) & 31)) as f64)),
            Ushr => Some(Constant::Number(
                ((to_i32(a) as u32) >> (to_i32(b) & 31)) as f64,
            )),
            InstanceOf | In => None,
        };
    }
    if let (Constant::Bool(a), Constant::Bool(b)) = (left, right) {
        return match op {
            Eq | StrictEq => Some(Constant::Bool(a == b)),
            Ne | StrictNe => Some(Constant::Bool(a != b)),
            _ => None,
        };
    }
    None
}

/// One folding sweep; returns the number of instructions changed or removed.
pub(super) fn run(func: &mut crate::ir::FunctionIr) -> usize {
    let mut consts = FxHashMap::default();
    for instr in &func.instrs {
        if let Instr::LoadConst { dest, value } = instr {
            consts.insert(*dest, *value);
        }
    }

    let mut changes = 0;
    let mut out = Vec::with_capacity(func.instrs.len());
    for instr in func.instrs.drain(..) {
        match instr {
            Instr::Unary {
                dest,
                op,
                operand,
                on_error,
            } if consts.contains_key(&operand) => {
                match eval_unary(op, consts[&operand]) {
                    Some(value) => {
                        consts.insert(dest, value);
                        out.push(Instr::LoadConst { dest, value });
                        changes += 1;
                    }
                    None => out.push(Instr::Unary {
                        dest,
                        op,
                        operand,
                        on_error,
                    }),
                }
            }
            Instr::Binary {
                dest,
                op,
                left,
                right,
                on_error,
            } if consts.contains_key(&left) && consts.contains_key(&right) => {
                match eval_binary(op, consts[&left], consts[&right]) {
                    Some(value) => {
                        consts.insert(dest, value);
                        out.push(Instr::LoadConst { dest, value });
                        changes += 1;
                    }
                    None => out.push(Instr::Binary {
                        dest,
                        op,
                        left,
                        right,
                        on_error,
                    }),
                }
            }
            Instr::Branch {
                value,
                mode,
                expect,
                target,
            } if consts.contains_key(&value) => {
                let c = consts[&value];
                let decided = match mode {
                    BranchMode::Truthy => c.truthy(),
                    BranchMode::NotNullish => Some(c.not_nullish()),
                };
                match decided {
                    Some(taken) if taken == expect => {
                        out.push(Instr::Jump { target });
                        changes += 1;
                    }
                    Some(_) => {
                        // Never taken; the branch disappears.
                        changes += 1;
                    }
                    None => out.push(Instr::Branch {
                        value,
                        mode,
                        expect,
                        target,
                    }),
                }
            }
            other => out.push(other),
        }
    }
    func.instrs = out;
    changes
}
