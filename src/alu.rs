//! The arithmetic/logic unit: a pure combinational function over a
//! decoded op and two operand words.
//!
//! Branch and jump "results" are handled specially (spec §4.3): for
//! branches the value stored in the ROB is the resolved target PC and
//! the taken/not-taken decision is returned alongside it; for JAL/JALR
//! the value written back to `rd` is `pc + 4` and the jump target is
//! computed separately.

use crate::decode::Op;

/// Outcome of executing a branch: whether it was taken, and the PC to
/// resume from in either case.
#[derive(Debug, Clone, Copy)]
pub struct BranchOutcome {
    pub taken: bool,
    pub target_pc: u32,
}

/// Execute a non-branch, non-jump ALU operation.
pub fn compute(op: Op, a: u32, b: u32) -> u32 {
    match op {
        Op::Add | Op::Addi => a.wrapping_add(b),
        Op::Sub => a.wrapping_sub(b),
        Op::And | Op::Andi => a & b,
        Op::Or | Op::Ori => a | b,
        Op::Xor | Op::Xori => a ^ b,
        Op::Sll | Op::Slli => a.wrapping_shl(b & 0x1f),
        Op::Srl | Op::Srli => a.wrapping_shr(b & 0x1f),
        Op::Sra | Op::Srai => ((a as i32).wrapping_shr(b & 0x1f)) as u32,
        Op::Slt | Op::Slti => ((a as i32) < (b as i32)) as u32,
        Op::Sltu | Op::Sltiu => (a < b) as u32,
        // LUI's immediate already carries the shifted-out U-immediate
        // form produced by `decode::imm_u`, so the "second operand" is
        // simply passed through.
        Op::Lui => b,
        other => panic!("alu::compute called with non-ALU op {other:?}"),
    }
}

/// Evaluate a conditional branch's condition given its two register
/// operands, the byte-offset immediate, and the PC of the branch.
pub fn resolve_branch(op: Op, rs1_value: u32, rs2_value: u32, imm: i32, pc: u32) -> BranchOutcome {
    let taken = match op {
        Op::Beq => rs1_value == rs2_value,
        Op::Bne => rs1_value != rs2_value,
        Op::Blt => (rs1_value as i32) < (rs2_value as i32),
        Op::Bge => (rs1_value as i32) >= (rs2_value as i32),
        Op::Bltu => rs1_value < rs2_value,
        Op::Bgeu => rs1_value >= rs2_value,
        other => panic!("resolve_branch called with non-branch op {other:?}"),
    };
    let target_pc = pc.wrapping_add(imm as u32);
    let fallthrough_pc = pc.wrapping_add(4);
    BranchOutcome {
        taken,
        target_pc: if taken { target_pc } else { fallthrough_pc },
    }
}

/// Compute the jump target for JAL/JALR. The link value (`pc + 4`) is
/// the caller's responsibility to write to `rd`; this returns only the
/// new PC.
pub fn resolve_jump(op: Op, pc: u32, rs1_value: u32, imm: i32) -> u32 {
    match op {
        Op::Jal => pc.wrapping_add(imm as u32),
        Op::Jalr => rs1_value.wrapping_add(imm as u32) & !1u32,
        other => panic!("resolve_jump called with non-jump op {other:?}"),
    }
}
