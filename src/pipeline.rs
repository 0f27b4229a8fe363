//! Per-cycle orchestration: the commit / write-back / execute / issue
//! / fetch state machine (spec §4.8).
//!
//! Stages run in that reverse order within a single [`Engine::tick`]
//! call so that a value produced this cycle is not visible to operand
//! capture until the next cycle (spec §5: "Result visibility").

use log::{debug, info, trace};

use crate::alu;
use crate::decode::{self, Op};
use crate::error::SimError;
use crate::load_store_buffer::LoadStoreBuffer;
use crate::memory::Memory;
use crate::register_file::RegisterFile;
use crate::reservation_station::ReservationStation;
use crate::rob::{AllocRequest, ReorderBuffer};

pub const ROB_CAPACITY: usize = 32;
pub const RS_CAPACITY: usize = 16;
pub const LSB_CAPACITY: usize = 16;

/// The reserved instruction word that halts the simulator (spec §6).
pub const HALT_WORD: u32 = 0x0FF0_0513;

/// What a single [`Engine::tick`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    Halted { result: u8 },
}

pub struct Engine {
    memory: Memory,
    regfile: RegisterFile,
    rob: ReorderBuffer,
    rs: ReservationStation,
    lsb: LoadStoreBuffer,
    halt_seen: bool,
}

impl Engine {
    pub fn new(memory: Memory) -> Self {
        Engine {
            memory,
            regfile: RegisterFile::new(),
            rob: ReorderBuffer::new(ROB_CAPACITY),
            rs: ReservationStation::new(RS_CAPACITY),
            lsb: LoadStoreBuffer::new(LSB_CAPACITY),
            halt_seen: false,
        }
    }

    pub fn register(&self, index: u8) -> u32 {
        self.regfile.read(index)
    }

    /// Run until halt, returning the byte the sentinel prints.
    pub fn run(&mut self) -> Result<u8, SimError> {
        loop {
            if let TickOutcome::Halted { result } = self.tick()? {
                return Ok(result);
            }
        }
    }

    pub fn tick(&mut self) -> Result<TickOutcome, SimError> {
        if self.commit()? {
            return Ok(TickOutcome::Running);
        }
        if self.halt_seen && self.rob.is_empty() {
            let result = (self.regfile.read(10) & 0xff) as u8;
            info!("halted, reg[10] & 0xff = {result}");
            return Ok(TickOutcome::Halted { result });
        }

        self.write_back();
        self.execute();
        if !self.halt_seen {
            self.issue()?;
        }

        Ok(TickOutcome::Running)
    }

    /// Returns `true` if a misprediction flush happened (the cycle
    /// ends early per spec §4.8 step 1).
    fn commit(&mut self) -> Result<bool, SimError> {
        if let Some(correct_pc) = self.rob.check_mispredict() {
            trace!("misprediction detected, recovering to pc=0x{correct_pc:08x}");
            self.rob.flush();
            self.rs.flush();
            self.lsb.flush();
            self.memory.set_pc(correct_pc);
            self.halt_seen = false;
            return Ok(true);
        }

        if !self.rob.ready_to_commit() {
            return Ok(false);
        }

        let (rob_id, value, dest, is_store) = self.rob.commit();
        if is_store {
            self.lsb.commit_store(rob_id, &mut self.memory);
            self.lsb.remove(rob_id);
        }
        // Loads are already freed from the LSB once their result lands
        // (write_back below); ALU/branch/jump entries live in the RS
        // until their owning ROB entry retires here (spec §4.6: "freed
        // on next cycle" after executing — "next cycle" is commit).
        self.rs.remove(rob_id);
        if dest != 0 {
            self.regfile.set(dest, value);
            self.regfile.clear_reorder_if_matches(dest, rob_id);
        }
        debug!("commit rob={rob_id} dest=x{dest} value=0x{value:08x}");
        Ok(false)
    }

    fn write_back(&mut self) {
        let ready = self.rs.pick_ready();
        if let Some(entry) = ready {
            self.rs.mark_executed(entry.rob_id);
            let (value, branch_outcome) = match entry.op {
                op if matches!(
                    op,
                    Op::Beq | Op::Bne | Op::Blt | Op::Bge | Op::Bltu | Op::Bgeu
                ) =>
                {
                    let outcome = alu::resolve_branch(op, entry.vj, entry.vk, entry.imm, entry.pc);
                    (outcome.target_pc, Some(outcome))
                }
                op @ Op::Jal => {
                    let target = alu::resolve_jump(op, entry.pc, entry.vj, entry.imm);
                    (entry.pc.wrapping_add(4), Some(alu::BranchOutcome {
                        taken: true,
                        target_pc: target,
                    }))
                }
                op @ Op::Jalr => {
                    let target = alu::resolve_jump(op, entry.pc, entry.vj, entry.imm);
                    (entry.pc.wrapping_add(4), Some(alu::BranchOutcome {
                        taken: true,
                        target_pc: target,
                    }))
                }
                Op::Auipc => (entry.pc.wrapping_add(entry.imm as u32), None),
                op => (alu::compute(op, entry.vj, entry.vk), None),
            };

            self.rob.write_result(entry.rob_id, value);
            if let Some(outcome) = branch_outcome {
                self.rob
                    .write_branch_result(entry.rob_id, outcome.target_pc, outcome.taken);
            }
            self.rs.broadcast(entry.rob_id, value);
            self.lsb.broadcast(entry.rob_id, value);
            trace!("write-back rob={} value=0x{value:08x}", entry.rob_id);
        }

        if let Some(entry) = self.lsb.pick_ready() {
            if let Some(value) = self.lsb.advance_cycle(entry.rob_id, &self.memory) {
                self.rob.write_result(entry.rob_id, value);
                self.rs.broadcast(entry.rob_id, value);
                self.lsb.broadcast(entry.rob_id, value);
                trace!("write-back rob={} value=0x{value:08x}", entry.rob_id);
                if !entry.is_store {
                    self.lsb.remove(entry.rob_id);
                }
            }
        }
    }

    /// Memory-op latency advance is folded into `write_back` above
    /// (the LSB's own 3-cycle counter governs when a result appears);
    /// this stage is retained to document the per-cycle ordering named
    /// in spec §4.8 even though the unified ALU completes in one cycle
    /// and has nothing further to advance here.
    fn execute(&mut self) {}

    fn issue(&mut self) -> Result<(), SimError> {
        if self.rob.is_full() {
            return Ok(());
        }

        let pc = self.memory.get_pc();
        let word = self.memory.read_word(pc);

        if word == HALT_WORD {
            self.halt_seen = true;
            trace!("halt sentinel fetched at pc=0x{pc:08x}");
            return Ok(());
        }

        let decoded = decode::decode(word);
        if decoded.op == Op::Invalid {
            return Err(SimError::UndecodableInstruction { pc, word });
        }

        let needs_lsb = decoded.is_load || decoded.is_store;
        let buffer_available = if needs_lsb {
            self.lsb.has_free_entry()
        } else {
            self.rs.has_free_entry()
        };
        if !buffer_available {
            return Ok(()); // stall: buffer full
        }

        let rob_id = match self.rob.allocate(
            word,
            pc,
            decoded.rd,
            AllocRequest {
                is_store: decoded.is_store,
                is_branch: decoded.is_branch || decoded.is_jump,
                predicted_taken: false,
            },
        ) {
            Some(id) => id,
            None => return Ok(()),
        };

        // Capture source operands against the *old* rename map before
        // publishing the new one: an instruction that reads and writes
        // the same register (e.g. `addi x5,x5,1`) must see its
        // register's previous producer, not itself.
        if needs_lsb {
            self.lsb.issue(&decoded, rob_id, &self.regfile, &self.rob);
        } else {
            self.rs.issue(&decoded, pc, rob_id, &self.regfile, &self.rob);
        }

        if decoded.rd != 0 {
            self.regfile.set_reorder(decoded.rd, rob_id);
        }

        trace!("issue rob={rob_id} pc=0x{pc:08x} op={:?}", decoded.op);

        // Always-not-taken prediction: sequential fall-through for
        // everything, including jumps (whose real target is only
        // known once resolved; the mismatch triggers recovery exactly
        // like a taken branch, spec §4.8 + §9 "implementers may
        // substitute a ... predictor").
        self.memory.step_pc();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_from_words(words: &[u32]) -> Memory {
        let mut mem = Memory::new();
        for (i, &w) in words.iter().enumerate() {
            mem.write_word((i * 4) as u32, w);
        }
        mem
    }

    #[test]
    fn immediate_add_scenario() {
        let mem = image_from_words(&[0x0050_0513, HALT_WORD]); // addi x10,x0,5
        let mut engine = Engine::new(mem);
        let result = engine.run().unwrap();
        assert_eq!(result, 5);
    }

    #[test]
    fn register_add_scenario() {
        let mem = image_from_words(&[
            0x0070_0293, // addi x5,x0,7
            0x0230_0313, // addi x6,x0,35
            0x0062_8533, // add x10,x5,x6
            HALT_WORD,
        ]);
        let mut engine = Engine::new(mem);
        let result = engine.run().unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn taken_branch_skips_instruction() {
        let mem = image_from_words(&[
            0x0010_0513, // addi x10,x0,1
            0x0000_0463, // beq x0,x0,+8 -> skips the next word straight to the halt
            0x0630_0513, // addi x10,x0,99 (should be skipped)
            HALT_WORD,
        ]);
        let mut engine = Engine::new(mem);
        let result = engine.run().unwrap();
        assert_eq!(result, 1);
    }

    #[test]
    fn undecodable_instruction_is_an_error() {
        let mem = image_from_words(&[0x0000_0000]);
        let mut engine = Engine::new(mem);
        assert!(engine.run().is_err());
    }
}
