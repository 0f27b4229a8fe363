//! The unified reservation station: an unordered pool of pending
//! arithmetic/logic/branch operations awaiting operands (spec §4.6).

use crate::decode::{DecodedInstruction, Op};
use crate::register_file::{RegisterFile, RobId};
use crate::rob::ReorderBuffer;

#[derive(Debug, Clone, Copy)]
pub struct RsEntry {
    pub busy: bool,
    pub op: Op,
    pub rob_id: RobId,
    pub pc: u32,
    pub imm: i32,
    pub vj: u32,
    pub qj: Option<RobId>,
    pub vk: u32,
    pub qk: Option<RobId>,
    pub executed: bool,
}

impl RsEntry {
    fn empty() -> Self {
        RsEntry {
            busy: false,
            op: Op::Invalid,
            rob_id: 0,
            pc: 0,
            imm: 0,
            vj: 0,
            qj: None,
            vk: 0,
            qk: None,
            executed: false,
        }
    }

    /// True once every operand has arrived and the entry has not
    /// already been dispatched this lifetime (spec §4.6).
    pub fn is_ready(&self) -> bool {
        self.busy && self.qj.is_none() && self.qk.is_none() && !self.executed
    }
}

/// Whether an op takes a second register operand (rs2) or an
/// immediate as its second operand — determines how `vk`/`qk` are
/// populated at issue.
fn uses_immediate_as_second_operand(op: Op) -> bool {
    matches!(
        op,
        Op::Addi
            | Op::Slti
            | Op::Sltiu
            | Op::Xori
            | Op::Ori
            | Op::Andi
            | Op::Slli
            | Op::Srli
            | Op::Srai
            | Op::Lui
    )
}

fn has_rs1(op: Op) -> bool {
    !matches!(op, Op::Lui | Op::Auipc | Op::Jal)
}

fn has_rs2(op: Op) -> bool {
    matches!(
        op,
        Op::Add
            | Op::Sub
            | Op::Sll
            | Op::Slt
            | Op::Sltu
            | Op::Xor
            | Op::Srl
            | Op::Sra
            | Op::Or
            | Op::And
            | Op::Beq
            | Op::Bne
            | Op::Blt
            | Op::Bge
            | Op::Bltu
            | Op::Bgeu
    )
}

pub struct ReservationStation {
    entries: Vec<RsEntry>,
}

impl ReservationStation {
    pub fn new(capacity: usize) -> Self {
        ReservationStation {
            entries: vec![RsEntry::empty(); capacity],
        }
    }

    pub fn has_free_entry(&self) -> bool {
        self.entries.iter().any(|e| !e.busy)
    }

    /// Rename operands from the register file and occupy a free slot.
    /// Returns `false` only if the station is full (caller should have
    /// checked [`Self::has_free_entry`] before allocating a ROB slot).
    ///
    /// `rob` lets a same-cycle consumer of a producer that already
    /// reached `WRITE_RESULT` this tick capture its value directly
    /// instead of recording a dependency that the producer's one and
    /// only broadcast has already passed by (see
    /// [`RegisterFile::resolve_operand`]).
    pub fn issue(
        &mut self,
        decoded: &DecodedInstruction,
        pc: u32,
        rob_id: RobId,
        regfile: &RegisterFile,
        rob: &ReorderBuffer,
    ) -> bool {
        let slot = match self.entries.iter_mut().find(|e| !e.busy) {
            Some(slot) => slot,
            None => return false,
        };

        let (vj, qj) = if has_rs1(decoded.op) {
            regfile.resolve_operand(rob, decoded.rs1)
        } else {
            (0, None)
        };

        let (vk, qk) = if uses_immediate_as_second_operand(decoded.op) {
            (decoded.imm as u32, None)
        } else if has_rs2(decoded.op) {
            regfile.resolve_operand(rob, decoded.rs2)
        } else {
            (0, None)
        };

        *slot = RsEntry {
            busy: true,
            op: decoded.op,
            rob_id,
            pc,
            imm: decoded.imm,
            vj,
            qj,
            vk,
            qk,
            executed: false,
        };
        true
    }

    /// Publish a completed result on the common data bus to every
    /// entry waiting on it.
    pub fn broadcast(&mut self, rob_id: RobId, value: u32) {
        for entry in &mut self.entries {
            if entry.busy {
                if entry.qj == Some(rob_id) {
                    entry.vj = value;
                    entry.qj = None;
                }
                if entry.qk == Some(rob_id) {
                    entry.vk = value;
                    entry.qk = None;
                }
            }
        }
    }

    /// First ready, not-yet-executed entry, in slot order (spec §4.6:
    /// "any deterministic ordering acceptable; scan order documented
    /// and stable").
    pub fn pick_ready(&self) -> Option<RsEntry> {
        self.entries.iter().find(|e| e.is_ready()).copied()
    }

    /// Mark the picked entry as dispatched to the ALU this cycle, so
    /// it is not picked again before it is removed.
    pub fn mark_executed(&mut self, rob_id: RobId) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.busy && e.rob_id == rob_id) {
            entry.executed = true;
        }
    }

    pub fn remove(&mut self, rob_id: RobId) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.busy && e.rob_id == rob_id) {
            *entry = RsEntry::empty();
        }
    }

    /// Discard every in-flight entry (misprediction squash).
    pub fn flush(&mut self) {
        for entry in &mut self.entries {
            *entry = RsEntry::empty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::rob::AllocRequest;

    #[test]
    fn issue_captures_ready_operands() {
        let mut rf = RegisterFile::new();
        rf.set(5, 7);
        rf.set(6, 35);
        let rob = ReorderBuffer::new(4);
        let mut rs = ReservationStation::new(4);
        let decoded = decode(0x0062_8533); // add x10, x5, x6
        assert!(rs.issue(&decoded, 0, 3, &rf, &rob));
        let entry = rs.pick_ready().unwrap();
        assert_eq!(entry.vj, 7);
        assert_eq!(entry.vk, 35);
        assert!(entry.is_ready());
    }

    #[test]
    fn issue_captures_dependency_when_source_is_pending() {
        let mut rf = RegisterFile::new();
        rf.set_reorder(5, 2);
        let rob = ReorderBuffer::new(4);
        let mut rs = ReservationStation::new(4);
        let decoded = decode(0x0062_8533); // add x10, x5, x6
        rs.issue(&decoded, 0, 3, &rf, &rob);
        assert!(rs.pick_ready().is_none());
        rs.broadcast(2, 99);
        let entry = rs.pick_ready().unwrap();
        assert_eq!(entry.vj, 99);
    }

    #[test]
    fn issue_captures_already_written_back_producer_without_waiting_for_broadcast() {
        // Mirrors a same-cycle producer->consumer pair: the producer's
        // ROB entry already reached WRITE_RESULT before this consumer
        // issues, so its value must be read directly rather than
        // recorded as a dependency that will never be broadcast again.
        let mut rf = RegisterFile::new();
        let mut rob = ReorderBuffer::new(4);
        let producer = rob.allocate(0, 0, 5, AllocRequest::default()).unwrap();
        rf.set_reorder(5, producer);
        rob.write_result(producer, 35);
        let mut rs = ReservationStation::new(4);
        let decoded = decode(0x0062_8533); // add x10, x5, x6
        rs.issue(&decoded, 4, 1, &rf, &rob);
        let entry = rs.pick_ready().unwrap();
        assert_eq!(entry.vj, 35);
        assert_eq!(entry.qj, None);
    }

    #[test]
    fn immediate_form_op_treats_imm_as_ready_operand() {
        let rf = RegisterFile::new();
        let rob = ReorderBuffer::new(4);
        let mut rs = ReservationStation::new(4);
        let decoded = decode(0x0050_0513); // addi x10, x0, 5
        rs.issue(&decoded, 0, 0, &rf, &rob);
        let entry = rs.pick_ready().unwrap();
        assert_eq!(entry.vk, 5);
        assert_eq!(entry.qk, None);
    }

    #[test]
    fn full_station_rejects_issue() {
        let rf = RegisterFile::new();
        let rob = ReorderBuffer::new(4);
        let mut rs = ReservationStation::new(1);
        let decoded = decode(0x0050_0513);
        assert!(rs.issue(&decoded, 0, 0, &rf, &rob));
        assert!(!rs.issue(&decoded, 4, 1, &rf, &rob));
    }

    #[test]
    fn remove_frees_the_slot() {
        let rf = RegisterFile::new();
        let rob = ReorderBuffer::new(4);
        let mut rs = ReservationStation::new(1);
        let decoded = decode(0x0050_0513);
        rs.issue(&decoded, 0, 0, &rf, &rob);
        rs.remove(0);
        assert!(rs.has_free_entry());
    }
}
