//! The load-store buffer: a FIFO-ordered pool of pending memory
//! operations, separating address computation from memory effect
//! (spec §4.7).

use crate::decode::{DecodedInstruction, Op};
use crate::memory::Memory;
use crate::register_file::{RegisterFile, RobId};
use crate::rob::ReorderBuffer;

/// Cycles a memory operation spends in flight before its effect
/// occurs and its result is broadcast.
pub const EXECUTION_LATENCY: u32 = 3;

#[derive(Debug, Clone, Copy)]
pub struct LsbEntry {
    pub busy: bool,
    pub op: Op,
    pub rob_id: RobId,
    pub is_store: bool,
    pub vj: u32,
    pub qj: Option<RobId>,
    pub offset: i32,
    pub value: u32,
    pub q_val: Option<RobId>,
    pub execution_cycle: u32,
    pub executed: bool,
}

impl LsbEntry {
    fn empty() -> Self {
        LsbEntry {
            busy: false,
            op: Op::Invalid,
            rob_id: 0,
            is_store: false,
            vj: 0,
            qj: None,
            offset: 0,
            value: 0,
            q_val: None,
            execution_cycle: 0,
            executed: false,
        }
    }

    fn address_ready(&self) -> bool {
        self.qj.is_none()
    }

    fn store_value_ready(&self) -> bool {
        !self.is_store || self.q_val.is_none()
    }

    pub fn effective_address(&self) -> u32 {
        self.vj.wrapping_add(self.offset as u32)
    }
}

/// Allocation order is program order; a FIFO slot layout keeps that
/// order explicit for the store-at-commit / load-after-stores checks
/// in [`ReorderBuffer`](crate::rob::ReorderBuffer)-driven commit.
pub struct LoadStoreBuffer {
    entries: Vec<LsbEntry>,
    order: Vec<RobId>,
}

impl LoadStoreBuffer {
    pub fn new(capacity: usize) -> Self {
        LoadStoreBuffer {
            entries: vec![LsbEntry::empty(); capacity],
            order: Vec::with_capacity(capacity),
        }
    }

    pub fn has_free_entry(&self) -> bool {
        self.entries.iter().any(|e| !e.busy)
    }

    /// `rob` lets a same-cycle consumer of a producer that already
    /// reached `WRITE_RESULT` this tick capture its value directly
    /// instead of recording a dependency the producer's one and only
    /// broadcast has already passed by (see
    /// [`RegisterFile::resolve_operand`]).
    pub fn issue(
        &mut self,
        decoded: &DecodedInstruction,
        rob_id: RobId,
        regfile: &RegisterFile,
        rob: &ReorderBuffer,
    ) -> bool {
        let slot_index = match self.entries.iter().position(|e| !e.busy) {
            Some(i) => i,
            None => return false,
        };

        let (vj, qj) = regfile.resolve_operand(rob, decoded.rs1);

        let (value, q_val) = if decoded.is_store {
            regfile.resolve_operand(rob, decoded.rs2)
        } else {
            (0, None)
        };

        self.entries[slot_index] = LsbEntry {
            busy: true,
            op: decoded.op,
            rob_id,
            is_store: decoded.is_store,
            vj,
            qj,
            offset: decoded.imm,
            value,
            q_val,
            execution_cycle: 0,
            executed: false,
        };
        self.order.push(rob_id);
        true
    }

    pub fn broadcast(&mut self, rob_id: RobId, broadcast_value: u32) {
        for entry in &mut self.entries {
            if entry.busy {
                if entry.qj == Some(rob_id) {
                    entry.vj = broadcast_value;
                    entry.qj = None;
                }
                if entry.q_val == Some(rob_id) {
                    entry.value = broadcast_value;
                    entry.q_val = None;
                }
            }
        }
    }

    fn position_in_order(&self, rob_id: RobId) -> usize {
        self.order
            .iter()
            .position(|&id| id == rob_id)
            .expect("rob_id must be present in LSB order")
    }

    /// Oldest address/value-ready entry not yet dispatched to the
    /// memory pipeline, subject to the conservative ordering policy:
    /// a load may not begin before every older store in the buffer has
    /// retired (spec §4.7: "waits until all prior stores in the LSB
    /// have retired from the LSB").
    pub fn pick_ready(&self) -> Option<LsbEntry> {
        for &rob_id in &self.order {
            let index = self
                .entries
                .iter()
                .position(|e| e.busy && e.rob_id == rob_id)
                .unwrap();
            let entry = &self.entries[index];
            if entry.executed {
                continue;
            }
            if !entry.address_ready() || !entry.store_value_ready() {
                return None; // in-order: a stalled older entry blocks younger ones
            }
            if !entry.is_store {
                let has_older_store = self.order[..self.order_index_of(rob_id)]
                    .iter()
                    .any(|&older| self.entry_for(older).is_store);
                if has_older_store {
                    return None;
                }
            }
            return Some(*entry);
        }
        None
    }

    fn order_index_of(&self, rob_id: RobId) -> usize {
        self.position_in_order(rob_id)
    }

    fn entry_for(&self, rob_id: RobId) -> &LsbEntry {
        self.entries
            .iter()
            .find(|e| e.busy && e.rob_id == rob_id)
            .expect("rob_id must be present among busy LSB entries")
    }

    /// Advance the picked entry's latency counter by one cycle. Loads
    /// complete (read memory, return the sign/zero-extended value) once
    /// [`EXECUTION_LATENCY`] cycles have elapsed; stores only compute
    /// their address here; the actual write happens at
    /// [`Self::commit_store`] once the ROB entry reaches the head.
    pub fn advance_cycle(&mut self, rob_id: RobId, memory: &Memory) -> Option<u32> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.busy && e.rob_id == rob_id)
            .expect("advance_cycle on missing LSB entry");
        entry.execution_cycle += 1;
        if entry.execution_cycle < EXECUTION_LATENCY {
            return None;
        }
        entry.executed = true;
        if entry.is_store {
            return Some(0); // stores produce no register result
        }
        let addr = entry.effective_address();
        let loaded = match entry.op {
            Op::Lb => (memory.read_byte(addr) as i8) as i32 as u32,
            Op::Lbu => memory.read_byte(addr) as u32,
            Op::Lh => (memory.read_halfword(addr) as i16) as i32 as u32,
            Op::Lhu => memory.read_halfword(addr) as u32,
            Op::Lw => memory.read_word(addr),
            other => panic!("advance_cycle on non-load/store op {other:?}"),
        };
        Some(loaded)
    }

    /// Perform the deferred memory write for a store whose ROB entry
    /// has reached the head and is committing (spec §4.7: "stores only
    /// perform the memory write ... at commit").
    pub fn commit_store(&self, rob_id: RobId, memory: &mut Memory) {
        let entry = self.entry_for(rob_id);
        let addr = entry.effective_address();
        match entry.op {
            Op::Sb => memory.write_byte(addr, entry.value as u8),
            Op::Sh => memory.write_halfword(addr, entry.value as u16),
            Op::Sw => memory.write_word(addr, entry.value),
            other => panic!("commit_store on non-store op {other:?}"),
        }
    }

    pub fn remove(&mut self, rob_id: RobId) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.busy && e.rob_id == rob_id) {
            *entry = LsbEntry::empty();
        }
        self.order.retain(|&id| id != rob_id);
    }

    pub fn flush(&mut self) {
        for entry in &mut self.entries {
            *entry = LsbEntry::empty();
        }
        self.order.clear();
    }
}
