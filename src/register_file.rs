//! 32 architectural registers plus a rename map pointing into the ROB.
//!
//! spec §4.4's contract: writes to `x0` are silently ignored, and its
//! rename state is never set, so it always reads as zero regardless of
//! any renaming in flight.

use crate::rob::{ReorderBuffer, RobState};

pub type RobId = usize;

#[derive(Debug)]
pub struct RegisterFile {
    reg: [u32; 32],
    reorder: [Option<RobId>; 32],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            reg: [0; 32],
            reorder: [None; 32],
        }
    }

    pub fn read(&self, index: u8) -> u32 {
        if index == 0 {
            0
        } else {
            self.reg[index as usize]
        }
    }

    pub fn set(&mut self, index: u8, value: u32) {
        if index != 0 {
            self.reg[index as usize] = value;
        }
    }

    pub fn set_reorder(&mut self, index: u8, rob_id: RobId) {
        if index != 0 {
            self.reorder[index as usize] = Some(rob_id);
        }
    }

    pub fn clear_reorder(&mut self, index: u8) {
        if index != 0 {
            self.reorder[index as usize] = None;
        }
    }

    /// Clear the rename only if it still points at `rob_id` — a later
    /// instruction may already have renamed the same register again
    /// (spec §4.8: "clear its rename only if the rename still equals
    /// this ROB id").
    pub fn clear_reorder_if_matches(&mut self, index: u8, rob_id: RobId) {
        if index != 0 && self.reorder[index as usize] == Some(rob_id) {
            self.reorder[index as usize] = None;
        }
    }

    pub fn is_pending(&self, index: u8) -> bool {
        index != 0 && self.reorder[index as usize].is_some()
    }

    pub fn get_reorder(&self, index: u8) -> Option<RobId> {
        if index == 0 {
            None
        } else {
            self.reorder[index as usize]
        }
    }

    /// Resolve a source register at issue time: a real value if it is
    /// not renamed, a snapshot of the producer's value if the producer
    /// has already reached `WRITE_RESULT` this cycle (its one and only
    /// broadcast already went out during this tick's `write_back`
    /// stage, so a same-cycle consumer must read it here instead of
    /// recording a dependency it will never see satisfied), or a
    /// pending dependency on the producer's ROB id otherwise.
    pub fn resolve_operand(&self, rob: &ReorderBuffer, index: u8) -> (u32, Option<RobId>) {
        match self.get_reorder(index) {
            None => (self.read(index), None),
            Some(producer) => {
                let entry = rob.entry(producer);
                if entry.busy && entry.state == RobState::WriteResult {
                    (entry.value, None)
                } else {
                    (0, Some(producer))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_zero_is_always_zero() {
        let mut rf = RegisterFile::new();
        rf.set(0, 42);
        rf.set_reorder(0, 7);
        assert_eq!(rf.read(0), 0);
        assert!(!rf.is_pending(0));
        assert_eq!(rf.get_reorder(0), None);
    }

    #[test]
    fn set_and_read_round_trip() {
        let mut rf = RegisterFile::new();
        rf.set(5, 123);
        assert_eq!(rf.read(5), 123);
    }

    #[test]
    fn rename_tracks_pending_writers() {
        let mut rf = RegisterFile::new();
        rf.set_reorder(3, 9);
        assert!(rf.is_pending(3));
        assert_eq!(rf.get_reorder(3), Some(9));
        rf.clear_reorder(3);
        assert!(!rf.is_pending(3));
    }

    #[test]
    fn clear_reorder_if_matches_preserves_later_rename() {
        let mut rf = RegisterFile::new();
        rf.set_reorder(3, 9);
        rf.set_reorder(3, 20); // a later instruction renamed x3 again
        rf.clear_reorder_if_matches(3, 9); // stale clear from the first instruction's commit
        assert_eq!(rf.get_reorder(3), Some(20));
    }

    #[test]
    fn resolve_operand_reads_current_value_when_not_renamed() {
        let mut rf = RegisterFile::new();
        rf.set(5, 123);
        let rob = ReorderBuffer::new(4);
        assert_eq!(rf.resolve_operand(&rob, 5), (123, None));
    }

    #[test]
    fn resolve_operand_captures_already_written_back_producer() {
        use crate::rob::AllocRequest;
        let mut rf = RegisterFile::new();
        let mut rob = ReorderBuffer::new(4);
        let id = rob.allocate(0, 0, 5, AllocRequest::default()).unwrap();
        rf.set_reorder(5, id);
        rob.write_result(id, 99);
        // producer already reached WRITE_RESULT this cycle: a same-cycle
        // consumer must see the value directly, not a dependency that
        // will never be broadcast again.
        assert_eq!(rf.resolve_operand(&rob, 5), (99, None));
    }

    #[test]
    fn resolve_operand_reports_dependency_while_producer_still_pending() {
        use crate::rob::AllocRequest;
        let mut rf = RegisterFile::new();
        let mut rob = ReorderBuffer::new(4);
        let id = rob.allocate(0, 0, 5, AllocRequest::default()).unwrap();
        rf.set_reorder(5, id);
        assert_eq!(rf.resolve_operand(&rob, 5), (0, Some(id)));
    }
}
