//! Cycle-approximate Tomasulo-style out-of-order simulator for the
//! RV32I base integer ISA.
//!
//! [`Simulator`] is the public entry point: it owns a memory image,
//! drives the [`pipeline::Engine`] to completion, and exposes the
//! halt result. Everything else here is implementation detail exposed
//! `pub` for integration testing.

pub mod alu;
pub mod decode;
pub mod error;
pub mod fields;
pub mod load_store_buffer;
pub mod loader;
pub mod memory;
pub mod opcodes;
pub mod pipeline;
pub mod register_file;
pub mod reservation_station;
pub mod rob;

use std::io::BufRead;

use error::SimError;
use memory::Memory;
use pipeline::Engine;

/// Builds an [`Engine`] from a memory image and runs it to the halt
/// sentinel, returning the byte it prints.
pub struct Simulator {
    engine: Engine,
}

impl Simulator {
    /// Load a Verilog-style memory image and set PC to 0 (spec §6:
    /// "After loading, PC is set to 0. Execution begins immediately").
    pub fn from_image(reader: impl BufRead) -> Result<Self, SimError> {
        let image = loader::load(reader)?;
        let mut memory = Memory::new();
        for (addr, byte) in image {
            memory.write_byte(addr, byte);
        }
        memory.set_pc(0);
        Ok(Simulator {
            engine: Engine::new(memory),
        })
    }

    pub fn run(&mut self) -> Result<u8, SimError> {
        self.engine.run()
    }

    pub fn register(&self, index: u8) -> u32 {
        self.engine.register(index)
    }
}
