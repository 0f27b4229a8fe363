//! Error taxonomy for the simulator.
//!
//! Follows the three-way split of spec §7: malformed input and
//! undecodable instructions are [`SimError`] variants that abort the
//! run with a diagnostic; buffer-full at issue is not an error (it
//! stalls); internal ROB misuse is a programmer bug and stays a
//! `panic!`/`assert!` rather than a typed error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("line {line_no}: expected '@<hex address>' or a sequence of hex byte pairs, got {text:?}")]
    MalformedLine { line_no: usize, text: String },

    #[error("line {line_no}: odd number of hex digits in byte sequence {text:?}")]
    OddByteSequence { line_no: usize, text: String },

    #[error("line {line_no}: invalid hex digits in {text:?}")]
    InvalidHex { line_no: usize, text: String },

    #[error("byte data on line {line_no} appeared before any '@<address>' line")]
    NoCursorSet { line_no: usize },
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error("undecodable instruction 0x{word:08x} at pc=0x{pc:08x}")]
    UndecodableInstruction { pc: u32, word: u32 },
}
