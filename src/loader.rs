//! Parses the Verilog-style `@address` / hex-byte memory image format
//! from a byte stream (spec §6), independently of [`crate::memory::Memory`]
//! so the format can be tested without constructing an engine.

use std::io::BufRead;

use crate::error::LoaderError;

/// A flat list of `(address, byte)` pairs in file order, ready to be
/// applied to a fresh [`crate::memory::Memory`].
pub type MemoryImage = Vec<(u32, u8)>;

pub fn load(reader: impl BufRead) -> Result<MemoryImage, LoaderError> {
    let mut image = Vec::new();
    let mut cursor: Option<u32> = None;

    for (zero_based, line) in reader.lines().enumerate() {
        let line_no = zero_based + 1;
        let line = line.map_err(|_| LoaderError::MalformedLine {
            line_no,
            text: String::new(),
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(hex_addr) = trimmed.strip_prefix('@') {
            let addr = u32::from_str_radix(hex_addr, 16).map_err(|_| LoaderError::InvalidHex {
                line_no,
                text: trimmed.to_string(),
            })?;
            cursor = Some(addr);
            continue;
        }

        let mut addr = cursor.ok_or(LoaderError::NoCursorSet { line_no })?;
        for token in trimmed.split_whitespace() {
            if token.len() != 2 {
                return Err(LoaderError::OddByteSequence {
                    line_no,
                    text: trimmed.to_string(),
                });
            }
            let byte = u8::from_str_radix(token, 16).map_err(|_| LoaderError::InvalidHex {
                line_no,
                text: trimmed.to_string(),
            })?;
            image.push((addr, byte));
            addr = addr.wrapping_add(1);
        }
        cursor = Some(addr);
    }

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> Result<MemoryImage, LoaderError> {
        load(Cursor::new(text.as_bytes()))
    }

    #[test]
    fn loads_a_simple_image() {
        let image = parse("@00000000\n13 05 50 00\n").unwrap();
        assert_eq!(image, vec![(0, 0x13), (1, 0x05), (2, 0x50), (3, 0x00)]);
    }

    #[test]
    fn cursor_advances_across_multiple_data_lines() {
        let image = parse("@00000010\nAB\nCD\n").unwrap();
        assert_eq!(image, vec![(0x10, 0xab), (0x11, 0xcd)]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let image = parse("@0\n\n13\n\n05\n").unwrap();
        assert_eq!(image, vec![(0, 0x13), (1, 0x05)]);
    }

    #[test]
    fn data_before_any_cursor_is_an_error() {
        let err = parse("13 05\n").unwrap_err();
        assert!(matches!(err, LoaderError::NoCursorSet { line_no: 1 }));
    }

    #[test]
    fn odd_length_token_is_rejected() {
        let err = parse("@0\n1\n").unwrap_err();
        assert!(matches!(err, LoaderError::OddByteSequence { .. }));
    }

    #[test]
    fn non_hex_token_is_rejected() {
        let err = parse("@0\nzz\n").unwrap_err();
        assert!(matches!(err, LoaderError::InvalidHex { .. }));
    }
}
