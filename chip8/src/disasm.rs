//! Disassembler.
use std::fmt::{self, Display, Write as FmtWrite};

use crate::{bytecode::*, constants::MEM_START};

/// Display adapter rendering an instruction word as assembly.
///
/// Words that don't decode to a supported instruction are rendered as `DATA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mnemonic(pub u16);

impl Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = self.0;
        let (x, y, n, nn, nnn) = (op_x(w), op_y(w), op_n(w), op_nn(w), op_nnn(w));

        match op_code(w) {
            0x0 => match w {
                0x00E0 => write!(f, "CLS"),
                0x00EE => write!(f, "RET"),
                _ => write!(f, "DATA 0x{w:04X}"),
            },
            0x1 => write!(f, "JP 0x{nnn:03X}"),
            0x2 => write!(f, "CALL 0x{nnn:03X}"),
            0x3 => write!(f, "SE V{x:X}, 0x{nn:02X}"),
            0x4 => write!(f, "SNE V{x:X}, 0x{nn:02X}"),
            0x5 if n == 0 => write!(f, "SE V{x:X}, V{y:X}"),
            0x6 => write!(f, "LD V{x:X}, 0x{nn:02X}"),
            0x7 => write!(f, "ADD V{x:X}, 0x{nn:02X}"),
            0x8 => match n {
                0x0 => write!(f, "LD V{x:X}, V{y:X}"),
                0x1 => write!(f, "OR V{x:X}, V{y:X}"),
                0x2 => write!(f, "AND V{x:X}, V{y:X}"),
                0x3 => write!(f, "XOR V{x:X}, V{y:X}"),
                0x4 => write!(f, "ADD V{x:X}, V{y:X}"),
                0x5 => write!(f, "SUB V{x:X}, V{y:X}"),
                0x6 => write!(f, "SHR V{x:X}"),
                0x7 => write!(f, "SUBN V{x:X}, V{y:X}"),
                0xE => write!(f, "SHL V{x:X}"),
                _ => write!(f, "DATA 0x{w:04X}"),
            },
            0x9 if n == 0 => write!(f, "SNE V{x:X}, V{y:X}"),
            0xA => write!(f, "LD I, 0x{nnn:03X}"),
            0xB => write!(f, "JP V0, 0x{nnn:03X}"),
            0xC => write!(f, "RND V{x:X}, 0x{nn:02X}"),
            0xD => write!(f, "DRW V{x:X}, V{y:X}, {n}"),
            0xE => match nn {
                0x9E => write!(f, "SKP V{x:X}"),
                0xA1 => write!(f, "SKNP V{x:X}"),
                _ => write!(f, "DATA 0x{w:04X}"),
            },
            0xF => match nn {
                0x07 => write!(f, "LD V{x:X}, DT"),
                0x0A => write!(f, "LD V{x:X}, K"),
                0x15 => write!(f, "LD DT, V{x:X}"),
                0x18 => write!(f, "LD ST, V{x:X}"),
                0x1E => write!(f, "ADD I, V{x:X}"),
                0x29 => write!(f, "LD F, V{x:X}"),
                0x33 => write!(f, "LD B, V{x:X}"),
                0x55 => write!(f, "LD [I], V{x:X}"),
                0x65 => write!(f, "LD V{x:X}, [I]"),
                _ => write!(f, "DATA 0x{w:04X}"),
            },
            _ => write!(f, "DATA 0x{w:04X}"),
        }
    }
}

/// Walks a program as a flat sequence of two byte words.
///
/// Sprite data embedded in a program is indistinguishable from code
/// at this level, and will show up as whatever instruction it happens
/// to decode to.
pub struct Disassembler<'a> {
    bytecode: &'a [u8],
}

impl<'a> Disassembler<'a> {
    pub fn new(bytecode: &'a [u8]) -> Self {
        Self { bytecode }
    }

    /// Write the whole program, one instruction per line.
    pub fn disassemble<W: FmtWrite>(&self, w: &mut W) -> fmt::Result {
        for (i, chunk) in self.bytecode.chunks(2).enumerate() {
            let address = MEM_START + i * 2;
            match *chunk {
                [a, b] => {
                    let instr = word(a, b);
                    writeln!(w, "{address:04X}: {instr:04X}  {}", Mnemonic(instr))?;
                }
                // Trailing odd byte.
                [a] => writeln!(w, "{address:04X}: {a:02X}")?,
                _ => unreachable!("chunks are never empty"),
            }
        }

        Ok(())
    }

    pub fn print_bytecode(&self) -> fmt::Result {
        let mut s = String::new();
        self.disassemble(&mut s)?;
        print!("{s}");
        Ok(())
    }
}
