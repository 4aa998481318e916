//! Helpers for extracting operands from instruction words.
//!
//! Instructions are 16-bit words stored big-endian. The fields are laid out as:
//!
//! ```text
//! 0xF000  opcode family
//! 0x0F00  X register
//! 0x00F0  Y register
//! 0x000F  N nibble
//! 0x00FF  NN byte
//! 0x0FFF  NNN address
//! ```

/// Combine two bytes into an instruction word.
#[inline(always)]
pub fn word(a: u8, b: u8) -> u16 {
    ((a as u16) << 8) | b as u16
}

/// Extract the opcode family from the highest nibble.
#[inline(always)]
pub fn op_code(word: u16) -> u8 {
    ((word & 0xF000) >> 12) as u8
}

/// Extract operand X.
#[inline(always)]
pub fn op_x(word: u16) -> u8 {
    ((word & 0x0F00) >> 8) as u8
}

/// Extract operand Y.
#[inline(always)]
pub fn op_y(word: u16) -> u8 {
    ((word & 0x00F0) >> 4) as u8
}

/// Extract operand N.
#[inline(always)]
pub fn op_n(word: u16) -> u8 {
    (word & 0x000F) as u8
}

/// Extract operand NN.
#[inline(always)]
pub fn op_nn(word: u16) -> u8 {
    (word & 0x00FF) as u8
}

/// Extract operand NNN.
#[inline(always)]
pub fn op_nnn(word: u16) -> u16 {
    word & 0x0FFF
}
