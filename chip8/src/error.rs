//! Result and errors.
use std::fmt::{self, Display, Formatter};

use crate::constants::Address;

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chip8Error {
    /// Fetched instruction word does not decode to a supported instruction.
    UnsupportedOpcode { opcode: u16, address: Address },
    /// Attempt to load a bytecode program that can't fit in memory.
    CapacityExceeded { size: usize, capacity: usize },
    /// Subroutine call with every stack slot in use.
    StackOverflow { pc: Address },
    /// Subroutine return with an empty stack.
    StackUnderflow { pc: Address },
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedOpcode { opcode, address } => {
                write!(f, "unsupported opcode {opcode:04X} at address {address:04X}")
            }
            Self::CapacityExceeded { size, capacity } => write!(
                f,
                "program of {size} bytes is too large for VM memory, capacity is {capacity} bytes"
            ),
            Self::StackOverflow { pc } => write!(f, "call stack overflow at address {pc:04X}"),
            Self::StackUnderflow { pc } => write!(f, "call stack underflow at address {pc:04X}"),
        }
    }
}

impl std::error::Error for Chip8Error {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Chip8Error::UnsupportedOpcode {
            opcode: 0x5001,
            address: 0x200,
        };
        assert_eq!(err.to_string(), "unsupported opcode 5001 at address 0200");

        let err = Chip8Error::StackUnderflow { pc: 0x2A4 };
        assert_eq!(err.to_string(), "call stack underflow at address 02A4");
    }
}
