//! Chip-8 interpreter core.
//!
//! The [`Chip8Vm`](vm::Chip8Vm) owns all machine state and exposes a single
//! stepping function. Windowing, audio playback and program loading are left
//! to the host, which drives the step loop at its own cadence.
mod bytecode;
mod clock;
pub mod constants;
mod cpu;
mod devices;
mod disasm;
mod error;
mod font;
mod vm;

use self::constants::DISPLAY_BUFFER_SIZE;

pub use self::{
    clock::{Clock, Hz},
    devices::{Buzzer, InvalidKeyCode, KeyCode, Silent},
    disasm::{Disassembler, Mnemonic},
    error::{Chip8Error, Chip8Result},
    font::FONTSET,
    vm::{Chip8Conf, Chip8Vm, Flow},
};

/// Read view of the 64x32 display, row-major, one boolean per pixel.
pub type Chip8DisplayBuffer<'a> = &'a [bool; DISPLAY_BUFFER_SIZE];

pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use super::{
        clock::{Clock, Hz},
        devices::{Buzzer, KeyCode, Silent},
        disasm::{Disassembler, Mnemonic},
        error::{Chip8Error, Chip8Result},
        vm::{Chip8Conf, Chip8Vm, Flow},
        Chip8DisplayBuffer,
    };
}
