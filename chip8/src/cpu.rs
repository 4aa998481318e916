//! CPU and memory state.
use crate::{bytecode::word, constants::*, font::FONTSET};

/// Core state for a chip8 interpreter.
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the current position in the bytecode.
    ///
    /// Only the lowest 12 bits are used when fetching.
    pub(crate) pc: Address,
    /// Stack pointer, indicating the next free slot of the stack.
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// Pointer register used for temporarily storing an address. Since addresses are 12 bits, only the
    /// lowest (rightmost) bits are used when accessing memory.
    pub(crate) address: Address,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: u8,
    /// (ST) Sound timer that counts down to 0. While it is non-zero, a beep is played.
    pub(crate) sound_timer: u8,
    /// Keyboard input state. Pressed is a 1 bit, released is a 0 bit.
    pub(crate) key_state: u16,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Box<[u8; MEM_SIZE]>,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: [Address; STACK_SIZE],
    /// Screen buffer that is drawn to.
    pub(crate) display: Box<[bool; DISPLAY_BUFFER_SIZE]>,
    /// Display buffer changed since the host last rendered it.
    pub(crate) redraw: bool,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        Self {
            pc: MEM_START as Address,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            address: 0,
            delay_timer: 0,
            sound_timer: 0,
            key_state: 0,

            ram: Box::new([0; MEM_SIZE]),
            stack: [0; STACK_SIZE],
            display: Box::new([false; DISPLAY_BUFFER_SIZE]),
            redraw: false,
        }
    }
}

impl Chip8Cpu {
    pub fn new() -> Self {
        let mut cpu = Self::default();
        cpu.load_font();
        cpu
    }

    /// Return every register, pointer, buffer and timer to its power-on state.
    pub(crate) fn reset(&mut self) {
        self.pc = MEM_START as Address;
        self.sp = 0;
        self.registers.fill(0);
        self.address = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.key_state = 0;

        self.ram.fill(0);
        self.stack.fill(0);
        self.display.fill(false);
        self.redraw = false;

        self.load_font();
    }

    fn load_font(&mut self) {
        let start = FONTSET_START as usize;
        self.ram[start..start + FONTSET_DATA_LENGTH].copy_from_slice(&FONTSET);
    }

    #[inline(always)]
    pub fn read(&self, addr: usize) -> u8 {
        self.ram[addr & MEM_MASK]
    }

    #[inline(always)]
    pub fn write(&mut self, addr: usize, value: u8) {
        self.ram[addr & MEM_MASK] = value;
    }

    pub fn clear_display(&mut self) {
        self.display.fill(false);
        self.redraw = true;
    }

    /// Push a return address onto the call stack.
    ///
    /// Returns `false`, leaving the stack untouched, when it is full.
    #[must_use]
    pub(crate) fn push(&mut self, addr: Address) -> bool {
        match self.stack.get_mut(self.sp) {
            Some(slot) => {
                *slot = addr;
                self.sp += 1;
                true
            }
            None => false,
        }
    }

    /// Pop the top return address off the call stack.
    pub(crate) fn pop(&mut self) -> Option<Address> {
        let sp = self.sp.checked_sub(1)?;
        self.sp = sp;
        Some(self.stack[sp])
    }

    pub fn set_key_state(&mut self, key_id: u8, state: bool) {
        if key_id < KEY_COUNT {
            if state {
                self.key_state |= 1 << key_id;
            } else {
                self.key_state &= !(1 << key_id);
            }
        }
    }

    pub fn key_state(&self, key_id: u8) -> bool {
        if key_id < KEY_COUNT {
            self.key_state & (1 << key_id) > 0
        } else {
            false
        }
    }

    /// Check whether any key is pressed down.
    #[inline(always)]
    pub fn any_key(&self) -> bool {
        self.key_state > 0
    }

    /// Retrieve the value of the lowest key that is pressed down.
    #[inline]
    pub fn first_key(&self) -> Option<u8> {
        if self.any_key() {
            Some(self.key_state.trailing_zeros() as u8)
        } else {
            None
        }
    }

    /// Clear the keyboard input state, setting all keys to up.
    #[inline(always)]
    pub fn clear_keys(&mut self) {
        self.key_state = 0;
    }

    /// Count down the delay timer.
    #[inline]
    pub fn tick_delay(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
    }

    /// Count down the sound timer.
    ///
    /// Returns whether the buzzer should sound for this tick, which is
    /// the case when the timer is still running after the decrement.
    #[inline]
    pub fn tick_sound(&mut self) -> bool {
        if self.sound_timer > 0 {
            self.sound_timer -= 1;
            self.sound_timer > 0
        } else {
            false
        }
    }

    /// Fetch the instruction word at the current program counter.
    #[inline(always)]
    pub fn instr(&self) -> u16 {
        let pc = self.pc as usize;
        word(self.read(pc), self.read(pc + 1))
    }
}
