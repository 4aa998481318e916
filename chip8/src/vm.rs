//! Virtual machine.
use std::fmt::{self, Write};

use log::{debug, trace, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    bytecode::*,
    constants::*,
    cpu::Chip8Cpu,
    devices::{Buzzer, KeyCode, Silent},
    disasm::Mnemonic,
    error::{Chip8Error, Chip8Result},
    Chip8DisplayBuffer,
};

pub struct Chip8Vm {
    cpu: Chip8Cpu,
    rng: StdRng,
    buzzer: Box<dyn Buzzer>,
    /// Latched fatal error. The machine refuses to step until it is reset.
    fault: Option<Chip8Error>,
    conf: Chip8Conf,
}

/// VM Configuration Parameters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct Chip8Conf {
    /// Seed for the random number generator used by `RND`.
    ///
    /// When absent the generator is seeded from system entropy.
    pub rng_seed: Option<u64>,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        Chip8Vm {
            cpu: Chip8Cpu::new(),
            rng: create_rng(&conf),
            buzzer: Box::new(Silent),
            fault: None,
            conf,
        }
    }

    /// Install the audio device that receives beeps from the sound timer.
    pub fn set_buzzer(&mut self, buzzer: impl Buzzer + 'static) {
        self.buzzer = Box::new(buzzer);
    }

    /// Clear all state in preparation for a fresh startup.
    ///
    /// Memory, registers, stack, timers, keys and display are zeroed,
    /// the font is written back and the program counter is pointed at
    /// the program entry. A latched fault is cleared.
    pub fn reset(&mut self) {
        debug!("reset");

        self.cpu.reset();
        self.fault = None;

        if self.conf.rng_seed.is_some() {
            self.rng = create_rng(&self.conf);
        }
    }

    /// Copy a program into memory at the program entry point.
    ///
    /// Memory is left untouched when the program doesn't fit.
    pub fn load_bytecode(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        if bytecode.len() > MAX_PROGRAM_SIZE {
            return Err(Chip8Error::CapacityExceeded {
                size: bytecode.len(),
                capacity: MAX_PROGRAM_SIZE,
            });
        }

        self.cpu.ram[MEM_START..MEM_START + bytecode.len()].copy_from_slice(bytecode);
        debug!("loaded {} byte program", bytecode.len());

        Ok(())
    }

    pub fn display_buffer(&self) -> Chip8DisplayBuffer<'_> {
        &self.cpu.display
    }

    /// Whether the pixel at the given coordinate is lit.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.cpu.display[(x & DISPLAY_WIDTH_MASK) + (y & DISPLAY_HEIGHT_MASK) * DISPLAY_WIDTH]
    }

    /// Returns whether the display changed since the last call, and clears the flag.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.cpu.redraw)
    }

    /// Error that halted the machine, if any.
    pub fn fault(&self) -> Option<&Chip8Error> {
        self.fault.as_ref()
    }
}

/// Register and memory inspection.
impl Chip8Vm {
    pub fn pc(&self) -> Address {
        self.cpu.pc
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.cpu.registers
    }

    pub fn address(&self) -> Address {
        self.cpu.address
    }

    pub fn delay_timer(&self) -> u8 {
        self.cpu.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.cpu.sound_timer
    }

    /// Number of return addresses on the call stack.
    pub fn stack_depth(&self) -> usize {
        self.cpu.sp
    }

    pub fn ram(&self) -> &[u8; MEM_SIZE] {
        &self.cpu.ram
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Flow {
    Ok,
    /// Program counter has jumped to a new address.
    ///
    /// This is useful for the caller to avoid being
    /// blocked on infinite or long running loops.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// Display buffer was modified.
    Draw,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed, and loads the key value into `Vx`.
    /// The program counter and timers are left as they were.
    KeyWait,
}

/// Interpreter
impl Chip8Vm {
    /// Sets the pressed state of a single key.
    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        self.cpu.set_key_state(key.as_u8(), pressed);
    }

    /// Replace the whole keyboard state, indexed by key code.
    pub fn set_keys(&mut self, keys: &[bool; KEY_COUNT as usize]) {
        for (key_id, pressed) in keys.iter().enumerate() {
            self.cpu.set_key_state(key_id as u8, *pressed);
        }
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn clear_keys(&mut self) {
        self.cpu.clear_keys()
    }

    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.cpu.key_state(key.as_u8())
    }

    /// Execute the given number of instructions.
    ///
    /// Returns the control flow of the last step.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        let mut flow = Flow::Ok;

        for _ in 0..step_count {
            flow = self.step()?;
        }

        Ok(flow)
    }

    /// Execute a single instruction, then count down the timers.
    ///
    /// Errors are fatal. Once one is returned every following step
    /// returns it again until the machine is reset.
    pub fn step(&mut self) -> Chip8Result<Flow> {
        if let Some(err) = &self.fault {
            return Err(err.clone());
        }

        match self.exec() {
            Ok(Flow::KeyWait) => Ok(Flow::KeyWait),
            Ok(flow) => {
                self.tick_timers();
                Ok(flow)
            }
            Err(err) => {
                warn!("halted: {err}");
                self.fault = Some(err.clone());
                Err(err)
            }
        }
    }

    fn tick_timers(&mut self) {
        self.cpu.tick_delay();

        if self.cpu.tick_sound() {
            self.buzzer.beep();
        }
    }

    /// Advance past the current instruction.
    #[inline(always)]
    fn next(&mut self) {
        self.cpu.pc = (self.cpu.pc + 2) & MEM_MASK as Address;
    }

    /// Advance past the current instruction, and also the one
    /// after it when the condition holds.
    #[inline(always)]
    fn skip_if(&mut self, cond: bool) {
        let step = if cond { 4 } else { 2 };
        self.cpu.pc = (self.cpu.pc + step) & MEM_MASK as Address;
    }

    #[inline(always)]
    fn unsupported(&self, instr: u16) -> Chip8Error {
        Chip8Error::UnsupportedOpcode {
            opcode: instr,
            address: self.cpu.pc,
        }
    }

    fn exec(&mut self) -> Chip8Result<Flow> {
        // Each instruction is two bytes, with the opcode identity in the first 4-bit nibble.
        let instr = self.cpu.instr();
        trace!("{:04X}: {:04X}  {}", self.cpu.pc, instr, Mnemonic(instr));

        let vx = op_x(instr) as usize;
        let vy = op_y(instr) as usize;
        let n = op_n(instr);
        let nn = op_nn(instr);
        let nnn = op_nnn(instr);

        let mut control_flow = Flow::Ok;

        match op_code(instr) {
            // System instructions identified by the whole word
            0x0 => control_flow = self.exec_sys(instr)?,
            // 1NNN (JP addr)
            //
            // Jump to address.
            0x1 => {
                self.cpu.pc = nnn;
                control_flow = Flow::Jump;
            }
            // 2NNN (CALL addr)
            //
            // Call subroutine at NNN.
            // The address of the call itself is stored, and skipped over on return.
            0x2 => {
                if !self.cpu.push(self.cpu.pc) {
                    return Err(Chip8Error::StackOverflow { pc: self.cpu.pc });
                }
                self.cpu.pc = nnn;
                control_flow = Flow::Jump;
            }
            // 3XNN (SE Vx, byte)
            //
            // Skip the next instruction if register VX equals value NN.
            0x3 => self.skip_if(self.cpu.registers[vx] == nn),
            // 4XNN (SNE Vx, byte)
            //
            // Skip the next instruction if register VX does not equal value NN.
            0x4 => self.skip_if(self.cpu.registers[vx] != nn),
            // 5XY0 (SE Vx, Vy)
            //
            // Skip the next instruction if register VX equals value VY.
            0x5 if n == 0 => {
                let x = self.cpu.registers[vx];
                let y = self.cpu.registers[vy];
                self.skip_if(x == y);
            }
            // 6XNN (LD Vx, byte)
            //
            // Set register VX to value NN.
            0x6 => {
                self.cpu.registers[vx] = nn;
                self.next();
            }
            // 7XNN (ADD Vx, byte)
            //
            // Add value NN to register VX. Carry flag is not set.
            0x7 => {
                self.cpu.registers[vx] = self.cpu.registers[vx].wrapping_add(nn);
                self.next();
            }
            // Arithmetic instructions identified by n
            0x8 => self.exec_math(instr, vx, vy, n)?,
            // 9XY0 (SNE Vx, Vy)
            //
            // Skip next instruction if Vx != Vy.
            0x9 if n == 0 => {
                let x = self.cpu.registers[vx];
                let y = self.cpu.registers[vy];
                self.skip_if(x != y);
            }
            // ANNN (LD I, addr)
            //
            // Set address register I to value NNN.
            0xA => {
                self.cpu.address = nnn;
                self.next();
            }
            // BNNN (JP V0, addr)
            //
            // Jump to address NNN offset by register V0.
            0xB => {
                let offset = self.cpu.registers[0] as Address;
                self.cpu.pc = nnn.wrapping_add(offset) & MEM_MASK as Address;
                control_flow = Flow::Jump;
            }
            // CXNN (RND Vx, byte)
            //
            // Generate random number.
            // Set register VX to the result of bitwise AND between a random number and NN.
            0xC => {
                self.cpu.registers[vx] = nn & self.rng.gen::<u8>();
                self.next();
            }
            // DXYN (DRW Vx, Vy, nibble)
            //
            // Draw sprite to the display buffer, at coordinate as per registers VX and VY.
            // Sprite is encoded as 8 pixels wide, N pixels high, stored in bits located in
            // memory pointed to by address register I.
            //
            // If the sprite is drawn outside of the display area, it is wrapped around to the other side.
            //
            // If the drawing operation erases existing pixels in the display buffer, register VF is set to
            // 1, and set to 0 if no display bits are unset. This is used for collision detection.
            0xD => {
                self.draw_sprite(vx, vy, n);
                self.next();
                control_flow = Flow::Draw;
            }
            // Keyboard instructions identified by nn
            0xE => self.exec_key(instr, vx, nn)?,
            // Miscellaneous instructions identified by nn
            0xF => control_flow = self.exec_misc(instr, vx, nn)?,
            // Unsupported operation.
            _ => return Err(self.unsupported(instr)),
        }

        Ok(control_flow)
    }

    /// Execute a system instruction
    #[inline]
    fn exec_sys(&mut self, instr: u16) -> Chip8Result<Flow> {
        match instr {
            // 00E0 (CLS)
            //
            // Clear display
            0x00E0 => {
                self.cpu.clear_display();
                self.next();
                Ok(Flow::Draw)
            }
            // 00EE (RET)
            //
            // Return from a subroutine.
            // Pop the address of the call off the stack, and continue after it.
            0x00EE => match self.cpu.pop() {
                Some(addr) => {
                    self.cpu.pc = (addr + 2) & MEM_MASK as Address;
                    Ok(Flow::Jump)
                }
                None => Err(Chip8Error::StackUnderflow { pc: self.cpu.pc }),
            },
            // 0NNN (SYS addr) would call native machine code, which doesn't exist here.
            _ => Err(self.unsupported(instr)),
        }
    }

    /// Execute an arithmetic instruction
    ///
    /// Where VF receives a flag, it is written before the result,
    /// so the result wins when VF is also the destination.
    #[inline]
    fn exec_math(&mut self, instr: u16, vx: usize, vy: usize, n: u8) -> Chip8Result<()> {
        let (x, y) = (self.cpu.registers[vx], self.cpu.registers[vy]);

        match n {
            // 8XY0 (LD Vx, Vy)
            //
            // Store the value of register VY in register VX.
            0x0 => self.cpu.registers[vx] = y,
            // 8XY1 (OR Vx, Vy)
            0x1 => self.cpu.registers[vx] = x | y,
            // 8XY2 (AND Vx, Vy)
            0x2 => self.cpu.registers[vx] = x & y,
            // 8XY3 (XOR Vx, Vy)
            0x3 => self.cpu.registers[vx] = x ^ y,
            // 8XY4 (ADD Vx, Vy)
            //
            // ADDs VX to VY, and stores the result in VX.
            // Overflow is wrapped.
            // If overflow, set VF to 1, else 0.
            0x4 => {
                let (result, carry) = x.overflowing_add(y);
                self.cpu.registers[FLAG_REGISTER] = carry as u8;
                self.cpu.registers[vx] = result;
            }
            // 8XY5 (SUB Vx, Vy)
            //
            // Subtracts VY from VX, and stores the result in VX.
            // VF is set to 1 when VX is strictly greater than VY, otherwise 0.
            0x5 => {
                self.cpu.registers[FLAG_REGISTER] = (x > y) as u8;
                self.cpu.registers[vx] = x.wrapping_sub(y);
            }
            // 8XY6 (SHR Vx)
            //
            // VF receives the least-significant bit of VX before the shift.
            // VY is unused.
            0x6 => {
                self.cpu.registers[FLAG_REGISTER] = x & 1;
                self.cpu.registers[vx] = x >> 1;
            }
            // 8XY7 (SUBN Vx, Vy)
            //
            // Subtracts VX from VY, and stores the result in VX.
            // VF is set to 1 when VY is strictly greater than VX, otherwise 0.
            0x7 => {
                self.cpu.registers[FLAG_REGISTER] = (y > x) as u8;
                self.cpu.registers[vx] = y.wrapping_sub(x);
            }
            // 8XYE (SHL Vx)
            //
            // VF receives the most-significant bit of VX before the shift.
            // VY is unused.
            0xE => {
                self.cpu.registers[FLAG_REGISTER] = x >> 7;
                self.cpu.registers[vx] = x << 1;
            }
            // Unsupported operation.
            _ => return Err(self.unsupported(instr)),
        }

        self.next();
        Ok(())
    }

    /// Execute a keyboard instruction
    #[inline]
    fn exec_key(&mut self, instr: u16, vx: usize, nn: u8) -> Chip8Result<()> {
        let key_id = self.cpu.registers[vx];

        match nn {
            // EX9E (SKP Vx)
            //
            // Skip the next instruction if the key with the value of VX is pressed.
            0x9E => self.skip_if(self.cpu.key_state(key_id)),
            // EXA1 (SKNP Vx)
            //
            // Skip the next instruction if the key with the value of VX is not pressed.
            0xA1 => self.skip_if(!self.cpu.key_state(key_id)),
            // Unsupported operation.
            _ => return Err(self.unsupported(instr)),
        }

        Ok(())
    }

    /// Execute a miscellaneous instruction
    #[inline]
    fn exec_misc(&mut self, instr: u16, vx: usize, nn: u8) -> Chip8Result<Flow> {
        let addr = self.cpu.address as usize;

        match nn {
            // FX07 (LD Vx, DT)
            //
            // Set Vx = delay timer value.
            0x07 => self.cpu.registers[vx] = self.cpu.delay_timer,
            // FX0A (LD Vx, K)
            //
            // Wait for a key press, store the value of the key in Vx.
            // The program counter stays on this instruction until a key
            // is pressed, so it is fetched again on the next step.
            0x0A => match self.cpu.first_key() {
                Some(k) => self.cpu.registers[vx] = k,
                None => return Ok(Flow::KeyWait),
            },
            // FX15 (LD DT, Vx)
            //
            // Set delay timer = Vx.
            0x15 => self.cpu.delay_timer = self.cpu.registers[vx],
            // FX18 (LD ST, Vx)
            //
            // Set sound timer = Vx.
            0x18 => self.cpu.sound_timer = self.cpu.registers[vx],
            // FX1E (ADD I, Vx)
            //
            // Add Vx to I
            0x1E => {
                let x = self.cpu.registers[vx] as Address;
                self.cpu.address = self.cpu.address.wrapping_add(x);
            }
            // FX29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            0x29 => {
                let x = self.cpu.registers[vx] as Address;
                self.cpu.address = FONTSET_START + x * FONTSET_HEIGHT as Address;
            }
            // FX33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            0x33 => {
                let x = self.cpu.registers[vx];
                self.cpu.write(addr, x / 100);
                self.cpu.write(addr + 1, x / 10 % 10);
                self.cpu.write(addr + 2, x % 10);
            }
            // FX55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I.
            0x55 => {
                for v in 0..=vx {
                    self.cpu.write(addr + v, self.cpu.registers[v]);
                }
            }
            // FX65 (LD Vx, [I])
            //
            // Read registers V0 through Vx from memory starting at location I.
            0x65 => {
                for v in 0..=vx {
                    self.cpu.registers[v] = self.cpu.read(addr + v);
                }
            }
            // Unsupported operation.
            _ => return Err(self.unsupported(instr)),
        }

        self.next();
        Ok(Flow::Ok)
    }

    /// XOR a sprite from memory at I onto the display.
    fn draw_sprite(&mut self, vx: usize, vy: usize, n: u8) {
        let (x, y) = (
            self.cpu.registers[vx] as usize,
            self.cpu.registers[vy] as usize,
        );
        let addr = self.cpu.address as usize;
        let mut is_erased = false;

        for r in 0..n as usize {
            // Each row is 8 bits representing the 8 pixels of the sprite.
            let row = self.cpu.read(addr + r);

            for c in 0..8 {
                if (row >> (7 - c)) & 1 == 0 {
                    continue;
                }

                let d = ((x + c) & DISPLAY_WIDTH_MASK)
                    + ((y + r) & DISPLAY_HEIGHT_MASK) * DISPLAY_WIDTH;

                // XOR erases a pixel when both the old and new values are both 1.
                is_erased |= self.cpu.display[d];
                self.cpu.display[d] = !self.cpu.display[d];
            }
        }

        // If a pixel was erased, then a collision occurred.
        self.cpu.registers[FLAG_REGISTER] = is_erased as u8;
        self.cpu.redraw = true;
    }
}

fn create_rng(conf: &Chip8Conf) -> StdRng {
    match conf.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Troubleshooting
impl Chip8Vm {
    /// Returns the contents of the memory as a human readable string,
    /// one instruction word per line.
    pub fn dump_ram(&self, start: usize, count: usize) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        for addr in (start..start + count).step_by(2) {
            let instr = word(self.cpu.read(addr), self.cpu.read(addr + 1));
            writeln!(buf, "{:04X}: {:04X}", addr & MEM_MASK, instr)?;
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        for y in 0..DISPLAY_HEIGHT {
            for x in 0..DISPLAY_WIDTH {
                if self.cpu.display[x + y * DISPLAY_WIDTH] {
                    write!(buf, "#")?;
                } else {
                    write!(buf, ".")?;
                }
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }

    pub fn dump_keys(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        if self.cpu.any_key() {
            write!(buf, "keys:")?;
            for i in 0..KEY_COUNT {
                if self.cpu.key_state(i) {
                    write!(buf, " k{i:x}")?;
                }
            }
        }

        Ok(buf)
    }
}

#[cfg(test)]
mod test {
    use std::{cell::Cell, rc::Rc};

    use super::*;

    fn vm_with(bytecode: &[u8]) -> Chip8Vm {
        let mut vm = Chip8Vm::new(Chip8Conf { rng_seed: Some(7) });
        vm.load_bytecode(bytecode).unwrap();
        vm
    }

    /// Counts beeps.
    struct Beeper(Rc<Cell<usize>>);

    impl Buzzer for Beeper {
        fn beep(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    /// Fx0A (LD Vx, K)
    ///
    /// Wait for a keypress, then store the key value in Vx.
    /// The VM must stall while waiting, and signal the state to the outer executer.
    #[test]
    #[rustfmt::skip]
    fn test_key_wait() {
        let mut vm = vm_with(&[
            0xF1, 0x0A, // LD v1, K
            0x62, 0x42  // LD v2, 0x42  ; sentinal
        ]);

        // machine must stall
        for _ in 0..6 {
            assert_eq!(vm.step(), Ok(Flow::KeyWait));
            assert_eq!(vm.cpu.pc, MEM_START as Address);
        }

        // machine has yielded, waiting for any key to be pressed.
        vm.set_key(KeyCode::Key5, true);

        // machine will now advance
        assert_eq!(vm.step(), Ok(Flow::Ok));
        assert_eq!(vm.cpu.pc, MEM_START as Address + 2);
        assert!(vm.cpu.key_state(0x05));
        assert_eq!(vm.cpu.registers[1], 0x05);

        // Ensure the machine is continuing
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, MEM_START as Address + 4);
        assert_eq!(vm.cpu.registers[2], 0x42); // sentinal
    }

    #[test]
    #[rustfmt::skip]
    fn test_key_wait_freezes_timers() {
        let mut vm = vm_with(&[
            0xF0, 0x0A, // LD v0, K
        ]);
        vm.cpu.delay_timer = 10;
        vm.cpu.sound_timer = 10;

        vm.run_steps(5).unwrap();
        assert_eq!(vm.cpu.delay_timer, 10);
        assert_eq!(vm.cpu.sound_timer, 10);

        // Once the key is found, the step completes as usual.
        vm.set_keys(&[false, false, false, true, false, false, false, false,
                      false, true, false, false, false, false, false, false]);
        vm.step().unwrap();
        assert_eq!(vm.cpu.registers[0], 3);
        assert_eq!(vm.cpu.delay_timer, 9);
        assert_eq!(vm.cpu.sound_timer, 9);
    }

    /// Booleans must be cast to u8 1 or 0
    #[test]
    fn test_assert_bool_cast() {
        assert_eq!(true as u8, 1);
        assert_eq!(false as u8, 0);
    }

    #[test]
    #[rustfmt::skip]
    fn test_draw_collision() {
        // Draw two sprites next to each other.
        // The zero bits of the second draw must not erase
        // the pixels of the first draw
        //
        // draw sprite 1
        // ____####, vf == 0
        //
        // draw sprite 2
        // ########, vf == 0
        let mut vm = vm_with(&[
            0xA2, 0x0C, // LD I, .sprite
            0x60, 0x04, // LD v0, 4
            0x61, 0x00, // LD v1, 0
            0xD0, 0x11, // DRW v0, v1, 1
            0x60, 0x00, // LD v0, 0
            0xD0, 0x11, // DRW v0, v1, 1
            // .sprite
            0b11110000,
            0b00000000,
        ]);

        vm.run_steps(6).unwrap();

        assert!(vm.display_buffer()[0]); // sprite 2
        assert!(vm.display_buffer()[4]); // sprite 1, under the blank tail of sprite 2
        assert!(vm.display_buffer()[0..8].iter().all(|px| *px));
        assert!(!vm.display_buffer()[8]);
        assert_eq!(vm.cpu.registers[0xF], 0);
    }

    #[test]
    #[rustfmt::skip]
    fn test_draw_sets_redraw() {
        let mut vm = vm_with(&[
            0x00, 0xE0, // CLS
            0xD0, 0x00, // DRW v0, v0, 0
        ]);
        assert!(!vm.take_redraw());

        assert_eq!(vm.step(), Ok(Flow::Draw));
        assert!(vm.take_redraw());
        assert!(!vm.take_redraw(), "redraw flag is consumed once");

        // Zero height sprite draws nothing, but still requests a redraw.
        assert_eq!(vm.step(), Ok(Flow::Draw));
        assert!(vm.take_redraw());
        assert!(vm.display_buffer().iter().all(|px| !*px));
    }

    #[test]
    #[rustfmt::skip]
    fn test_draw_reads_coordinates_before_flag_reset() {
        let mut vm = vm_with(&[
            0x6F, 0x05, // LD vF, 5
            0xA0, 0x50, // LD I, font '0'
            0xDF, 0xF1, // DRW vF, vF, 1
        ]);
        vm.run_steps(3).unwrap();

        // Top row of '0' is 0xF0.
        assert!(vm.pixel(5, 5));
        assert!(vm.pixel(8, 5));
        assert!(!vm.pixel(9, 5));
        assert_eq!(vm.cpu.registers[0xF], 0);
    }

    #[test]
    #[rustfmt::skip]
    fn test_sound_timer_beeps() {
        let beeps = Rc::new(Cell::new(0));
        let mut vm = vm_with(&[
            0x60, 0x03, // LD v0, 3
            0xF0, 0x18, // LD ST, v0
            0x12, 0x04, // JP 0x204
        ]);
        vm.set_buzzer(Beeper(beeps.clone()));

        vm.step().unwrap();
        assert_eq!(beeps.get(), 0);

        // 3 -> 2, beeps
        vm.step().unwrap();
        assert_eq!(vm.cpu.sound_timer, 2);
        assert_eq!(beeps.get(), 1);

        // 2 -> 1, beeps
        vm.step().unwrap();
        assert_eq!(beeps.get(), 2);

        // 1 -> 0, silent
        vm.step().unwrap();
        assert_eq!(vm.cpu.sound_timer, 0);
        assert_eq!(beeps.get(), 2);

        vm.run_steps(10).unwrap();
        assert_eq!(beeps.get(), 2);
    }

    #[test]
    #[rustfmt::skip]
    fn test_fx07_does_not_fall_through() {
        let mut vm = vm_with(&[
            0x60, 0x09, // LD v0, 9
            0xF0, 0x15, // LD DT, v0
            0xF1, 0x07, // LD v1, DT
        ]);
        vm.cpu.address = 0x300;
        vm.run_steps(3).unwrap();

        // DT was 9 when loaded, then ticked after the load.
        assert_eq!(vm.cpu.registers[1], 8);
        assert_eq!(vm.cpu.delay_timer, 7);
        assert_eq!(vm.cpu.address, 0x300);
    }

    #[test]
    fn test_fault_latches_until_reset() {
        let mut vm = vm_with(&[0x50, 0x01]);
        let err = Chip8Error::UnsupportedOpcode {
            opcode: 0x5001,
            address: 0x200,
        };

        assert_eq!(vm.step(), Err(err.clone()));
        assert_eq!(vm.step(), Err(err.clone()));
        assert_eq!(vm.fault(), Some(&err));
        assert_eq!(vm.cpu.pc, 0x200);

        vm.reset();
        assert_eq!(vm.fault(), None);
        // Memory was wiped, so the program is now zeroes: SYS 000.
        assert!(matches!(
            vm.step(),
            Err(Chip8Error::UnsupportedOpcode { opcode: 0x0000, .. })
        ));
    }

    #[test]
    fn test_pc_wraps_at_end_of_memory() {
        let mut vm = vm_with(&[]);
        // LD V0, 0x11 at the last word of memory.
        vm.cpu.ram[0xFFE] = 0x60;
        vm.cpu.ram[0xFFF] = 0x11;
        vm.cpu.pc = 0xFFE;
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, 0x000);

        // SE V0, 0x11 skips past the end.
        vm.cpu.ram[0xFFE] = 0x30;
        vm.cpu.pc = 0xFFE;
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, 0x002);

        // Faults raised after the wrap report the masked address.
        vm.cpu.ram[0xFFE] = 0x60;
        vm.cpu.ram[0x000] = 0x50;
        vm.cpu.ram[0x001] = 0x01;
        vm.cpu.pc = 0xFFE;
        vm.step().unwrap();
        assert_eq!(
            vm.step(),
            Err(Chip8Error::UnsupportedOpcode {
                opcode: 0x5001,
                address: 0x000,
            })
        );
    }

    #[test]
    fn test_return_wraps_at_end_of_memory() {
        let mut vm = vm_with(&[0x00, 0xEE]);
        assert!(vm.cpu.push(0xFFE));
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, 0x000);
    }

    #[test]
    fn test_seeded_rng_is_repeatable() {
        let program = [0xC0, 0xFF, 0xC1, 0xFF, 0xC2, 0x0F];
        let mut a = vm_with(&program);
        let mut b = vm_with(&program);
        a.run_steps(3).unwrap();
        b.run_steps(3).unwrap();

        assert_eq!(a.cpu.registers, b.cpu.registers);
        assert_eq!(a.cpu.registers[2] & 0xF0, 0);
    }

    #[test]
    fn test_dump_display() {
        let mut vm = vm_with(&[0xD0, 0x01]);
        vm.cpu.address = FONTSET_START;
        vm.step().unwrap();

        let dump = vm.dump_display().unwrap();
        let first = dump.lines().next().unwrap();
        assert_eq!(first.len(), DISPLAY_WIDTH);
        assert!(first.starts_with("####...."));
        assert_eq!(dump.lines().count(), DISPLAY_HEIGHT);
    }

    #[test]
    fn test_dump_keys() {
        let mut vm = vm_with(&[]);
        assert_eq!(vm.dump_keys().unwrap(), "");

        vm.set_key(KeyCode::Key1, true);
        vm.set_key(KeyCode::KeyF, true);
        assert_eq!(vm.dump_keys().unwrap(), "keys: k1 kf");
    }
}
