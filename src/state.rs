use crate::{
    error::StepError,
    flags::{join_word, split_word, Flags},
    program::Program,
    symbol::{Loc, RegPair, Register},
};

/// Absolute address of the first byte of memory.
pub const BASE_ADDRESS: u16 = 0x0800;
/// Size of the addressable window, `0x0800..0x0BB0`.
pub const MEMORY_SIZE: usize = 0x03B0;

/// The 8-bit registers.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Registers {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
}

impl Registers {
    pub fn get(&self, reg: Register) -> u8 {
        match reg {
            Register::A => self.a,
            Register::B => self.b,
            Register::C => self.c,
            Register::D => self.d,
            Register::E => self.e,
            Register::H => self.h,
            Register::L => self.l,
        }
    }

    pub fn get_mut(&mut self, reg: Register) -> &mut u8 {
        match reg {
            Register::A => &mut self.a,
            Register::B => &mut self.b,
            Register::C => &mut self.c,
            Register::D => &mut self.d,
            Register::E => &mut self.e,
            Register::H => &mut self.h,
            Register::L => &mut self.l,
        }
    }
}

/// Complete processor state.
///
/// `pc` and `sp` are offsets into `memory`. `pc` wraps around the window. `sp` runs from
/// 0 to `MEMORY_SIZE` inclusive, where `MEMORY_SIZE` is the empty stack one past the
/// last byte, and never wraps.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CpuState {
    regs: Registers,
    flags: Flags,
    memory: Box<[u8; MEMORY_SIZE]>,
    pc: u16,
    sp: u16,
    finished: bool,
}

impl Default for CpuState {
    fn default() -> Self {
        CpuState::new()
    }
}

impl CpuState {
    /// State at reset: every field zeroed except the stack pointer, which starts empty.
    pub fn new() -> Self {
        CpuState {
            regs: Registers::default(),
            flags: Flags::default(),
            memory: Box::new([0; MEMORY_SIZE]),
            pc: 0,
            sp: MEMORY_SIZE as u16,
            finished: false,
        }
    }

    /// Fresh state with `program` as its memory image.
    pub fn with_program(program: Program) -> Self {
        CpuState {
            memory: program.into_memory(),
            ..CpuState::new()
        }
    }

    pub fn reset(&mut self) {
        *self = CpuState::new();
    }

    /// Replace the whole state with a fresh one running `program`. The memory image is
    /// swapped in as one array, never written cell by cell.
    pub fn load(&mut self, program: Program) {
        *self = CpuState::with_program(program);
    }

    pub fn register(&self, reg: Register) -> u8 {
        self.regs.get(reg)
    }

    pub fn set_register(&mut self, reg: Register, value: u8) {
        *self.regs.get_mut(reg) = value;
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.flags = flags;
    }

    pub fn flags_mut(&mut self) -> &mut Flags {
        &mut self.flags
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory[..]
    }

    /// Direct access for inspectors; writes bypass instruction execution.
    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory[..]
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = wrap(pc as usize);
    }

    pub fn sp(&self) -> u16 {
        self.sp
    }

    /// Set once `hlt` has executed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn set_finished(&mut self, finished: bool) {
        self.finished = finished;
    }

    /// Absolute address of a window offset.
    pub fn address_of(offset: u16) -> u16 {
        BASE_ADDRESS.wrapping_add(offset)
    }

    /// Window offset of an absolute address.
    pub fn offset_of(&self, address: u16) -> Result<u16, StepError> {
        let offset = address.wrapping_sub(BASE_ADDRESS);
        if offset as usize >= MEMORY_SIZE {
            return Err(StepError::AddressOutOfRange {
                address,
                pc: self.pc,
            });
        }
        Ok(offset)
    }

    /// Byte at window offset `offset`, wrapping around the window.
    pub fn byte_at(&self, offset: u16) -> u8 {
        self.memory[wrap(offset as usize) as usize]
    }

    pub fn read(&self, address: u16) -> Result<u8, StepError> {
        let offset = self.offset_of(address)?;
        Ok(self.memory[offset as usize])
    }

    pub fn write(&mut self, address: u16, value: u8) -> Result<(), StepError> {
        let offset = self.offset_of(address)?;
        self.memory[offset as usize] = value;
        Ok(())
    }

    /// Read a register, or the memory cell addressed by `HL` for `m`.
    pub fn load_loc(&self, loc: Loc) -> Result<u8, StepError> {
        match loc {
            Loc::Reg(reg) => Ok(self.regs.get(reg)),
            Loc::Mem => self.read(self.pair(RegPair::H)),
        }
    }

    pub fn store_loc(&mut self, loc: Loc, value: u8) -> Result<(), StepError> {
        match loc {
            Loc::Reg(reg) => {
                *self.regs.get_mut(reg) = value;
                Ok(())
            }
            Loc::Mem => self.write(self.pair(RegPair::H), value),
        }
    }

    /// Value of a register pair. `Sp` reads as an absolute address.
    pub fn pair(&self, pair: RegPair) -> u16 {
        match pair {
            RegPair::B => join_word(self.regs.c, self.regs.b),
            RegPair::D => join_word(self.regs.e, self.regs.d),
            RegPair::H => join_word(self.regs.l, self.regs.h),
            RegPair::Sp => CpuState::address_of(self.sp),
            RegPair::Psw => join_word(self.flags.to_byte(), self.regs.a),
        }
    }

    /// Set a register pair. `Sp` takes an absolute address, which may be one past the end
    /// of the window (an empty stack).
    pub fn set_pair(&mut self, pair: RegPair, value: u16) -> Result<(), StepError> {
        let [low, high] = split_word(value);
        match pair {
            RegPair::B => (self.regs.b, self.regs.c) = (high, low),
            RegPair::D => (self.regs.d, self.regs.e) = (high, low),
            RegPair::H => (self.regs.h, self.regs.l) = (high, low),
            RegPair::Sp => {
                let offset = value.wrapping_sub(BASE_ADDRESS);
                if offset as usize > MEMORY_SIZE {
                    return Err(StepError::AddressOutOfRange {
                        address: value,
                        pc: self.pc,
                    });
                }
                self.sp = offset;
            }
            RegPair::Psw => {
                self.regs.a = high;
                self.flags = Flags::from_byte(low);
            }
        }
        Ok(())
    }

    /// Push one byte: decrement the stack pointer, then write. Fails on a full stack.
    pub fn push_byte(&mut self, value: u8) -> Result<(), StepError> {
        let Some(sp) = self.sp.checked_sub(1) else {
            return Err(StepError::AddressOutOfRange {
                address: BASE_ADDRESS.wrapping_sub(1),
                pc: self.pc,
            });
        };
        self.sp = sp;
        self.memory[sp as usize] = value;
        Ok(())
    }

    /// Pop one byte: read, then increment the stack pointer. Fails on an empty stack.
    pub fn pop_byte(&mut self) -> Result<u8, StepError> {
        let Some(&value) = self.memory.get(self.sp as usize) else {
            return Err(StepError::AddressOutOfRange {
                address: CpuState::address_of(self.sp),
                pc: self.pc,
            });
        };
        self.sp += 1;
        Ok(value)
    }

    /// Push a word high byte first, leaving it in memory order at the stack pointer.
    pub fn push_word(&mut self, value: u16) -> Result<(), StepError> {
        let [low, high] = split_word(value);
        self.push_byte(high)?;
        self.push_byte(low)
    }

    pub fn pop_word(&mut self) -> Result<u16, StepError> {
        let low = self.pop_byte()?;
        let high = self.pop_byte()?;
        Ok(join_word(low, high))
    }

    /// Bytes between the stack pointer and the top of memory, most recent first.
    pub fn stack(&self) -> &[u8] {
        &self.memory[self.sp as usize..]
    }
}

fn wrap(offset: usize) -> u16 {
    (offset % MEMORY_SIZE) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_zeroes_everything() {
        let mut state = CpuState::new();
        state.set_register(Register::A, 5);
        state.memory_mut()[10] = 0xAA;
        state.set_pc(4);
        state.set_pair(RegPair::Sp, 0x0900).unwrap();
        state.set_finished(true);
        state.reset();
        assert_eq!(state, CpuState::new());
        assert!(state.memory().iter().all(|&byte| byte == 0));
        assert_eq!(state.memory().len(), MEMORY_SIZE);
        assert_eq!(state.pair(RegPair::Sp), 0x0BB0);
        assert!(state.stack().is_empty());
    }

    #[test]
    fn stack_grows_down_from_top_of_memory() {
        let mut state = CpuState::new();
        state.push_word(0x1234).unwrap();
        assert_eq!(state.sp() as usize, MEMORY_SIZE - 2);
        assert_eq!(state.memory()[MEMORY_SIZE - 1], 0x12);
        assert_eq!(state.stack(), &[0x34, 0x12]);
        assert_eq!(state.pop_word(), Ok(0x1234));
        assert_eq!(state.sp() as usize, MEMORY_SIZE);
        assert!(state.stack().is_empty());
    }

    #[test]
    fn nothing_pops_off_an_empty_stack() {
        let mut state = CpuState::new();
        assert_eq!(
            state.pop_byte(),
            Err(StepError::AddressOutOfRange {
                address: 0x0BB0,
                pc: 0
            })
        );
        assert_eq!(state.sp() as usize, MEMORY_SIZE);

        // Only the high byte is on the stack
        state.set_pair(RegPair::Sp, 0x0BAF).unwrap();
        assert!(state.pop_word().is_err());
    }

    #[test]
    fn nothing_pushes_below_the_window() {
        let mut state = CpuState::new();
        state.set_pair(RegPair::Sp, 0x0801).unwrap();
        state.push_byte(0xAA).unwrap();
        assert_eq!(state.sp(), 0);
        assert_eq!(state.stack().len(), MEMORY_SIZE);
        assert_eq!(
            state.push_byte(0xBB),
            Err(StepError::AddressOutOfRange {
                address: 0x07FF,
                pc: 0
            })
        );
        assert_eq!(state.sp(), 0);
        assert_eq!(state.memory()[0], 0xAA);
    }

    #[test]
    fn memory_register_uses_hl() {
        let mut state = CpuState::new();
        state.set_pair(RegPair::H, 0x0810).unwrap();
        assert_eq!((state.register(Register::H), state.register(Register::L)), (0x08, 0x10));
        state.store_loc(Loc::Mem, 0x5A).unwrap();
        assert_eq!(state.memory()[0x10], 0x5A);
        assert_eq!(state.load_loc(Loc::Mem), Ok(0x5A));

        state.set_pair(RegPair::H, 0x0000).unwrap();
        assert_eq!(
            state.load_loc(Loc::Mem),
            Err(StepError::AddressOutOfRange { address: 0, pc: 0 })
        );
    }

    #[test]
    fn stack_pointer_reads_back_as_written() {
        let mut state = CpuState::new();
        for address in [0x0800, 0x0900, 0x0BAF, 0x0BB0] {
            state.set_pair(RegPair::Sp, address).unwrap();
            assert_eq!(state.pair(RegPair::Sp), address);
        }
        state.set_pair(RegPair::Sp, 0x0900).unwrap();
        assert_eq!(state.sp(), 0x100);
        assert!(state.set_pair(RegPair::Sp, 0x0BB1).is_err());
        assert!(state.set_pair(RegPair::Sp, 0x07FF).is_err());
        assert_eq!(state.pair(RegPair::Sp), 0x0900);
    }

    #[test]
    fn psw_pairs_accumulator_with_flags() {
        let mut state = CpuState::new();
        state.set_pair(RegPair::Psw, 0x42_41).unwrap();
        assert_eq!(state.register(Register::A), 0x42);
        assert!(state.flags().z);
        assert!(state.flags().c);
        assert_eq!(state.pair(RegPair::Psw), 0x4243);
    }
}
