use crate::{
    error::StepError,
    flags::Flags,
    opcode::Instr,
    state::{CpuState, MEMORY_SIZE},
    symbol::{AluOp, Condition, Loc, RegPair, Register},
};

/// Outcome of a successful [`step`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Step {
    /// Executed one instruction.
    Executed(Instr),
    /// The state had already halted, nothing ran.
    Halted,
}

/// Decode the instruction at the program counter without executing it.
pub fn fetch(state: &CpuState) -> Result<Instr, StepError> {
    let pc = state.pc();
    let opcode = state.byte_at(pc);
    Instr::decode(opcode, state.byte_at(pc + 1), state.byte_at(pc + 2))
        .ok_or(StepError::UnknownOpcode { opcode, pc })
}

/// Execute exactly one instruction in place.
///
/// On failure `state` is left exactly as it was, program counter included.
pub fn step(state: &mut CpuState) -> Result<Step, StepError> {
    if state.is_finished() {
        return Ok(Step::Halted);
    }
    let instr = fetch(state)?;
    // Execute on a copy, commit on success
    let mut next = state.clone();
    execute(&mut next, instr)?;
    *state = next;
    Ok(Step::Executed(instr))
}

/// State after one instruction, leaving `state` untouched.
pub fn next_state(state: &CpuState) -> Result<CpuState, StepError> {
    let mut next = state.clone();
    step(&mut next)?;
    Ok(next)
}

fn execute(state: &mut CpuState, instr: Instr) -> Result<(), StepError> {
    // Offset of the following instruction, where execution continues unless control moves
    let mut next = (state.pc() + instr.len() as u16) % MEMORY_SIZE as u16;

    match instr {
        Instr::Nop => {}
        Instr::Hlt => state.set_finished(true),

        Instr::Mov { dest, src } => {
            let value = state.load_loc(src)?;
            state.store_loc(dest, value)?;
        }
        Instr::Mvi { dest, value } => state.store_loc(dest, value)?,
        Instr::Lxi { pair, value } => state.set_pair(pair, value)?,
        Instr::Lda(addr) => {
            let value = state.read(addr)?;
            state.set_register(Register::A, value);
        }
        Instr::Sta(addr) => state.write(addr, state.register(Register::A))?,
        Instr::Lhld(addr) => {
            let low = state.read(addr)?;
            let high = state.read(addr.wrapping_add(1))?;
            state.set_register(Register::L, low);
            state.set_register(Register::H, high);
        }
        Instr::Shld(addr) => {
            state.write(addr, state.register(Register::L))?;
            state.write(addr.wrapping_add(1), state.register(Register::H))?;
        }
        Instr::Ldax(pair) => {
            let value = state.read(state.pair(pair))?;
            state.set_register(Register::A, value);
        }
        Instr::Stax(pair) => state.write(state.pair(pair), state.register(Register::A))?,
        Instr::Xchg => {
            let (de, hl) = (state.pair(RegPair::D), state.pair(RegPair::H));
            state.set_pair(RegPair::D, hl)?;
            state.set_pair(RegPair::H, de)?;
        }

        Instr::Alu { op, src } => {
            let value = state.load_loc(src)?;
            alu(state, op, value);
        }
        Instr::AluImm { op, value } => alu(state, op, value),
        Instr::Inr(loc) => {
            let raw = state.load_loc(loc)? as u16 + 1;
            step_counter(state, loc, raw)?;
        }
        Instr::Dcr(loc) => {
            let raw = (state.load_loc(loc)? as u16).wrapping_sub(1);
            step_counter(state, loc, raw)?;
        }
        Instr::Inx(pair) => state.set_pair(pair, state.pair(pair).wrapping_add(1))?,
        Instr::Dcx(pair) => state.set_pair(pair, state.pair(pair).wrapping_sub(1))?,
        Instr::Dad(pair) => {
            let sum = state.pair(RegPair::H) as u32 + state.pair(pair) as u32;
            state.set_pair(RegPair::H, sum as u16)?;
            state.flags_mut().c = sum > 0xFFFF;
        }
        Instr::Daa => daa(state),
        Instr::Cma => state.set_register(Register::A, !state.register(Register::A)),
        Instr::Cmc => state.flags_mut().c ^= true,
        Instr::Stc => state.flags_mut().c = true,

        Instr::Rlc => rotate(state, |a, _| (a.rotate_left(1), a & 0x80 != 0)),
        Instr::Rrc => rotate(state, |a, _| (a.rotate_right(1), a & 0x01 != 0)),
        Instr::Ral => rotate(state, |a, carry| (a << 1 | carry as u8, a & 0x80 != 0)),
        Instr::Rar => rotate(state, |a, carry| (a >> 1 | (carry as u8) << 7, a & 0x01 != 0)),

        Instr::Jmp(addr) => next = state.offset_of(addr)?,
        Instr::Jcond { cond, addr } => {
            if holds(state.flags(), cond) {
                next = state.offset_of(addr)?;
            }
        }
        Instr::Call(addr) => next = call(state, addr, next)?,
        Instr::Ccond { cond, addr } => {
            if holds(state.flags(), cond) {
                next = call(state, addr, next)?;
            }
        }
        Instr::Ret => next = ret(state)?,
        Instr::Rcond(cond) => {
            if holds(state.flags(), cond) {
                next = ret(state)?;
            }
        }
        Instr::Rst(vector) => {
            state.push_word(CpuState::address_of(next))?;
            next = vector as u16 * 8;
        }
        Instr::Pchl => next = state.offset_of(state.pair(RegPair::H))?,

        Instr::Push(pair) => state.push_word(state.pair(pair))?,
        Instr::Pop(pair) => {
            let value = state.pop_word()?;
            state.set_pair(pair, value)?;
        }
        Instr::Xthl => {
            // Pushing back refills the two cells just popped
            let top = state.pop_word()?;
            state.push_word(state.pair(RegPair::H))?;
            state.set_pair(RegPair::H, top)?;
        }
        Instr::Sphl => state.set_pair(RegPair::Sp, state.pair(RegPair::H))?,
    }

    state.set_pc(next);
    Ok(())
}

/// Accumulator operation of the `add`..`cmp` group.
fn alu(state: &mut CpuState, op: AluOp, operand: u8) {
    let a = state.register(Register::A) as u16;
    let operand = operand as u16;
    let carry = state.flags().c as u16;

    let (raw, flags) = match op {
        AluOp::Add => arith(a + operand),
        AluOp::Adc => arith(a + operand + carry),
        AluOp::Sub | AluOp::Cmp => arith(a.wrapping_sub(operand)),
        AluOp::Sbb => arith(a.wrapping_sub(operand).wrapping_sub(carry)),
        AluOp::Ana => logic(a & operand),
        AluOp::Xra => logic(a ^ operand),
        AluOp::Ora => logic(a | operand),
    };

    state.set_flags(flags);
    // Compare only keeps the flags
    if op != AluOp::Cmp {
        state.set_register(Register::A, raw as u8);
    }
}

fn arith(raw: u16) -> (u16, Flags) {
    (raw, Flags::from_result(raw))
}

fn logic(raw: u16) -> (u16, Flags) {
    (raw, Flags::from_logic(raw as u8))
}

/// Store an `inr`/`dcr` result. Carry is left alone.
fn step_counter(state: &mut CpuState, loc: Loc, raw: u16) -> Result<(), StepError> {
    state.store_loc(loc, raw as u8)?;
    let carry = state.flags().c;
    state.set_flags(Flags {
        c: carry,
        ..Flags::from_result(raw)
    });
    Ok(())
}

/// Rotate the accumulator. `f` maps the accumulator and the carry-in to the result and
/// the carry-out.
fn rotate(state: &mut CpuState, f: impl FnOnce(u8, bool) -> (u8, bool)) {
    let (value, carry) = f(state.register(Register::A), state.flags().c);
    state.set_register(Register::A, value);
    state.flags_mut().c = carry;
}

fn daa(state: &mut CpuState) {
    let a = state.register(Register::A);
    let flags = state.flags();
    let (low, high) = (a & 0x0F, a >> 4);

    let mut correction = 0;
    let mut carry = flags.c;
    if flags.ac || low > 9 {
        correction |= 0x06;
    }
    if flags.c || high > 9 || (high >= 9 && low > 9) {
        correction |= 0x60;
        carry = true;
    }

    let raw = a as u16 + correction;
    state.set_register(Register::A, raw as u8);
    state.set_flags(Flags {
        c: carry,
        ..Flags::from_result(raw)
    });
}

/// Push the return address and produce the call target.
fn call(state: &mut CpuState, addr: u16, ret: u16) -> Result<u16, StepError> {
    let target = state.offset_of(addr)?;
    state.push_word(CpuState::address_of(ret))?;
    Ok(target)
}

fn ret(state: &mut CpuState) -> Result<u16, StepError> {
    let addr = state.pop_word()?;
    state.offset_of(addr)
}

fn holds(flags: Flags, cond: Condition) -> bool {
    match cond {
        Condition::Nz => !flags.z,
        Condition::Z => flags.z,
        Condition::Nc => !flags.c,
        Condition::C => flags.c,
        Condition::Po => !flags.p,
        Condition::Pe => flags.p,
        Condition::P => !flags.s,
        Condition::M => flags.s,
    }
}
