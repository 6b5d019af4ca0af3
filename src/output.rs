use std::cell::RefCell;
use std::str::Chars;

use colored::{ColoredString, Colorize};

use crate::{
    flags::Flags,
    opcode::Instr,
    program::Assembly,
    state::CpuState,
    symbol::{RegPair, Register},
};

#[derive(Clone, Copy, Debug)]
pub enum Output {
    /// Program results, on stdout.
    Normal,
    /// Per-step trace lines, on stderr.
    Trace,
}

struct Decolored<'a> {
    chars: Chars<'a>,
}

impl Output {
    thread_local! {
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_minimal(new_value: bool) -> bool {
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }

    pub fn print_str(&self, string: &str) {
        match (self, Self::is_minimal()) {
            (Self::Normal, false) => print!("{}", string),
            (Self::Normal, true) => print_colorless(string),
            (Self::Trace, false) => eprint!("{}", ColoredString::from(string).blue()),
            // Always remove color if `--minimal`
            (Self::Trace, true) => eprint_colorless(string),
        }
    }

    pub fn print_registers(&self, state: &CpuState) {
        if Self::is_minimal() {
            for reg in Register::ALL {
                self.print_str(&format!("{} {}\n", reg.name().to_uppercase(), state.register(reg)));
            }
            self.print_str(&format!("PC 0x{:04x}\n", CpuState::address_of(state.pc())));
            self.print_str(&format!("SP 0x{:04x}\n", state.pair(RegPair::Sp)));
            self.print_flags(state.flags());
            return;
        }

        self.print_str("\x1b[2m┌────────────────────────────────────┐\x1b[0m\n");
        self.print_str(
            "\x1b[2m│        \x1b[3mhex    uint     int    char\x1b[0m\x1b[2m │\x1b[0m\n",
        );
        for reg in Register::ALL {
            self.print_str("\x1b[2m│\x1b[0m");
            self.print_str(&format!(" \x1b[1m{}\x1b[0m    ", reg.name().to_uppercase()));
            self.print_byte(state.register(reg));
            self.print_str(" \x1b[2m│\x1b[0m\n");
        }
        self.print_str("\x1b[2m│\x1b[0m");
        self.print_str(&format!(
            " \x1b[1mPC\x1b[0m  0x{:04x}",
            CpuState::address_of(state.pc())
        ));
        self.print_str("             ");
        self.print_str(&format!(" \x1b[1mSP\x1b[0m  0x{:04x}", state.pair(RegPair::Sp)));
        self.print_str(" \x1b[2m│\x1b[0m\n");
        self.print_str("\x1b[2m└────────────────────────────────────┘\x1b[0m\n");
        self.print_flags(state.flags());
    }

    pub fn print_flags(&self, flags: Flags) {
        let named = [
            ("S", flags.s),
            ("Z", flags.z),
            ("AC", flags.ac),
            ("P", flags.p),
            ("C", flags.c),
        ];
        if Self::is_minimal() {
            let bits: Vec<String> = named
                .iter()
                .map(|(name, set)| format!("{}={}", name.to_lowercase(), *set as u8))
                .collect();
            self.print_str(&format!("FLAGS {}\n", bits.join(" ")));
            return;
        }

        self.print_str(" \x1b[1mflags\x1b[0m ");
        for (name, set) in named {
            if set {
                self.print_str(&format!(" {}", name.green().bold()));
            } else {
                self.print_str(&format!(" \x1b[2m{}\x1b[0m", name));
            }
        }
        self.print_str("\n");
    }

    /// Used part of the stack, from the stack pointer up to the top of memory.
    pub fn print_stack(&self, state: &CpuState) {
        let stack = state.stack();
        if Self::is_minimal() {
            let bytes: Vec<String> = stack.iter().map(|byte| format!("{:02x}", byte)).collect();
            if bytes.is_empty() {
                self.print_str("STACK\n");
            } else {
                self.print_str(&format!("STACK {}\n", bytes.join(" ")));
            }
            return;
        }

        if stack.is_empty() {
            self.print_str(" \x1b[1mstack\x1b[0m  \x1b[2mempty\x1b[0m\n");
            return;
        }
        self.print_str(" \x1b[1mstack\x1b[0m\n");
        let top = state.sp();
        for (i, byte) in stack.iter().enumerate() {
            let addr = CpuState::address_of(top + i as u16);
            self.print_str(&format!("   \x1b[2m0x{:04x}\x1b[0m  0x{:02x}\n", addr, byte));
        }
    }

    /// One executed instruction: the address it was fetched from, its bytes and its text.
    pub fn print_trace(&self, pc: u16, instr: &Instr) {
        let bytes: Vec<String> = instr
            .encode()
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect();
        self.print_str(&format!(
            "0x{:04x}  {:<8}  {}\n",
            CpuState::address_of(pc),
            bytes.join(" "),
            instr
        ));
    }

    /// Disassembly of every emitted instruction, with its source line.
    pub fn print_listing(&self, assembly: &Assembly) {
        for (line, instr) in assembly.disassemble() {
            let bytes: Vec<String> = assembly.program.bytes()
                [line.offset as usize..line.offset as usize + line.len]
                .iter()
                .map(|byte| format!("{:02x}", byte))
                .collect();
            let text = instr.map_or_else(|| "???".to_string(), |instr| instr.to_string());
            self.print_str(&format!(
                "\x1b[2m{:>4}\x1b[0m  0x{:04x}  {:<8}  {}\n",
                line.line,
                CpuState::address_of(line.offset),
                bytes.join(" "),
                text
            ));
        }
        if assembly.labels.is_empty() {
            return;
        }
        self.print_str(&format!("\n\x1b[1mlabels\x1b[0m ({})\n", assembly.labels.len()));
        for (name, addr) in assembly.labels.iter() {
            self.print_str(&format!("  {:<12}  0x{:04x}\n", name, addr));
        }
    }

    /// Hex, unsigned and signed columns, then the byte as text.
    fn print_byte(&self, value: u8) {
        self.print_str(&format!("0x{:02x}  {:6}  {:6}     ", value, value, value as i8));
        self.print_str(&char_cell(value));
    }
}

/// Three columns wide. Control bytes use caret notation, bytes above ASCII are dimmed.
fn char_cell(value: u8) -> String {
    match value {
        b' ' => "SP ".to_string(),
        0x00..=0x1f => format!("^{} ", (value + 0x40) as char),
        0x7f => "^? ".to_string(),
        0x80.. => "\x1b[2m···\x1b[0m".to_string(),
        _ => format!("{:<3}", value as char),
    }
}

impl<'a> Decolored<'a> {
    pub fn new(string: &'a str) -> Self {
        Self {
            chars: string.chars(),
        }
    }
}

impl<'a> Iterator for Decolored<'a> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            // Skip everything between '\x1b' and 'm' (inclusive)
            if ch == '\x1b' {
                while self.chars.next().is_some_and(|ch| ch != 'm') {}
                continue;
            }
            return Some(ch);
        }
        None
    }
}

fn print_colorless(string: &str) {
    print!("{}", Decolored::new(string).collect::<String>());
}

fn eprint_colorless(string: &str) {
    eprint!("{}", Decolored::new(string).collect::<String>());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decolored() {
        assert_eq!(Decolored::new("abcdef").collect::<String>(), "abcdef");
        assert_eq!(
            Decolored::new("abc\x1b[0;2mdef\x1b[0m").collect::<String>(),
            "abcdef"
        );
        assert_eq!(Decolored::new("abc\x1b[0xyz").collect::<String>(), "abc");
        assert_eq!(
            Decolored::new("abc\x1bw[0bxyzmdef").collect::<String>(),
            "abcdef"
        );
    }

    #[test]
    fn byte_as_text() {
        assert_eq!(char_cell(b'A'), "A  ");
        assert_eq!(char_cell(b' '), "SP ");
        assert_eq!(char_cell(0x00), "^@ ");
        assert_eq!(char_cell(b'\n'), "^J ");
        assert_eq!(char_cell(0x1b), "^[ ");
        assert_eq!(char_cell(0x7f), "^? ");
        assert_eq!(Decolored::new(&char_cell(0xC8)).collect::<String>(), "···");
    }

    #[test]
    fn minimal_is_thread_local() {
        let previous = Output::set_minimal(true);
        assert!(Output::is_minimal());
        Output::set_minimal(previous);
        assert_eq!(Output::is_minimal(), previous);
    }
}
