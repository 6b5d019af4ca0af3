/// Condition flags of the 8080.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Flags {
    /// Sign
    pub s: bool,
    /// Zero
    pub z: bool,
    /// Auxiliary carry
    pub ac: bool,
    /// Parity (even)
    pub p: bool,
    /// Carry
    pub c: bool,
}

impl Flags {
    /// Flags for an arithmetic result. `raw` is the untruncated result, so anything above
    /// `0xFF` is a carry (or a borrow, for wrapping subtraction).
    pub fn from_result(raw: u16) -> Flags {
        let val = (raw & 0xFF) as u8;
        Flags {
            s: val & 0x80 != 0,
            z: val == 0,
            ac: aux_carry(val),
            p: parity(val),
            c: raw > 0xFF,
        }
    }

    /// Flags for a logic-family result. Carry is always reset.
    pub fn from_logic(val: u8) -> Flags {
        Flags {
            c: false,
            ..Flags::from_result(val as u16)
        }
    }

    /// Pack into the PSW flag byte: `S Z 0 AC 0 P 1 C`.
    pub fn to_byte(self) -> u8 {
        (self.s as u8) << 7
            | (self.z as u8) << 6
            | (self.ac as u8) << 4
            | (self.p as u8) << 2
            | 0b10
            | self.c as u8
    }

    pub fn from_byte(byte: u8) -> Flags {
        Flags {
            s: byte & 0x80 != 0,
            z: byte & 0x40 != 0,
            ac: byte & 0x10 != 0,
            p: byte & 0x04 != 0,
            c: byte & 0x01 != 0,
        }
    }
}

/// True when the number of set bits is even.
pub fn parity(val: u8) -> bool {
    val.count_ones() % 2 == 0
}

/// Approximation kept for parity with the reference simulator: set whenever the truncated
/// result exceeds 9, not on a carry out of bit 3.
fn aux_carry(val: u8) -> bool {
    val > 0x09
}

/// Split a word into its in-memory order, `[low, high]`.
pub fn split_word(word: u16) -> [u8; 2] {
    word.to_le_bytes()
}

/// Recombine two bytes read in memory order.
pub fn join_word(low: u8, high: u8) -> u16 {
    (high as u16) << 8 | low as u16
}
