// Generic bit-field access for NX registers.
//
// NX numbers bits from the left: bit 0 is the most significant bit of a
// 32-bit word. A field is declared by `(offset, width)` where `offset` is
// the MSB-numbered position of the field's rightmost bit, so the field's
// low bit sits at LSB position `31 - offset`. All words are stored
// big-endian regardless of the host.

// ---------------------------------------------------------------------------
// Bit packing
// ---------------------------------------------------------------------------

/// Mask of the `width` least significant bits. `width` may be 32.
#[inline]
pub const fn mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

/// Whether `(offset, width)` describes a field that fits in a 32-bit word.
#[inline]
pub const fn fits(offset: u32, width: u32) -> bool {
    width >= 1 && width <= 32 && offset <= 31 && width <= offset + 1
}

/// Extract the field `(offset, width)` from a host-order word.
#[inline]
pub const fn get_bits(word: u32, offset: u32, width: u32) -> u32 {
    debug_assert!(fits(offset, width));
    (word >> (31 - offset)) & mask(width)
}

/// Replace the field `(offset, width)` of a host-order word with `value`.
///
/// Exactly the `width` bits of the field are cleared before the new value
/// is OR-ed in; `value` is truncated to `width` bits and every bit outside
/// the field is preserved.
#[inline]
pub const fn put_bits(word: u32, offset: u32, width: u32, value: u32) -> u32 {
    debug_assert!(fits(offset, width));
    let shift = 31 - offset;
    let m = mask(width) << shift;
    (word & !m) | ((value & mask(width)) << shift)
}

// ---------------------------------------------------------------------------
// Big-endian words in a byte buffer
// ---------------------------------------------------------------------------

#[inline]
pub fn read_be32(buf: &[u8], byte: usize) -> u32 {
    let mut w = [0u8; 4];
    w.copy_from_slice(&buf[byte..byte + 4]);
    u32::from_be_bytes(w)
}

#[inline]
pub fn write_be32(buf: &mut [u8], byte: usize, value: u32) {
    buf[byte..byte + 4].copy_from_slice(&value.to_be_bytes());
}

#[inline]
pub fn read_be64(buf: &[u8], byte: usize) -> u64 {
    let mut w = [0u8; 8];
    w.copy_from_slice(&buf[byte..byte + 8]);
    u64::from_be_bytes(w)
}

#[inline]
pub fn write_be64(buf: &mut [u8], byte: usize, value: u64) {
    buf[byte..byte + 8].copy_from_slice(&value.to_be_bytes());
}

// ---------------------------------------------------------------------------
// Field descriptors
// ---------------------------------------------------------------------------

/// A register field: a bit range inside a big-endian 32-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Register name as used by the hardware manual.
    pub name: &'static str,
    /// Byte offset of the containing 32-bit word.
    pub byte: usize,
    /// MSB-numbered position of the field's rightmost bit.
    pub offset: u32,
    /// Field width in bits.
    pub width: u32,
}

impl Field {
    /// A field spanning a whole 32-bit word.
    pub const fn word(name: &'static str, byte: usize) -> Self {
        Self {
            name,
            byte,
            offset: 31,
            width: 32,
        }
    }

    pub const fn bits(name: &'static str, byte: usize, offset: u32, width: u32) -> Self {
        Self {
            name,
            byte,
            offset,
            width,
        }
    }

    /// Host-order mask of the field within its word.
    #[inline]
    pub const fn word_mask(&self) -> u32 {
        mask(self.width) << (31 - self.offset)
    }

    /// Largest value the field can hold.
    #[inline]
    pub const fn max(&self) -> u32 {
        mask(self.width)
    }
}

/// A 64-bit big-endian register (addresses).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field64 {
    pub name: &'static str,
    pub byte: usize,
}

impl Field64 {
    pub const fn new(name: &'static str, byte: usize) -> Self {
        Self { name, byte }
    }

    #[inline]
    pub fn get(&self, buf: &[u8]) -> u64 {
        read_be64(buf, self.byte)
    }

    #[inline]
    pub fn put(&self, buf: &mut [u8], value: u64) {
        write_be64(buf, self.byte, value);
    }
}

/// Read `field` from `buf`.
#[inline]
pub fn get(buf: &[u8], field: Field) -> u32 {
    get_bits(read_be32(buf, field.byte), field.offset, field.width)
}

/// Write `value` into `field` of `buf`, leaving the rest of the word alone.
#[inline]
pub fn put(buf: &mut [u8], field: Field, value: u32) {
    let word = read_be32(buf, field.byte);
    write_be32(
        buf,
        field.byte,
        put_bits(word, field.offset, field.width, value),
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
