//! 16-bit opcode arithmetic.
//!
//! Each operation returns `(result, overflow)`. The result is always the
//! value masked to 16 bits; overflow only reports what was lost.

/// a + b; overflow on carry out of bit 15.
#[inline]
pub fn add(a: u16, b: u16) -> (u16, bool) {
    a.overflowing_add(b)
}

/// a - b; overflow on borrow.
#[inline]
pub fn sub(a: u16, b: u16) -> (u16, bool) {
    a.overflowing_sub(b)
}

/// a * b; overflow when the product needs more than 16 bits.
pub fn mul(a: u16, b: u16) -> (u16, bool) {
    let wide = u32::from(a) * u32::from(b);
    (wide as u16, wide > u32::from(u16::MAX))
}

/// Integer division. Dividing by zero yields 0 with overflow set.
pub fn div(a: u16, b: u16) -> (u16, bool) {
    match b {
        0 => (0, true),
        _ => (a / b, false),
    }
}

/// Remainder. A zero divisor yields 0; never overflows.
pub fn modulo(a: u16, b: u16) -> (u16, bool) {
    match b {
        0 => (0, false),
        _ => (a % b, false),
    }
}

/// a << b; overflow when any set bit leaves the top of the word.
pub fn shl(a: u16, b: u16) -> (u16, bool) {
    if b >= 16 {
        return (0, a != 0);
    }
    let wide = u32::from(a) << b;
    (wide as u16, wide > u32::from(u16::MAX))
}

/// a >> b; overflow when any set bit falls off the bottom of the word.
pub fn shr(a: u16, b: u16) -> (u16, bool) {
    if b >= 16 {
        return (0, a != 0);
    }
    let lost = a & ((1u16 << b) - 1);
    (a >> b, lost != 0)
}
