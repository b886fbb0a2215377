//! Cooperate feature flags.
//!
//! Flags live in a `u32` bitmask on the engine context and are changed
//! through `UpdateCooperateFlag` events carrying a mask and the requested
//! bits.

/// Keep the pointer hidden while this device receives remote input.
pub const COOPERATE_FLAG_HIDE_CURSOR: u32 = 0x1;

/// Freeze the pointer in place while this device receives remote input.
pub const COOPERATE_FLAG_FREEZE_CURSOR: u32 = 0x2;

/// Bits that flip when `requested` is applied to `current` under `mask`.
#[must_use]
pub fn changed_bits(mask: u32, current: u32, requested: u32) -> u32 {
    mask & (current ^ requested)
}

/// Apply `requested` to `current` for the bits selected by `mask`.
#[must_use]
pub fn apply(mask: u32, current: u32, requested: u32) -> u32 {
    (current & !mask) | (requested & mask)
}
