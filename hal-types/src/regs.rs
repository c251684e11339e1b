pub const RNG_CTRL: usize = 0x0;
pub const RNG_STATUS: usize = 0x4;
pub const RNG_DATA: usize = 0x8;
pub const RNG_FF_THRESHOLD: usize = 0xc;

/// Enable rng.
pub const RNG_RBGEN: u32 = 0x1;
/// Double speed, less random mode.
pub const RNG_RBG2X: u32 = 0x2;
pub const RNG_DISABLE: u32 = 0x0;

pub const STATUS_WORDS_SHIFT: u32 = 24;
pub const STATUS_THRESHOLD_MASK: u32 = (1 << STATUS_WORDS_SHIFT) - 1;
