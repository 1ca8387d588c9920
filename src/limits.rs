//! Hard input limits, checked at mutation entry points.

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_ROOM_TYPES: usize = 10_000;
pub const MAX_ROOMS_PER_TYPE: usize = 1_000;
pub const MAX_RESERVATIONS_PER_TYPE: usize = 100_000;
pub const MAX_BLOCKS_PER_TYPE: usize = 10_000;
/// Nightly rate cap, in minor currency units. Keeps the price arithmetic
/// (rate × multiplier × children × nights) far below i64 overflow.
pub const MAX_RATE: i64 = 100_000_000;
/// Child supplement percentage cap.
pub const MAX_CHILD_MULTIPLIER: u32 = 1_000;
