//! `splash_sdk` — the core wire types shared by every Splash process: the
//! `Value` tagged union (spec.md §3), the universal serializer (§6.2) and the
//! Tree seed wire form (§6.3). No I/O and no threading live here; this crate
//! is the leaf of the dependency order in spec.md §2.

pub mod codec;
pub mod seed;
pub mod value;

pub use codec::{CodecError, CodecResult, Reader, Writer};
pub use seed::{seed_list_from_bytes, seed_list_to_bytes, Seed, Task};
pub use value::{Type, Value};

/// Timestamp helper shared by Tree leaves and BufferObjects: milliseconds
/// since the Unix epoch, matching the chrono-instant wire encoding of §6.2.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
