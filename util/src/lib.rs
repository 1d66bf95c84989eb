//! Ambient stack shared by every other Splash crate: error codes (§7), the
//! reentrant-safe mutex backing the Tree's structure lock (§5), logging
//! bring-up, thread naming and the signal-driven shutdown ceremony.

pub mod error;
pub mod logging;
pub mod reentrant_safe_mutex;
pub mod thread;
pub mod version;

pub use error::{ErrExt, ErrorCode, SplashError, SplashResult};
pub use reentrant_safe_mutex::{ReentrantSafeMutex, ReentrantSafeMutexGuard};
