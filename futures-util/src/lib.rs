//! Generic async primitives reused by the Link transport and Root
//! coordination layer (SPEC_FULL.md §10).

pub mod latest_channel;
pub mod oneshot_dispatcher;

pub use latest_channel::channel as latest_channel;
pub use oneshot_dispatcher::OneShotDispatcher;
