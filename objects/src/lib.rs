//! Attribute, Object, BufferObject and the type Factory (spec.md §4.1-§4.3,
//! §4.6): the typed graph a Root hosts and replicates.

pub mod attribute;
pub mod buffer_object;
pub mod factory;
pub mod object;

pub use attribute::{Attribute, SyncMode};
pub use buffer_object::{BufferObject, BufferPayload};
pub use factory::Factory;
pub use object::{Object, RenderingPriority};
