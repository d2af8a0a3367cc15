//! Error types for the collaborator contracts.

mod buffer;
mod dispatch;
mod lock;
mod store;

pub use buffer::*;
pub use dispatch::*;
pub use lock::*;
pub use store::*;
