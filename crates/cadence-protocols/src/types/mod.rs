//! Task records shared by the scheduler and its collaborators.

mod definition;
mod envelope;
mod info;
mod request;

pub use definition::*;
pub use envelope::*;
pub use info::*;
pub use request::*;
