//! Domain models for the pump tracker.

mod branch;
mod catalog;
mod event;
mod loan;
mod maintenance;

pub use branch::*;
pub use catalog::*;
pub use event::*;
pub use loan::*;
pub use maintenance::*;
