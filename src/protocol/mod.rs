//! Wire format shared by the room and fan nodes
//!
//! The room node encodes [`Reading`]s onto one fixed topic; the fan node
//! decodes them back into [`Payload`]s.

pub mod reading;
pub mod topics;

pub use reading::*;
pub use topics::*;
