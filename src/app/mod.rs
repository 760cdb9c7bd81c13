//! Agent core boundary.
//!
//! The platform-independent vocabulary shared by the core components and
//! their adapters: inbound [`events`] and the [`ports`] the core drives.
//! Nothing here performs I/O.

pub mod events;
pub mod ports;
