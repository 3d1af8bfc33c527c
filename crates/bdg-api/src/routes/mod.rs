//! # Route Modules
//!
//! Each module defines an Axum Router for one API surface area.
//! Routers are merged into the application in [`crate::app`].

pub mod keys;
pub mod signing;
pub mod status;
pub mod verify;
