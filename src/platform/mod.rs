//! # Platform Collaborators
//!
//! Concrete implementations of the probe interfaces for the host the console
//! runs on.

pub mod systemctl;

pub use systemctl::SystemctlServiceControl;
