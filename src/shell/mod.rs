//! Toolkit-independent parts of the desktop shell.

pub mod opener;
pub mod session;
pub mod worker;
