//! Command implementations for the Conduit CLI.

pub mod chat;
pub mod run;
pub mod setup;
