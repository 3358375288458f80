//! Creative Factory CLI library.
//!
//! This crate provides the command-line surface for Creative Factory: argument
//! definitions plus the generate and operation-listing commands.

pub mod cli_args;
pub mod commands;
