//! tubegrab - command line and HTTP front ends over `tubecore`
//!
//! - `cli`: argument definitions
//! - `commands`: CLI subcommands
//! - `web_server`: the axum HTTP API

pub mod cli;
pub mod commands;
pub mod web_server;
