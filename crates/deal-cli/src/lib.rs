//! # deal-cli
//!
//! `dealctl`, the operator front end for deal tokens.
//!
//! Provides commands for:
//! - Balance checks and keypair generation
//! - Minting, resuming a partial mint, and inspecting a token identity
//! - Transfers, secondary-market listing and purchase, redemption
//! - Offline redemption ticket issue and verification
//!
//! Every command renders the [`deal_token::OperationResult`] it gets back,
//! either as a table or verbatim as JSON.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format, TicketCommands};
pub use context::Context;
pub use error::CliError;
pub use output::OutputFormat;
