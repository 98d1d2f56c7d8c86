//! Slack interface for docket
//!
//! This crate turns Socket Mode traffic into agenda operations:
//! - **Socket Mode** (`socket`) - envelope loop with ack payloads and reconnect backoff
//! - **Commands** (`commands`) - `/additem`, `/remitem`, `/listitems`, `/clearitems`, `/update`, `/help`
//! - **Events** (`events`) - envelope parsing and dispatch to handlers
//! - **Modals** (`modals`) - add, remove and update dialogs and their submitted state
//! - **Block Kit** (`blocks`) - agenda, help and error messages
//!
//! # Architecture
//!
//! ```text
//! Socket frame → parse_socket_message → EventDispatcher → CommandRouter → AgendaCommandService
//!                                                              ↓
//!                      ack payload + Effects (messages, views) ← Response
//! ```
//!
//! The crate never talks to the Web API itself. Handlers return [`commands::Effect`]s and
//! the runner hands them to a [`socket::ResponseSink`] after acknowledging the envelope.

pub mod blocks;
pub mod commands;
pub mod events;
pub mod modals;
pub mod socket;

#[cfg(test)]
mod test_support;
