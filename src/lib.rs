//! Stage signup — a chat bot that registers people into stages.
//!
//! Users redeem a one-time access code, pick a stage and submit a short
//! profile. An administrator can list every submission with a separate
//! secret. All state is in memory.

pub mod bot;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod registry;
