//! Core types for the Parley interaction service
//!
//! This crate holds everything the other layers agree on and nothing that
//! performs I/O:
//! - **Configuration** (`config`) - layered file/env/override loading
//! - **Inbound model** (`interaction`) - typed interaction payloads
//! - **Outbound model** (`response`) - messages, embeds, components, modals
//! - **Custom ids** (`custom_id`) - routing name + arguments smuggled
//!   through component custom-id strings
//!
//! # Key Types
//!
//! - `AppConfig` - process configuration, read once at startup
//! - `Interaction` - one inbound webhook call, immutable after parsing
//! - `InteractionResponse` - one outgoing response unit
//! - `CustomId` - stable `name?arg1&arg2` encoding

pub mod config;
pub mod custom_id;
pub mod interaction;
pub mod response;
