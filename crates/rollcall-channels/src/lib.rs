//! # Rollcall Channels
//! Dispatch gateway implementations.
//!
//! - [`whatsapp::WhatsAppGateway`]: WhatsApp Business Cloud API
//! - [`memory::MemoryGateway`]: in-memory outbox for dry runs and tests

pub mod memory;
pub mod whatsapp;

pub use memory::{MemoryGateway, SentMessage};
pub use whatsapp::WhatsAppGateway;
