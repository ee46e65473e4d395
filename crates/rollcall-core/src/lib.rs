//! # Rollcall Core
//!
//! Shared vocabulary for the Rollcall workspace: configuration, the error type,
//! domain types (recipients, checkpoints, acknowledgments, exemptions) and the
//! collaborator traits the scheduler consumes.
//!
//! ```text
//! Clock ──────────┐
//! Directory ──────┼──> rollcall-scheduler (tick scanner + escalation engine)
//! DispatchGateway ┘
//! ```

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::RollcallConfig;
pub use error::{Result, RollcallError};
pub use traits::{Clock, Directory, DispatchGateway};
pub use types::{
    AckMethod, Acknowledgment, Checkpoint, DayOverride, Holiday, Leave, LeaveStatus, Moment,
    Recipient, Role,
};
