//! Collaborator interfaces consumed by the scheduler.

pub mod clock;
pub mod directory;
pub mod dispatch;

pub use clock::Clock;
pub use directory::Directory;
pub use dispatch::DispatchGateway;
