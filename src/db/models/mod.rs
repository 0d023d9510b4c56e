//! Database models split into domain-specific modules.

pub mod competition;
pub mod content;
pub mod order;
pub mod stats;
pub mod user;
pub mod winner;

pub use competition::*;
pub use content::*;
pub use order::*;
pub use stats::*;
pub use user::*;
pub use winner::*;
