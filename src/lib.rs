pub mod constants;
pub mod fetch;
pub mod furnish;
pub mod intern;
pub mod kernel;
pub mod kinds;
pub mod metadata;
pub mod oracle;
pub mod registry;
pub mod rules;
pub mod select;
pub mod spicerack;
pub mod spicerack_errors;
pub mod time;
pub mod values;

pub use constants::{IdSet, NaifId, Request};
pub use intern::BasenameId;
pub use kernel::Kernel;
pub use kinds::Kind;
pub use spicerack::{KTuple, SpiceRack};
pub use spicerack_errors::{Result, SpiceRackError};
