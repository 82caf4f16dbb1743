pub mod clock;
pub mod defaults;
pub mod error;
pub mod setup;
