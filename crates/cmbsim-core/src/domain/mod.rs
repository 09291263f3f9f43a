pub mod errors;

pub use errors::{SimError, SimErrorCategory, SimResult};
