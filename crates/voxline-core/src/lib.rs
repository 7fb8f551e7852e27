pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::VoxlineConfig;
pub use error::{Result, VoxlineError};
pub use types::*;
