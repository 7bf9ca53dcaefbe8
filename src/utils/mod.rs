pub mod constants;
pub mod helpers;
pub mod progress;

pub use constants::*;
pub use helpers::*;
