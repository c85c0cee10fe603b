pub mod expo;
pub mod geocoding;

pub use expo::*;
pub use geocoding::*;
