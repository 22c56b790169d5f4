//! Safe SQL builder: identifiers from config only, values as parameters.

mod builder;
pub mod dialect;
pub mod params;
pub use builder::*;
pub use dialect::*;
pub use params::*;
