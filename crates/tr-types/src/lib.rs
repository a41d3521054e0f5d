pub mod config;
pub mod errors;
pub mod filters;
pub mod params;
pub mod session;

pub use config::*;
pub use errors::*;
pub use filters::*;
pub use params::*;
pub use session::*;
