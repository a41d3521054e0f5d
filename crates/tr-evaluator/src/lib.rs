pub mod adapter;
pub mod sim;

pub use adapter::*;
pub use sim::*;
