pub mod listing;
pub mod proxy;

pub use listing::*;
pub use proxy::*;
