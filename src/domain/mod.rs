pub mod listing;
pub mod novelty;
pub mod watch;

pub use listing::*;
pub use novelty::*;
pub use watch::*;
