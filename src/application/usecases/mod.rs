pub mod deliver_matches;
pub mod manage_watches;
pub mod poll_cycle;

pub use deliver_matches::*;
pub use manage_watches::*;
pub use poll_cycle::*;
