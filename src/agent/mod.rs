//! Agent bootstrap: wires the tunnel, the dispatcher and the watch loop
//! together and supervises them until termination or shutdown.
mod agent;
mod builder;
mod signal;
pub use agent::*;
pub use builder::*;
pub use signal::*;
