//! flamecheck core library: repeated CPU profiling, median run selection and
//! flamegraph comparison against the last stored profile.

mod aggregate;
mod config;
mod diff;
mod error;
mod flame;
mod fsutil;
mod handler;
mod probe;
mod profile;
mod sampler;
mod store;

pub use aggregate::*;
pub use config::*;
pub use diff::*;
pub use error::*;
pub use flame::*;
pub use fsutil::*;
pub use handler::*;
pub use probe::*;
pub use profile::*;
pub use sampler::*;
pub use store::*;
