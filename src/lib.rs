//! Ground-control link-multiplexing proxy: bridges one or more autopilot
//! links to any number of ground-side consumers.

pub mod axis;
pub mod battery;
pub mod cli;
pub mod codec;
pub mod engine;
pub mod error;
pub mod journal;
pub mod link;
pub mod link_delay;
pub mod logging;
pub mod operator;
pub mod override_rc;
pub mod params;
pub mod scheduler;
pub mod settings;
pub mod status;
pub mod transport;
pub mod waypoint;

pub use cli::Args;
pub use engine::{Engine, EngineConfig, OutputLink};
pub use error::EngineError;
pub use link::{Link, LinkSet};
pub use transport::{MasterUri, Transport};

/// The current version of the proxy.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
