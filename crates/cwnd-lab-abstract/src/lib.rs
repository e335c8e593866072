pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod rate;
pub mod time;
pub mod variant;

pub use config::{ScenarioConfig, ScenarioOverride};
pub use connection::Connection;
pub use context::{EventFn, EventHandle, SimContext};
pub use error::{ConnectionError, ParseError};
pub use rate::DataRate;
pub use time::SimTime;
pub use variant::{TcpVariant, WindowParams};
