pub mod app;
pub mod collect;
pub mod scenario;

pub use app::TrafficGenerator;
pub use collect::{AggregateRxCollector, CwndCollector, DropCollector};
