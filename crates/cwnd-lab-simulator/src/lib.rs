pub mod cwnd;
pub mod kernel;
pub mod net;
pub mod sink;
pub mod socket;
pub mod trace;

pub use cwnd::WindowModel;
pub use kernel::Kernel;
pub use net::{Demux, DropHook, Packet, PointToPoint, RateErrorModel, TxOutcome, TxOutcomeFn};
pub use sink::{PacketSink, SinkHandle};
pub use socket::{CwndHook, TcpSocket, UdpSocket};
pub use trace::{MemoryWriter, RunReport, SinkTotal, TraceStream};
