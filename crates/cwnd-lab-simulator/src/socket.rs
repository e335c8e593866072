use crate::cwnd::WindowModel;
use crate::net::{Packet, PointToPoint, TxOutcome};
use bytes::Bytes;
use cwnd_lab_abstract::{Connection, ConnectionError, SimContext, WindowParams};
use std::cell::RefCell;
use std::net::SocketAddrV4;
use std::rc::Rc;

/// Congestion-window change notification: (old value, new value), fired
/// verbatim on every change.
pub type CwndHook = Box<dyn FnMut(&mut dyn SimContext, u32, u32)>;

struct TcpState {
    bound: bool,
    peer: Option<SocketAddrV4>,
    open: bool,
    window: WindowModel,
    bytes_sent: u64,
}

/// The rate-paced transport endpoint of the TCP flow.
///
/// Owns the congestion-window attribute; window updates are driven by the
/// transmission outcome of each segment as the link reports it back.
#[derive(Clone)]
pub struct TcpSocket {
    state: Rc<RefCell<TcpState>>,
    cwnd_hooks: Rc<RefCell<Vec<CwndHook>>>,
    link: PointToPoint,
}

impl TcpSocket {
    pub fn new(link: PointToPoint, params: WindowParams) -> Self {
        Self {
            state: Rc::new(RefCell::new(TcpState {
                bound: false,
                peer: None,
                open: true,
                window: WindowModel::new(params),
                bytes_sent: 0,
            })),
            cwnd_hooks: Rc::new(RefCell::new(Vec::new())),
            link,
        }
    }

    /// Registers a congestion-window change hook.
    pub fn trace_cwnd(&self, hook: CwndHook) {
        self.cwnd_hooks.borrow_mut().push(hook);
    }

    pub fn cwnd(&self) -> u32 {
        self.state.borrow().window.cwnd()
    }

    pub fn bytes_sent(&self) -> u64 {
        self.state.borrow().bytes_sent
    }
}

impl Connection for TcpSocket {
    fn bind(&mut self) -> Result<(), ConnectionError> {
        let mut s = self.state.borrow_mut();
        if !s.open {
            return Err(ConnectionError::Closed);
        }
        s.bound = true;
        Ok(())
    }

    fn connect_to(
        &mut self,
        _ctx: &mut dyn SimContext,
        peer: SocketAddrV4,
    ) -> Result<(), ConnectionError> {
        let mut s = self.state.borrow_mut();
        if !s.open {
            return Err(ConnectionError::Closed);
        }
        if !s.bound {
            return Err(ConnectionError::NotBound);
        }
        if s.peer.is_some() {
            return Err(ConnectionError::AlreadyConnected);
        }
        s.peer = Some(peer);
        Ok(())
    }

    fn send(&mut self, ctx: &mut dyn SimContext, payload: Bytes) -> Result<(), ConnectionError> {
        let peer = {
            let mut s = self.state.borrow_mut();
            if !s.open {
                return Err(ConnectionError::Closed);
            }
            let peer = s.peer.ok_or(ConnectionError::NotConnected)?;
            s.bytes_sent += payload.len() as u64;
            peer
        };

        let len = payload.len() as u32;
        let state = Rc::clone(&self.state);
        let hooks = Rc::clone(&self.cwnd_hooks);
        self.link.transmit(
            ctx,
            Packet::new(peer, payload),
            Some(Box::new(move |ctx, outcome| {
                let (old, new) = {
                    let mut s = state.borrow_mut();
                    let old = s.window.cwnd();
                    match outcome {
                        TxOutcome::Delivered => s.window.on_delivered(len),
                        TxOutcome::Dropped => s.window.on_loss(),
                    }
                    (old, s.window.cwnd())
                };
                if old != new {
                    let mut hooks = hooks.borrow_mut();
                    for hook in hooks.iter_mut() {
                        hook(ctx, old, new);
                    }
                }
            })),
        );
        Ok(())
    }

    fn close(&mut self, _ctx: &mut dyn SimContext) {
        self.state.borrow_mut().open = false;
    }
}

struct UdpState {
    bound: bool,
    peer: Option<SocketAddrV4>,
    open: bool,
    datagrams_sent: u64,
}

/// Connectionless endpoint used by the constant-bit-rate flows.
#[derive(Clone)]
pub struct UdpSocket {
    state: Rc<RefCell<UdpState>>,
    link: PointToPoint,
}

impl UdpSocket {
    pub fn new(link: PointToPoint) -> Self {
        Self {
            state: Rc::new(RefCell::new(UdpState {
                bound: false,
                peer: None,
                open: true,
                datagrams_sent: 0,
            })),
            link,
        }
    }

    pub fn datagrams_sent(&self) -> u64 {
        self.state.borrow().datagrams_sent
    }
}

impl Connection for UdpSocket {
    fn bind(&mut self) -> Result<(), ConnectionError> {
        let mut s = self.state.borrow_mut();
        if !s.open {
            return Err(ConnectionError::Closed);
        }
        s.bound = true;
        Ok(())
    }

    fn connect_to(
        &mut self,
        _ctx: &mut dyn SimContext,
        peer: SocketAddrV4,
    ) -> Result<(), ConnectionError> {
        let mut s = self.state.borrow_mut();
        if !s.open {
            return Err(ConnectionError::Closed);
        }
        if !s.bound {
            return Err(ConnectionError::NotBound);
        }
        s.peer = Some(peer);
        Ok(())
    }

    fn send(&mut self, ctx: &mut dyn SimContext, payload: Bytes) -> Result<(), ConnectionError> {
        let peer = {
            let mut s = self.state.borrow_mut();
            if !s.open {
                return Err(ConnectionError::Closed);
            }
            let peer = s.peer.ok_or(ConnectionError::NotConnected)?;
            s.datagrams_sent += 1;
            peer
        };
        self.link.transmit(ctx, Packet::new(peer, payload), None);
        Ok(())
    }

    fn close(&mut self, _ctx: &mut dyn SimContext) {
        self.state.borrow_mut().open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::{TcpSocket, UdpSocket};
    use crate::kernel::Kernel;
    use crate::net::{Demux, PointToPoint, RateErrorModel};
    use crate::sink::PacketSink;
    use bytes::Bytes;
    use cwnd_lab_abstract::{Connection, ConnectionError, DataRate, SimContext, SimTime, TcpVariant};
    use std::cell::RefCell;
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::rc::Rc;

    const PEER: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(10, 1, 1, 2), 8080);

    fn link_with_error(rate: f64) -> (PointToPoint, Rc<RefCell<PacketSink>>) {
        let sink = Rc::new(RefCell::new(PacketSink::new(8080)));
        let mut demux = Demux::new();
        demux.attach(sink.clone());
        let link = PointToPoint::new(
            DataRate::from_bps(1_000_000),
            SimTime::from_millis(10),
            19,
            RateErrorModel::new(rate, 1),
            Rc::new(RefCell::new(demux)),
        );
        (link, sink)
    }

    #[test]
    fn send_requires_bind_and_connect() {
        let (link, _sink) = link_with_error(0.0);
        let mut socket = TcpSocket::new(link, TcpVariant::NewReno.window_params(512));
        let mut kernel = Kernel::new();
        let ctx: &mut dyn SimContext = &mut kernel;

        assert_eq!(
            socket.send(ctx, Bytes::from_static(b"x")),
            Err(ConnectionError::NotConnected)
        );
        assert_eq!(socket.connect_to(ctx, PEER), Err(ConnectionError::NotBound));

        socket.bind().unwrap();
        socket.connect_to(ctx, PEER).unwrap();
        socket.send(ctx, Bytes::from_static(b"x")).unwrap();
        assert_eq!(socket.bytes_sent(), 1);
    }

    #[test]
    fn close_is_idempotent_and_rejects_further_sends() {
        let (link, _sink) = link_with_error(0.0);
        let mut socket = TcpSocket::new(link, TcpVariant::NewReno.window_params(512));
        let mut kernel = Kernel::new();
        let ctx: &mut dyn SimContext = &mut kernel;

        socket.bind().unwrap();
        socket.connect_to(ctx, PEER).unwrap();
        socket.close(ctx);
        socket.close(ctx);
        assert_eq!(
            socket.send(ctx, Bytes::from_static(b"x")),
            Err(ConnectionError::Closed)
        );
    }

    #[test]
    fn delivery_grows_the_window_and_fires_hooks() {
        let (link, sink) = link_with_error(0.0);
        let mut socket = TcpSocket::new(link, TcpVariant::NewReno.window_params(512));
        let changes = Rc::new(RefCell::new(Vec::new()));
        {
            let changes = changes.clone();
            socket.trace_cwnd(Box::new(move |_ctx, old, new| {
                changes.borrow_mut().push((old, new));
            }));
        }

        let mut kernel = Kernel::new();
        {
            let ctx: &mut dyn SimContext = &mut kernel;
            socket.bind().unwrap();
            socket.connect_to(ctx, PEER).unwrap();
            socket.send(ctx, Bytes::from(vec![0u8; 512])).unwrap();
        }
        kernel.run();

        assert_eq!(sink.borrow().total_rx(), 512);
        let changes = changes.borrow();
        assert_eq!(changes.len(), 1);
        let (old, new) = changes[0];
        assert!(new > old);
        assert_eq!(socket.cwnd(), new);
    }

    #[test]
    fn drop_applies_the_loss_response() {
        let (link, _sink) = link_with_error(1.0);
        let mut socket = TcpSocket::new(link, TcpVariant::Westwood.window_params(512));
        let changes = Rc::new(RefCell::new(Vec::new()));
        {
            let changes = changes.clone();
            socket.trace_cwnd(Box::new(move |_ctx, old, new| {
                changes.borrow_mut().push((old, new));
            }));
        }

        let mut kernel = Kernel::new();
        {
            let ctx: &mut dyn SimContext = &mut kernel;
            socket.bind().unwrap();
            socket.connect_to(ctx, PEER).unwrap();
            socket.send(ctx, Bytes::from(vec![0u8; 512])).unwrap();
        }
        kernel.run();

        let changes = changes.borrow();
        assert_eq!(changes.len(), 1);
        let (old, new) = changes[0];
        assert_eq!(old, 512);
        // From the minimum window the loss response lands on the 2-MSS floor.
        assert_eq!(new, 2 * 512);
        assert_eq!(socket.cwnd(), new);
    }

    #[test]
    fn udp_socket_counts_datagrams_and_delivers() {
        let (link, sink) = link_with_error(0.0);
        let mut socket = UdpSocket::new(link);
        let mut kernel = Kernel::new();
        {
            let ctx: &mut dyn SimContext = &mut kernel;
            socket.bind().unwrap();
            socket.connect_to(ctx, PEER).unwrap();
            socket.send(ctx, Bytes::from(vec![0u8; 1024])).unwrap();
            socket.send(ctx, Bytes::from(vec![0u8; 1024])).unwrap();
        }
        kernel.run();

        assert_eq!(socket.datagrams_sent(), 2);
        assert_eq!(sink.borrow().total_rx(), 2048);
    }
}
