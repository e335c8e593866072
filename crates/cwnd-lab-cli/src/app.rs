use bytes::Bytes;
use cwnd_lab_abstract::{Connection, ConnectionError, DataRate, EventHandle, SimContext};
use std::cell::RefCell;
use std::net::SocketAddrV4;
use std::rc::Rc;
use tracing::debug;

struct Generator {
    conn: Box<dyn Connection>,
    peer: SocketAddrV4,
    packet_size: u32,
    packet_count: u32,
    rate: DataRate,
    packets_sent: u32,
    send_event: Option<EventHandle>,
    running: bool,
}

/// Open-loop traffic source: transmits up to `packet_count` fixed-size
/// payloads at a deterministic inter-send interval derived from `rate`,
/// independent of any feedback from the receiver.
///
/// At most one send event is pending at any time. Exhausting the budget
/// quietly stops scheduling; only `stop` clears the running flag and
/// closes the connection.
#[derive(Clone)]
pub struct TrafficGenerator {
    inner: Rc<RefCell<Generator>>,
}

impl TrafficGenerator {
    /// Stores the parameters. No side effects until `start`.
    pub fn new(
        conn: Box<dyn Connection>,
        peer: SocketAddrV4,
        packet_size: u32,
        packet_count: u32,
        rate: DataRate,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Generator {
                conn,
                peer,
                packet_size,
                packet_count,
                rate,
                packets_sent: 0,
                send_event: None,
                running: false,
            })),
        }
    }

    /// Activates the generator: binds and connects the underlying
    /// connection and sends the first payload immediately.
    pub fn start(&self, ctx: &mut dyn SimContext) -> Result<(), ConnectionError> {
        {
            let mut g = self.inner.borrow_mut();
            g.packets_sent = 0;
            g.running = true;
            g.conn.bind()?;
            let peer = g.peer;
            g.conn.connect_to(ctx, peer)?;
        }
        self.send_packet(ctx);
        Ok(())
    }

    /// Deactivates the generator: cancels the pending send event if one
    /// exists and closes the connection. Safe to call more than once.
    pub fn stop(&self, ctx: &mut dyn SimContext) {
        let mut g = self.inner.borrow_mut();
        g.running = false;
        if let Some(handle) = g.send_event.take() {
            ctx.cancel(handle);
        }
        g.conn.close(ctx);
    }

    pub fn packets_sent(&self) -> u32 {
        self.inner.borrow().packets_sent
    }

    pub fn is_running(&self) -> bool {
        self.inner.borrow().running
    }

    fn send_packet(&self, ctx: &mut dyn SimContext) {
        let exhausted = {
            let mut g = self.inner.borrow_mut();
            g.send_event = None;
            if g.packets_sent >= g.packet_count {
                return;
            }
            let payload = Bytes::from(vec![0u8; g.packet_size as usize]);
            if let Err(error) = g.conn.send(ctx, payload) {
                debug!(%error, "payload send failed");
            }
            g.packets_sent += 1;
            g.packets_sent >= g.packet_count
        };
        if !exhausted {
            self.schedule_tx(ctx);
        }
    }

    fn schedule_tx(&self, ctx: &mut dyn SimContext) {
        let mut g = self.inner.borrow_mut();
        // A stop may land between a send and this call; never schedule
        // past it.
        if !g.running {
            return;
        }
        let delay = g.rate.transmit_time(g.packet_size);
        let this = self.clone();
        g.send_event = Some(ctx.schedule(delay, move |ctx| this.send_packet(ctx)));
    }
}
