use crate::sink::SinkHandle;
use bytes::Bytes;
use cwnd_lab_abstract::{DataRate, SimContext, SimTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::collections::HashMap;
use std::net::SocketAddrV4;
use std::rc::Rc;
use tracing::debug;

/// One payload in flight between the two nodes.
#[derive(Debug, Clone)]
pub struct Packet {
    pub dst: SocketAddrV4,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(dst: SocketAddrV4, payload: Bytes) -> Self {
        Self { dst, payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// What happened to a transmitted packet, reported back to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Delivered,
    Dropped,
}

pub type TxOutcomeFn = Box<dyn FnOnce(&mut dyn SimContext, TxOutcome)>;
pub type DropHook = Box<dyn FnMut(&mut dyn SimContext, &Packet)>;

/// Per-packet receive error model, seeded for reproducible runs.
pub struct RateErrorModel {
    rate: f64,
    rng: StdRng,
}

impl RateErrorModel {
    pub fn new(rate: f64, seed: u64) -> Self {
        Self {
            rate,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn hit(&mut self) -> bool {
        self.rate > 0.0 && self.rng.random::<f64>() < self.rate
    }
}

/// Receive-side demultiplexer routing payloads to sinks by port.
#[derive(Default)]
pub struct Demux {
    sinks: HashMap<u16, SinkHandle>,
}

impl Demux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, sink: SinkHandle) {
        let port = sink.borrow().port();
        self.sinks.insert(port, sink);
    }

    pub fn deliver(&self, packet: &Packet) {
        match self.sinks.get(&packet.dst.port()) {
            Some(sink) => sink.borrow_mut().rx(packet.len() as u64),
            None => debug!(port = packet.dst.port(), "no sink listening, payload discarded"),
        }
    }
}

struct LinkState {
    rate: DataRate,
    delay: SimTime,
    queue_limit: usize,
    queued: usize,
    busy_until: SimTime,
    error: RateErrorModel,
    rx_drops: u64,
    queue_drops: u64,
}

/// The point-to-point link: a serializing transmitter behind a bounded
/// drop-tail queue, a fixed propagation delay, and a receive-side error
/// model whose drops feed the device drop notification.
#[derive(Clone)]
pub struct PointToPoint {
    state: Rc<RefCell<LinkState>>,
    drop_hooks: Rc<RefCell<Vec<DropHook>>>,
    demux: Rc<RefCell<Demux>>,
}

impl PointToPoint {
    pub fn new(
        rate: DataRate,
        delay: SimTime,
        queue_limit: usize,
        error: RateErrorModel,
        demux: Rc<RefCell<Demux>>,
    ) -> Self {
        Self {
            state: Rc::new(RefCell::new(LinkState {
                rate,
                delay,
                queue_limit,
                queued: 0,
                busy_until: SimTime::ZERO,
                error,
                rx_drops: 0,
                queue_drops: 0,
            })),
            drop_hooks: Rc::new(RefCell::new(Vec::new())),
            demux,
        }
    }

    /// Registers a receive-drop notification hook. Hooks fire once per
    /// dropped packet, in registration order.
    pub fn trace_rx_drop(&self, hook: DropHook) {
        self.drop_hooks.borrow_mut().push(hook);
    }

    pub fn rx_drops(&self) -> u64 {
        self.state.borrow().rx_drops
    }

    pub fn queue_drops(&self) -> u64 {
        self.state.borrow().queue_drops
    }

    /// Puts a packet on the wire. The queue admits a bounded backlog;
    /// overflow drops happen here at the sender and are not part of the
    /// receive-drop trace. `outcome`, if given, is invoked exactly once.
    pub fn transmit(&self, ctx: &mut dyn SimContext, packet: Packet, outcome: Option<TxOutcomeFn>) {
        let (depart_delay, arrive_delay) = {
            let mut s = self.state.borrow_mut();
            if s.queued >= s.queue_limit {
                s.queue_drops += 1;
                debug!(len = packet.len(), "drop-tail queue full, packet dropped");
                drop(s);
                if let Some(done) = outcome {
                    done(ctx, TxOutcome::Dropped);
                }
                return;
            }
            s.queued += 1;
            let now = ctx.now();
            let start = s.busy_until.max(now);
            s.busy_until = start + s.rate.transmit_time(packet.len() as u32);
            (s.busy_until - now, s.busy_until - now + s.delay)
        };

        let state = Rc::clone(&self.state);
        ctx.schedule(depart_delay, move |_ctx| {
            state.borrow_mut().queued -= 1;
        });

        let state = Rc::clone(&self.state);
        let drop_hooks = Rc::clone(&self.drop_hooks);
        let demux = Rc::clone(&self.demux);
        ctx.schedule(arrive_delay, move |ctx| {
            if state.borrow_mut().error.hit() {
                state.borrow_mut().rx_drops += 1;
                debug!(len = packet.len(), "receive error, packet dropped");
                {
                    let mut hooks = drop_hooks.borrow_mut();
                    for hook in hooks.iter_mut() {
                        hook(ctx, &packet);
                    }
                }
                if let Some(done) = outcome {
                    done(ctx, TxOutcome::Dropped);
                }
            } else {
                demux.borrow().deliver(&packet);
                if let Some(done) = outcome {
                    done(ctx, TxOutcome::Delivered);
                }
            }
        });
    }
}
