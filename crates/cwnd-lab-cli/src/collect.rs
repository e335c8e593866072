use cwnd_lab_abstract::{SimContext, SimTime};
use cwnd_lab_simulator::{PointToPoint, SinkHandle, TcpSocket, TraceStream};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::warn;

fn write_record(stream: &Rc<RefCell<TraceStream>>, record: fmt::Arguments<'_>) {
    if let Err(error) = stream.borrow_mut().line(record) {
        warn!(%error, "trace write failed");
    }
}

/// Counts device drop notifications and appends
/// `(time, cumulative_count)` per drop. Every notification is recorded
/// exactly once.
pub struct DropCollector {
    drops: Rc<Cell<u64>>,
}

impl DropCollector {
    pub fn install(link: &PointToPoint, stream: Rc<RefCell<TraceStream>>) -> Self {
        let drops = Rc::new(Cell::new(0));
        let counter = Rc::clone(&drops);
        link.trace_rx_drop(Box::new(move |ctx, _packet| {
            let n = counter.get() + 1;
            counter.set(n);
            write_record(&stream, format_args!("{} {}", ctx.now().as_secs_f64(), n));
        }));
        Self { drops }
    }

    pub fn drops(&self) -> u64 {
        self.drops.get()
    }
}

/// Appends `(time, old, new)` verbatim on every congestion-window
/// change. No smoothing, no sampling.
pub struct CwndCollector {
    changes: Rc<Cell<u64>>,
}

impl CwndCollector {
    pub fn install(socket: &TcpSocket, stream: Rc<RefCell<TraceStream>>) -> Self {
        let changes = Rc::new(Cell::new(0));
        let counter = Rc::clone(&changes);
        socket.trace_cwnd(Box::new(move |ctx, old, new| {
            counter.set(counter.get() + 1);
            write_record(
                &stream,
                format_args!("{}\t{}\t{}", ctx.now().as_secs_f64(), old, new),
            );
        }));
        Self { changes }
    }

    pub fn changes(&self) -> u64 {
        self.changes.get()
    }
}

struct Sampler {
    sinks: Vec<SinkHandle>,
    stream: Rc<RefCell<TraceStream>>,
    period: SimTime,
}

impl Sampler {
    fn sample(self: &Rc<Self>, ctx: &mut dyn SimContext) {
        let total: u64 = self.sinks.iter().map(|s| s.borrow().total_rx()).sum();
        write_record(
            &self.stream,
            format_args!("{} {}", ctx.now().as_secs_f64(), total),
        );
        let next = Rc::clone(self);
        ctx.schedule(self.period, move |ctx| next.sample(ctx));
    }
}

/// Periodic sampler of the aggregate received-byte count across all
/// sinks. Reschedules itself each tick; the kernel loop is iterative, so
/// the chain costs no stack depth, and the run's stop time is the only
/// thing that ends it.
pub struct AggregateRxCollector {
    sampler: Rc<Sampler>,
}

impl AggregateRxCollector {
    pub fn install(
        ctx: &mut dyn SimContext,
        sinks: Vec<SinkHandle>,
        stream: Rc<RefCell<TraceStream>>,
        offset: SimTime,
        period: SimTime,
    ) -> Self {
        let sampler = Rc::new(Sampler {
            sinks,
            stream,
            period,
        });
        let first = Rc::clone(&sampler);
        ctx.schedule(offset, move |ctx| first.sample(ctx));
        Self { sampler }
    }

    /// The aggregate at this moment, recomputed from the sinks.
    pub fn total(&self) -> u64 {
        self.sampler.sinks.iter().map(|s| s.borrow().total_rx()).sum()
    }
}
