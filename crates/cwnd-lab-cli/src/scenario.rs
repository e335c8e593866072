use crate::app::TrafficGenerator;
use crate::collect::{AggregateRxCollector, CwndCollector, DropCollector};
use anyhow::{Context, Result, ensure};
use cwnd_lab_abstract::{ScenarioConfig, SimContext, SimTime, TcpVariant};
use cwnd_lab_simulator::{
    Demux, Kernel, PacketSink, PointToPoint, RateErrorModel, RunReport, SinkHandle, SinkTotal,
    TcpSocket, TraceStream, UdpSocket,
};
use std::cell::RefCell;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::Path;
use std::rc::Rc;
use tracing::info;

const RECEIVER_ADDR: Ipv4Addr = Ipv4Addr::new(10, 1, 1, 2);

/// Builds the two-node topology, installs the flows and collectors, runs
/// the kernel to the configured stop time and writes the three trace
/// files (`<variant>_dropped`, `<variant>_cwnd`, `<variant>_total`) into
/// `out_dir`.
pub fn run(config: &ScenarioConfig, variant: TcpVariant, out_dir: &Path) -> Result<RunReport> {
    ensure!(
        config.cbr_start_secs.len() == config.cbr_stop_secs.len(),
        "cbr start/stop lists differ in length ({} vs {})",
        config.cbr_start_secs.len(),
        config.cbr_stop_secs.len(),
    );

    let mut kernel = Kernel::new();

    // Receiver side: one TCP sink plus one sink per CBR flow.
    let mut demux = Demux::new();
    let tcp_sink: SinkHandle = Rc::new(RefCell::new(PacketSink::new(config.tcp_port)));
    demux.attach(Rc::clone(&tcp_sink));
    let mut cbr_sinks: Vec<SinkHandle> = Vec::new();
    for i in 0..config.cbr_start_secs.len() {
        let sink: SinkHandle = Rc::new(RefCell::new(PacketSink::new(
            config.cbr_base_port + i as u16,
        )));
        demux.attach(Rc::clone(&sink));
        cbr_sinks.push(sink);
    }

    let link = PointToPoint::new(
        config.link_rate,
        config.link_delay(),
        config.queue_limit_pkts,
        RateErrorModel::new(config.error_rate, config.seed),
        Rc::new(RefCell::new(demux)),
    );

    let dropped_stream = trace_file(out_dir, variant, "dropped")?;
    let cwnd_stream = trace_file(out_dir, variant, "cwnd")?;
    let total_stream = trace_file(out_dir, variant, "total")?;

    let drop_collector = DropCollector::install(&link, Rc::clone(&dropped_stream));

    // The TCP flow's socket is created before activation so the window
    // trace is hooked from the very first change.
    let tcp_socket = TcpSocket::new(
        link.clone(),
        variant.window_params(config.tcp_packet_size),
    );
    let cwnd_collector = CwndCollector::install(&tcp_socket, Rc::clone(&cwnd_stream));

    let tcp_app = TrafficGenerator::new(
        Box::new(tcp_socket.clone()),
        SocketAddrV4::new(RECEIVER_ADDR, config.tcp_port),
        config.tcp_packet_size,
        config.tcp_packet_count,
        config.tcp_rate,
    );
    schedule_window(&mut kernel, &tcp_app, SimTime::ZERO, config.stop_time());

    // Five staggered CBR flows; an unbounded budget leaves their stop
    // times in charge.
    for (i, (start, stop)) in config.cbr_windows().enumerate() {
        let app = TrafficGenerator::new(
            Box::new(UdpSocket::new(link.clone())),
            SocketAddrV4::new(RECEIVER_ADDR, config.cbr_base_port + i as u16),
            config.cbr_packet_size,
            u32::MAX,
            config.cbr_rate,
        );
        schedule_window(&mut kernel, &app, start, stop);
    }

    let mut sinks = vec![Rc::clone(&tcp_sink)];
    sinks.extend(cbr_sinks.iter().cloned());
    let aggregate = {
        let ctx: &mut dyn SimContext = &mut kernel;
        AggregateRxCollector::install(
            ctx,
            sinks.clone(),
            Rc::clone(&total_stream),
            config.sample_offset(),
            config.sample_period(),
        )
    };

    info!(variant = %variant, stop_secs = config.stop_secs, "running scenario");
    kernel.run_until(config.stop_time());

    for stream in [&dropped_stream, &cwnd_stream, &total_stream] {
        stream
            .borrow_mut()
            .flush()
            .context("flushing trace file")?;
    }

    let sink_totals = sinks
        .iter()
        .map(|s| {
            let s = s.borrow();
            SinkTotal {
                port: s.port(),
                total_rx_bytes: s.total_rx(),
            }
        })
        .collect();

    Ok(RunReport {
        variant: variant.name().to_string(),
        config: config.clone(),
        duration_secs: kernel.now().as_secs_f64(),
        tcp_packets_sent: tcp_app.packets_sent(),
        rx_drops: drop_collector.drops(),
        queue_drops: link.queue_drops(),
        cwnd_changes: cwnd_collector.changes(),
        aggregate_rx_bytes: aggregate.total(),
        sinks: sink_totals,
    })
}

fn trace_file(
    out_dir: &Path,
    variant: TcpVariant,
    suffix: &str,
) -> Result<Rc<RefCell<TraceStream>>> {
    let path = out_dir.join(format!("{variant}_{suffix}"));
    let stream = TraceStream::create(&path)
        .with_context(|| format!("creating trace file {}", path.display()))?;
    Ok(stream.into_shared())
}

fn schedule_window(kernel: &mut Kernel, app: &TrafficGenerator, start: SimTime, stop: SimTime) {
    let ctx: &mut dyn SimContext = kernel;
    {
        let app = app.clone();
        ctx.schedule(start, move |ctx| {
            if let Err(error) = app.start(ctx) {
                tracing::warn!(%error, "traffic generator failed to start");
            }
        });
    }
    let app = app.clone();
    ctx.schedule(stop, move |ctx| app.stop(ctx));
}

#[cfg(test)]
mod tests {
    use super::run;
    use cwnd_lab_abstract::{DataRate, ScenarioConfig, TcpVariant};
    use std::fs;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cwnd-lab-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn parse_records(path: &PathBuf) -> Vec<Vec<f64>> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| {
                line.split_whitespace()
                    .map(|field| field.parse().unwrap())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn default_run_writes_all_three_traces() {
        let dir = scratch_dir("default");
        let config = ScenarioConfig::default();
        let report = run(&config, TcpVariant::Westwood, &dir).unwrap();

        // Stopped at 1.8 s, not by the 1000-packet budget: the first
        // payload leaves at activation, then one every 4.096 ms.
        assert_eq!(report.tcp_packets_sent, 440);
        assert_eq!(report.duration_secs, 1.8);

        let totals = parse_records(&dir.join("TcpWestwood_total"));
        assert!(totals.len() > 1000);
        let values: Vec<f64> = totals.iter().map(|r| r[1]).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        // Deliveries may still land between the last sample and the stop.
        assert!(*values.last().unwrap() as u64 <= report.aggregate_rx_bytes);
        assert!(report.aggregate_rx_bytes > 0);

        let cwnd = parse_records(&dir.join("TcpWestwood_cwnd"));
        assert_eq!(cwnd.len() as u64, report.cwnd_changes);
        assert!(cwnd.iter().all(|r| r.len() == 3));

        let dropped = parse_records(&dir.join("TcpWestwood_dropped"));
        assert_eq!(dropped.len() as u64, report.rx_drops);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn small_budget_terminates_by_exhaustion() {
        let dir = scratch_dir("budget");
        let config = ScenarioConfig {
            tcp_packet_size: 100,
            tcp_packet_count: 5,
            tcp_rate: DataRate::from_bps(100),
            stop_secs: 60.0,
            error_rate: 0.0,
            cbr_start_secs: vec![],
            cbr_stop_secs: vec![],
            sample_period_us: 1_000_000,
            ..ScenarioConfig::default()
        };
        let report = run(&config, TcpVariant::NewReno, &dir).unwrap();

        // Five sends 8 s apart (0, 8, 16, 24, 32), all inside the stop.
        assert_eq!(report.tcp_packets_sent, 5);
        assert_eq!(report.rx_drops, 0);
        let tcp_total: u64 = report
            .sinks
            .iter()
            .map(|s| s.total_rx_bytes)
            .sum();
        assert_eq!(tcp_total, 500);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn mismatched_cbr_windows_are_rejected() {
        let dir = scratch_dir("mismatch");
        let config = ScenarioConfig {
            cbr_start_secs: vec![0.2],
            cbr_stop_secs: vec![],
            ..ScenarioConfig::default()
        };
        assert!(run(&config, TcpVariant::Vegas, &dir).is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
