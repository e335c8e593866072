use cwnd_lab_abstract::ScenarioConfig;
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

/// Append-only ASCII trace sink: one record per line, fields separated by
/// whitespace.
pub struct TraceStream {
    out: Box<dyn Write>,
}

impl TraceStream {
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self {
            out: Box::new(BufWriter::new(File::create(path)?)),
        })
    }

    pub fn to_writer(out: Box<dyn Write>) -> Self {
        Self { out }
    }

    pub fn into_shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    pub fn line(&mut self, record: fmt::Arguments<'_>) -> io::Result<()> {
        self.out.write_fmt(record)?;
        self.out.write_all(b"\n")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Drop for TraceStream {
    fn drop(&mut self) {
        let _ = self.out.flush();
    }
}

/// In-memory `Write` target, shared so tests can read back what a
/// collector wrote.
#[derive(Clone, Default)]
pub struct MemoryWriter(Rc<RefCell<Vec<u8>>>);

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Cumulative received bytes of one sink at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SinkTotal {
    pub port: u16,
    pub total_rx_bytes: u64,
}

/// A serializable snapshot of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub variant: String,
    pub config: ScenarioConfig,
    pub duration_secs: f64,
    pub tcp_packets_sent: u32,
    pub rx_drops: u64,
    pub queue_drops: u64,
    pub cwnd_changes: u64,
    pub aggregate_rx_bytes: u64,
    pub sinks: Vec<SinkTotal>,
}

#[cfg(test)]
mod tests {
    use super::{MemoryWriter, TraceStream};

    #[test]
    fn lines_are_whitespace_separated_records() {
        let buffer = MemoryWriter::new();
        let mut stream = TraceStream::to_writer(Box::new(buffer.clone()));
        stream.line(format_args!("{} {}", 0.5, 3)).unwrap();
        stream.line(format_args!("{}\t{}\t{}", 0.6, 512, 1024)).unwrap();
        stream.flush().unwrap();

        assert_eq!(buffer.contents(), "0.5 3\n0.6\t512\t1024\n");
    }
}
