//! Receiver-side arrival log.
//!
//! Append-only text, one line per admission decision: `"<seq> D"` for a
//! drop or duplicate, `"<seq> B"` for a newly buffered packet, `"EOT"`
//! at termination. One sink handle is held for the lifetime of the
//! receive loop and flushed on every exit path.

use std::io::{self, Write};

/// One line of the arrival log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrivalEvent {
    /// Refused (out of window) or duplicate arrival.
    Dropped(u32),
    /// Newly admitted into the reorder buffer.
    Buffered(u32),
    /// Transfer terminated.
    Eot,
}

pub struct ArrivalLog<W: Write> {
    sink: W,
}

impl<W: Write> ArrivalLog<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn record(&mut self, event: ArrivalEvent) -> io::Result<()> {
        match event {
            ArrivalEvent::Dropped(seq) => writeln!(self.sink, "{seq} D"),
            ArrivalEvent::Buffered(seq) => writeln!(self.sink, "{seq} B"),
            ArrivalEvent::Eot => writeln!(self.sink, "EOT"),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_format_matches_the_contract() {
        let mut log = ArrivalLog::new(Vec::new());
        log.record(ArrivalEvent::Dropped(12)).unwrap();
        log.record(ArrivalEvent::Buffered(3)).unwrap();
        log.record(ArrivalEvent::Eot).unwrap();
        let text = String::from_utf8(log.into_inner()).unwrap();
        assert_eq!(text, "12 D\n3 B\nEOT\n");
    }
}
