//! Record decoding and the streaming median sink.
//!
//! Each input line is a JSON object with at least `actor`, `target`, and
//! `created_time` (`YYYY-MM-DDTHH:MM:SSZ`, UTC). Lines that fail to decode
//! are dropped without producing output; every decoded record is handed to
//! the graph and answered with one two-decimal median line.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::scanner::Scanner;
use crate::window::WindowGraph;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A validated payment record: two non-empty account names and an epoch
/// timestamp at second resolution.
#[derive(Debug, PartialEq, Eq)]
pub struct Event {
    pub actor: String,
    pub target: String,
    pub timestamp: i64,
}

#[derive(Deserialize)]
struct Record {
    actor: String,
    target: String,
    created_time: String,
}

/// Decode one line into an [`Event`], or `None` for anything malformed:
/// invalid JSON, a missing or empty field, or an unparseable timestamp.
pub fn decode(line: &[u8]) -> Option<Event> {
    let record: Record = serde_json::from_slice(line).ok()?;
    if record.actor.is_empty() || record.target.is_empty() {
        return None;
    }
    let timestamp = parse_timestamp(&record.created_time)?;
    Some(Event {
        actor: record.actor,
        target: record.target,
        timestamp,
    })
}

fn parse_timestamp(text: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(text, TIME_FORMAT)
        .ok()
        .map(|datetime| datetime.and_utc().timestamp())
}

/// The one entry point the I/O layer talks to: feed an event, get the
/// median degree back.
#[derive(Default)]
pub struct MedianStream {
    graph: WindowGraph,
}

impl MedianStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, actor: &str, target: &str, timestamp: i64) -> f64 {
        self.graph.observe(actor, target, timestamp)
    }

    pub fn graph(&self) -> &WindowGraph {
        &self.graph
    }
}

/// Counters for one processing run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunStats {
    /// Lines read from the input.
    pub lines: u64,
    /// Lines that decoded into a record and produced an output line.
    pub records: u64,
    /// Lines dropped by the decoder.
    pub rejected: u64,
}

/// Stream every record in the scanned file through `stream`, writing one
/// median per record to `output`.
pub fn run(stream: &mut MedianStream, scanner: &Scanner, output: &Path) -> Result<RunStats> {
    let mut stats = RunStats::default();
    scanner.for_each_sink(output, |line, out| {
        stats.lines += 1;
        match decode(line) {
            Some(event) => {
                stats.records += 1;
                let median = stream.observe(&event.actor, &event.target, event.timestamp);
                writeln!(out, "{:.2}", median)?;
            }
            None => stats.rejected += 1,
        }
        Ok(())
    })?;
    Ok(stats)
}
