//! Streams a payment-record file and writes the rolling median vertex
//! degree of the 60-second window, one line per record.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use serde_json::json;
use structopt::StructOpt;

use medgraph::stream::{self, MedianStream};
use medgraph::{DegreeSummary, Scanner};

/// Reads newline-delimited JSON payment records and emits the current
/// median degree after each one.
#[derive(Debug, StructOpt)]
#[structopt(
    name = "medgraph",
    about = "Rolling median degree of the 60-second payment graph."
)]
struct Opt {
    /// Input file of newline-delimited JSON payment records.
    #[structopt(parse(from_os_str))]
    input: PathBuf,

    /// Output file receiving one two-decimal median per record.
    #[structopt(parse(from_os_str))]
    output: PathBuf,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let scanner = Scanner::new(opt.input);
    let mut stream = MedianStream::new();

    let process_start = Instant::now();
    let stats = stream::run(&mut stream, &scanner, &opt.output)?;
    println!(
        "{}",
        json!({
            "lines": stats.lines,
            "records": stats.records,
            "rejected": stats.rejected,
            "process_duration":
                format!("{:.0?}", Instant::now().duration_since(process_start)),
        })
    );

    let graph = stream.graph();
    println!(
        "{}",
        json!({
            "window_vertices": graph.vertex_count(),
            "window_edges": graph.edge_count(),
            "window_degrees": DegreeSummary::from(graph.degrees()).map(|s| s.to_map()),
        })
    );

    Ok(())
}
