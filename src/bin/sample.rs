//! Samples a synthetic payment stream and writes it out in the wire format.
//!
//! Timestamps drift forward with a configurable chance of landing behind the
//! newest one, so the stream exercises out-of-order admission and window
//! expiry in the consumer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use rand_pcg::Lcg64Xsh32;
use serde_json::json;
use structopt::StructOpt;

/// Generate a random payment stream over a pool of account names.
#[derive(Debug, StructOpt)]
#[structopt(name = "sample", about = "Sample a synthetic payment stream.")]
struct Opt {
    /// Output path for the stream.
    #[structopt(long)]
    out: PathBuf,

    /// Number of records to write.
    #[structopt(long)]
    nevents: usize,

    /// Number of distinct account names to draw from.
    #[structopt(long, default_value = "100")]
    nactors: u32,

    /// Chance in percent that a record is stamped behind the newest one,
    /// by up to 89 seconds (some of which is past the window entirely).
    #[structopt(long, default_value = "20")]
    late_percent: u32,

    /// Random sampling seed.
    #[structopt(long)]
    seed: u64,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    assert!(opt.nactors >= 2, "need at least two actors");
    assert!(opt.late_percent <= 100, "late-percent is a percentage");

    let mut rng = Lcg64Xsh32::new(0xcafef00dd15ea5e5, opt.seed);
    let file = File::create(&opt.out).with_context(|| format!("create {}", opt.out.display()))?;
    let mut writer = BufWriter::new(file);

    // 2016-04-07T00:00:00Z.
    let base = 1_459_987_200i64;
    let mut clock = base;
    let mut late = 0usize;

    let write_start = Instant::now();
    for _ in 0..opt.nevents {
        clock += rng.gen_range(0..3);
        let stamp = if rng.gen_range(0..100) < opt.late_percent {
            late += 1;
            clock - rng.gen_range(1..90)
        } else {
            clock
        };

        let actor = rng.gen_range(0..opt.nactors);
        let target = loop {
            let t = rng.gen_range(0..opt.nactors);
            if t != actor {
                break t;
            }
        };

        writeln!(
            writer,
            "{}",
            json!({
                "actor": format!("account-{}", actor),
                "target": format!("account-{}", target),
                "created_time": format_stamp(stamp),
            })
        )?;
    }
    writer.flush().context("flush stream")?;

    println!(
        "{}",
        json!({
            "nevents": opt.nevents,
            "nactors": opt.nactors,
            "late": late,
            "span_seconds": clock - base,
            "write_duration": format!("{:.0?}", Instant::now().duration_since(write_start)),
        })
    );

    Ok(())
}

fn format_stamp(t: i64) -> String {
    DateTime::<Utc>::from_timestamp(t, 0)
        .expect("in-range timestamp")
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}
