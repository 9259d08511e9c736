//! Offline log analysis
//!
//! Reads the lines written by the [`logging`](crate::logging) sink and turns
//! them into run-level throughput figures. Lines are grouped into buckets of
//! one second: a bucket closes at the first line stamped at least one second
//! after the bucket's first line. That closing line opens the next bucket and
//! its event is counted there rather than discarded, so no sent or dropped
//! request goes missing at a bucket edge. The last, incomplete bucket is not
//! counted.

use crate::logging::FIELD_SEPARATOR;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

const BUCKET: Duration = Duration::from_secs(1);

/// Aggregates over a whole run
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Mean of the capacities announced at startup, if any were logged
    pub max_possible_throughput: Option<f64>,
    pub average_throughput: f64,
    pub lowest_throughput: u64,
    pub average_dropped_queue: f64,
    pub average_dropped_limiter: f64,
    /// Calls the remote refused with status 429
    pub exceeds: u64,
    /// Complete one-second buckets
    pub buckets: usize,
    /// Time between the first and the last line
    pub total_time: Duration,
}

#[derive(Debug, Default, Clone, Copy)]
struct Bucket {
    sent: u64,
    dropped_queue: u64,
    dropped_limiter: u64,
}

/// What a single log line reports
#[derive(Debug, PartialEq)]
enum Event {
    Sent,
    DroppedQueue,
    DroppedLimiter,
    Exceeded,
    Capacity(u64),
    Other,
}

/// Analyze the log file at `path`
pub fn analyze_file(path: &Path) -> Result<Report> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    analyze(BufReader::new(file))
}

/// Analyze log lines from `reader`
///
/// Lines that do not have the sink's shape are skipped.
///
/// # Errors
///
/// Fails on read errors and when the log covers less than one second.
pub fn analyze<R: BufRead>(reader: R) -> Result<Report> {
    let mut buckets = Vec::new();
    let mut current = Bucket::default();
    let mut capacities = Vec::new();
    let mut exceeds = 0;
    let mut first: Option<DateTime<Utc>> = None;
    let mut last = DateTime::<Utc>::MIN_UTC;
    let mut bucket_start = DateTime::<Utc>::MIN_UTC;

    for line in reader.lines() {
        let line = line?;
        let Some((timestamp, level, message)) = split_line(&line) else {
            continue;
        };
        let Some(at) = parse_timestamp(timestamp) else {
            continue;
        };

        if first.is_none() {
            first = Some(at);
            bucket_start = at;
        }
        last = last.max(at);

        if elapsed(bucket_start, at) >= BUCKET {
            buckets.push(current);
            current = Bucket::default();
            bucket_start = at;
        }

        match classify(level, message) {
            Event::Sent => current.sent += 1,
            Event::DroppedQueue => current.dropped_queue += 1,
            Event::DroppedLimiter => current.dropped_limiter += 1,
            Event::Exceeded => exceeds += 1,
            Event::Capacity(n) => capacities.push(n),
            Event::Other => {}
        }
    }

    let Some(first) = first else {
        bail!("no log lines found");
    };
    if buckets.is_empty() {
        bail!("log covers less than one second");
    }

    let count = buckets.len() as f64;
    let mean = |f: fn(&Bucket) -> u64| buckets.iter().map(f).sum::<u64>() as f64 / count;

    Ok(Report {
        max_possible_throughput: (!capacities.is_empty())
            .then(|| capacities.iter().sum::<u64>() as f64 / capacities.len() as f64),
        average_throughput: mean(|b| b.sent),
        lowest_throughput: buckets.iter().map(|b| b.sent).min().unwrap_or_default(),
        average_dropped_queue: mean(|b| b.dropped_queue),
        average_dropped_limiter: mean(|b| b.dropped_limiter),
        exceeds,
        buckets: buckets.len(),
        total_time: elapsed(first, last),
    })
}

/// Split a line into timestamp, level and message
fn split_line(line: &str) -> Option<(&str, &str, &str)> {
    let mut fields = line.splitn(4, FIELD_SEPARATOR);
    let timestamp = fields.next()?;
    let _target = fields.next()?;
    let level = fields.next()?;
    let message = fields.next()?;
    Some((timestamp, level, message))
}

fn classify(level: &str, message: &str) -> Event {
    match level {
        "INFO" => {
            if message.starts_with("API response: status 200,") {
                Event::Sent
            } else if let Some(rest) = message.strip_prefix("Requests ") {
                rest.split_whitespace()
                    .next()
                    .and_then(|n| n.parse().ok())
                    .filter(|_| rest.contains("/ second possible"))
                    .map_or(Event::Other, Event::Capacity)
            } else {
                Event::Other
            }
        }
        "WARNING" => {
            if message.ends_with("from queue due to TTL") {
                Event::DroppedQueue
            } else if message.ends_with("in limiter due to TTL") {
                Event::DroppedLimiter
            } else if message.starts_with("API response: status 429,") {
                Event::Exceeded
            } else {
                Event::Other
            }
        }
        _ => Event::Other,
    }
}

/// Parse the RFC 3339 timestamp the log sink writes
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Time from `from` to `to`, zero if `to` is earlier
fn elapsed(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or_default()
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_possible_throughput {
            Some(max) => writeln!(f, "Max Possible Throughput: {max}")?,
            None => writeln!(f, "Max Possible Throughput: unknown")?,
        }
        writeln!(f, "Average Throughput: {}", self.average_throughput)?;
        writeln!(f, "Lowest Throughput: {}", self.lowest_throughput)?;
        writeln!(f, "Average Ignored from Queue: {}", self.average_dropped_queue)?;
        writeln!(f, "Average Limited by Limiter: {}", self.average_dropped_limiter)?;
        writeln!(f, "Exceeds: {}", self.exceeds)?;
        write!(f, "Total Time: {:?}", self.total_time)
    }
}
