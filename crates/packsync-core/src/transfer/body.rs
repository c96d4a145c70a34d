//! Single-stream HTTP GET of a pack body into a file.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::probe::header_list;

/// Downloads `url` into `dest`, reporting `(received, total)` through
/// `on_progress`. `total` falls back to `expected_len` (or 0) when the
/// response has no usable length. Returns the number of bytes written.
///
/// Blocking; run on a blocking thread.
pub(crate) fn fetch_to_file(
    url: &str,
    headers: &BTreeMap<String, String>,
    dest: &Path,
    expected_len: Option<u64>,
    mut on_progress: impl FnMut(u64, u64),
) -> Result<u64> {
    let mut file = File::create(dest).with_context(|| format!("create {}", dest.display()))?;
    let mut written: u64 = 0;
    let mut write_err: Option<io::Error> = None;

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(Duration::from_secs(30))?;
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;
    easy.progress(true)?;
    if !headers.is_empty() {
        easy.http_headers(header_list(headers)?)?;
    }

    let performed = {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| match file.write_all(data) {
            Ok(()) => {
                written += data.len() as u64;
                Ok(data.len())
            }
            Err(e) => {
                write_err = Some(e);
                Ok(0) // aborts the transfer
            }
        })?;
        transfer.progress_function(|dltotal, dlnow, _, _| {
            let total = if dltotal > 0.0 {
                dltotal as u64
            } else {
                expected_len.unwrap_or(0)
            };
            on_progress(dlnow as u64, total);
            true
        })?;
        transfer.perform()
    };

    if let Some(e) = write_err {
        return Err(e).with_context(|| format!("write {}", dest.display()));
    }
    performed.context("GET request failed")?;

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        anyhow::bail!("GET {} returned HTTP {}", url, code);
    }
    if let Some(exp) = expected_len {
        if written != exp {
            anyhow::bail!("partial transfer: wrote {} of {}", written, exp);
        }
    }
    file.sync_all()
        .with_context(|| format!("sync {}", dest.display()))?;
    Ok(written)
}

/// Rate limiter for progress reports: passes the first report, then at most
/// one per `interval`, plus the final one when `received` reaches `total`.
/// Repeats of the last reported byte count are suppressed.
#[derive(Debug)]
pub(crate) struct Throttle {
    interval: Duration,
    last_at: Option<Instant>,
    last_received: Option<u64>,
}

impl Throttle {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_at: None,
            last_received: None,
        }
    }

    pub(crate) fn ready(&mut self, received: u64, total: u64) -> bool {
        if self.last_received == Some(received) {
            return false;
        }
        let finished = total > 0 && received >= total;
        let due = self
            .last_at
            .map(|at| at.elapsed() >= self.interval)
            .unwrap_or(true);
        if finished || due {
            self.last_at = Some(Instant::now());
            self.last_received = Some(received);
            true
        } else {
            false
        }
    }
}
