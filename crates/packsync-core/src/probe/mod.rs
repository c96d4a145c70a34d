//! HTTP HEAD probing.
//!
//! Uses the curl crate (libcurl) to follow redirects to the final resource
//! and read its size and `Content-Disposition`. The effective URL is what the
//! transfer backend reports as a download's locator.

mod parse;

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::str;
use std::time::Duration;

/// Result of a HEAD request against a pack's download URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadResult {
    /// URL after following redirects.
    pub effective_url: String,
    /// Total size in bytes, if `Content-Length` is present.
    pub content_length: Option<u64>,
    /// `Content-Disposition` value if present (filename hint).
    pub content_disposition: Option<String>,
}

/// Header map as `curl::easy::List` lines ("Name: value").
pub(crate) fn header_list(headers: &BTreeMap<String, String>) -> Result<curl::easy::List> {
    let mut list = curl::easy::List::new();
    for (k, v) in headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    Ok(list)
}

/// Performs a HEAD request, following redirects.
///
/// Blocking; call from `spawn_blocking` when used from async code.
pub fn probe(url: &str, headers: &BTreeMap<String, String>) -> Result<HeadResult> {
    let mut lines: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.nobody(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(Duration::from_secs(15))?;
    easy.timeout(Duration::from_secs(30))?;
    if !headers.is_empty() {
        easy.http_headers(header_list(headers)?)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                lines.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.perform().context("HEAD request failed")?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        anyhow::bail!("HEAD {} returned HTTP {}", url, code);
    }
    let effective_url = easy
        .effective_url()
        .context("no effective URL")?
        .unwrap_or(url)
        .to_string();

    let (content_length, content_disposition) = parse::final_response_headers(&lines);
    Ok(HeadResult {
        effective_url,
        content_length,
        content_disposition,
    })
}
