//! Header line parsing for HEAD responses.

/// `Content-Length` and `Content-Disposition` of the last response in
/// `lines`. Redirect hops each start with a status line; only the headers
/// after the final one count.
pub(crate) fn final_response_headers(lines: &[String]) -> (Option<u64>, Option<String>) {
    let start = lines
        .iter()
        .rposition(|l| l.starts_with("HTTP/"))
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut content_length = None;
    let mut content_disposition = None;
    for line in &lines[start..] {
        let Some((name, value)) = line.trim().split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("content-disposition") {
            content_disposition = Some(value.to_string());
        }
    }
    (content_length, content_disposition)
}
