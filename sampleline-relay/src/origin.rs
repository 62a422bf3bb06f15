use url::Url;

/// Canonical `scheme://host[:port]` form of an origin, or `None` when the
/// input is not a plain http(s) origin.
///
/// Default ports are dropped and the host is lower-cased, so
/// `HTTPS://Oric.Games:443` and `https://oric.games` compare equal.
pub fn normalize_origin(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_graphic()) {
        return None;
    }
    // Origins never carry a path, query or percent-escapes.
    if trimmed.contains('%') || trimmed.ends_with(':') {
        return None;
    }

    let url = Url::parse(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if !url.username().is_empty() || url.password().is_some() {
        return None;
    }
    if url.query().is_some() || url.fragment().is_some() || !matches!(url.path(), "" | "/") {
        return None;
    }

    // `Url` already lower-cases the scheme and domain and drops default ports.
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    })
}
