/// Replace the separators of an IP address with dashes so it can be embedded
/// in a single DNS label (`85.100.50.25` -> `85-100-50-25`).
pub fn dashed_ip(ip: &str) -> String {
    ip.trim().replace(['.', ':'], "-")
}

/// Build the public hostname for a port or custom name:
/// `{label}-{dashed-ip}.{suffix}`.
pub fn hostname_for(label: &str, public_ip: &str, suffix: &str) -> String {
    format!("{}-{}.{}", label, dashed_ip(public_ip), suffix.trim_start_matches('.'))
        .to_ascii_lowercase()
}

/// Hostname used for the default certificate when no static route exists.
pub fn default_hostname(public_ip: &str, suffix: &str) -> String {
    format!("{}.{}", dashed_ip(public_ip), suffix.trim_start_matches('.')).to_ascii_lowercase()
}

/// Strip a `:port` suffix from a Host header value and lowercase it.
/// Bracketed IPv6 literals keep their brackets.
pub fn strip_port(host: &str) -> String {
    let host = host.trim();
    let bare = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        host.split(':').next().unwrap_or(host)
    };
    bare.to_ascii_lowercase()
}

/// Extract the leading port token of `<token>-<digit>...`.
///
/// The token is made of word characters (`[A-Za-z0-9_]`) up to the first
/// dash, and must be followed by a digit. Returns `None` when the pattern does
/// not match or the token is not a non-zero port number.
pub fn leading_port(host: &str) -> Option<u16> {
    let (token, rest) = host.split_once('-')?;
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    if !rest.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    match token.parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}

/// Text before the first dash, used to look up custom names.
pub fn leading_label(host: &str) -> &str {
    host.split('-').next().unwrap_or(host)
}
