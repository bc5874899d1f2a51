use hopviz_model::{HopRecord, PROBES_PER_HOP};
use log::trace;

/// Parses the full output of one trace invocation. Lines that do not start
/// with a hop number (banners, blanks) yield nothing.
pub fn parse_hops(text: &str) -> Vec<HopRecord> {
    text.lines().filter_map(parse_hop_line).collect()
}

pub fn parse_hop_line(line: &str) -> Option<HopRecord> {
    let (hop_number, rest) = match split_hop_number(line) {
        Some(parts) => parts,
        None => {
            if !line.trim().is_empty() {
                trace!("skipping non-hop line: {}", line.trim());
            }
            return None;
        }
    };

    let (ip_address, hostname) = match find_named_address(line) {
        Some((name, ip)) => {
            let hostname = (name != ip && name != "*").then(|| name.to_string());
            (Some(ip.to_string()), hostname)
        }
        None => (find_dotted_quad(line).map(str::to_string), None),
    };

    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let mut round_trip_times = scan_rtts(&tokens);
    if round_trip_times.is_empty() {
        round_trip_times = rest.chars().filter(|&c| c == '*').map(|_| None).collect();
    }
    if round_trip_times.len() < PROBES_PER_HOP {
        round_trip_times.resize(PROBES_PER_HOP, None);
    }

    Some(HopRecord {
        hop_number,
        ip_address,
        hostname,
        round_trip_times,
    })
}

/// Leading digit run after optional whitespace, and the text after it.
fn split_hop_number(line: &str) -> Option<(u32, &str)> {
    let line = line.trim_start();
    let end = line
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(line.len());
    if end == 0 {
        return None;
    }

    let hop_number = line[..end].parse().ok()?;
    Some((hop_number, &line[end..]))
}

/// `name (a.b.c.d)`, or the `name [a.b.c.d]` form printed by tracert. The
/// hop number itself is never taken as the name.
fn find_named_address(line: &str) -> Option<(&str, &str)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    tokens.windows(2).enumerate().find_map(|(index, pair)| {
        let inner = pair[1]
            .strip_prefix('(')
            .and_then(|tok| tok.strip_suffix(')'))
            .or_else(|| {
                pair[1]
                    .strip_prefix('[')
                    .and_then(|tok| tok.strip_suffix(']'))
            })?;
        if !is_ipv4(inner) {
            return None;
        }
        let is_hop_token = index == 0 && pair[0].chars().all(|c| c.is_ascii_digit());
        Some((if is_hop_token { "*" } else { pair[0] }, inner))
    })
}

fn find_dotted_quad(text: &str) -> Option<&str> {
    text.split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .find(|candidate| is_ipv4(candidate))
}

fn scan_rtts(tokens: &[&str]) -> Vec<Option<f64>> {
    let mut rtts = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let tok = tokens[i];

        if tok == "*" {
            rtts.push(None);
            i += 1;
            continue;
        }

        if let Some(value) = tok.strip_suffix("ms").and_then(parse_millis) {
            rtts.push(Some(value));
            i += 1;
            continue;
        }

        if tokens.get(i + 1) == Some(&"ms") {
            if let Some(value) = parse_millis(tok) {
                rtts.push(Some(value));
                i += 2;
                continue;
            }
        }

        i += 1;
    }
    rtts
}

fn parse_millis(token: &str) -> Option<f64> {
    let digits = token.strip_prefix('<').unwrap_or(token);
    let well_formed = digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.');
    if !well_formed {
        return None;
    }
    digits.parse().ok()
}

fn is_ipv4(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 4 {
        return false;
    }

    parts.iter().all(|part| {
        !part.is_empty()
            && part.len() <= 3
            && part.chars().all(|c| c.is_ascii_digit())
            && part.parse::<u8>().is_ok()
    })
}
