use chrono::{DateTime, Utc};

/// `+$1234.50` / `-$12.00`
pub fn format_pnl(pnl: f64) -> String {
    if pnl >= 0.0 {
        format!("+${pnl:.2}")
    } else {
        format!("-${:.2}", -pnl)
    }
}

/// `$1.2M`, `$3.4K`, `$999`
pub fn format_volume(vol: f64) -> String {
    if vol >= 1_000_000.0 {
        format!("${:.1}M", vol / 1_000_000.0)
    } else if vol >= 1_000.0 {
        format!("${:.1}K", vol / 1_000.0)
    } else {
        format!("${vol:.0}")
    }
}

/// Fraction to one-decimal percent: `0.625` -> `62.5%`.
pub fn format_pct(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// `0x1234...abcd` for anything longer than 12 characters.
pub fn short_address(address: &str) -> String {
    abbreviate(address, 12, 6, 4)
}

/// `0x12345678...89abcdef` for anything longer than 20 characters.
pub fn long_address(address: &str) -> String {
    abbreviate(address, 20, 10, 8)
}

fn abbreviate(s: &str, max: usize, head: usize, tail: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max {
        return s.to_string();
    }
    let start: String = chars[..head].iter().collect();
    let end: String = chars[chars.len() - tail..].iter().collect();
    format!("{start}...{end}")
}

/// Cut to at most `max` characters, ending in `…` when shortened.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `01/02 15:04`, for dense trade rows.
pub fn format_short_time(ts: DateTime<Utc>) -> String {
    ts.format("%m/%d %H:%M").to_string()
}

pub fn format_date(ts: DateTime<Utc>) -> String {
    ts.format("%m/%d/%y").to_string()
}
