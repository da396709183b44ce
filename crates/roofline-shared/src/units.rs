//! Display scaling. Results are always stored in base units; these helpers are only used
//! when rendering.

pub const GIGA: f64 = 1e9;
pub const GIB: f64 = (1u64 << 30) as f64;

const BASE: f64 = 1024.0;
const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

/// Format a byte count with binary units and two decimals, e.g. `1.50 GiB`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit_index = 0;
    while value >= BASE && unit_index < UNITS.len() - 1 {
        value /= BASE;
        unit_index += 1;
    }
    format!("{value:.2} {}", UNITS[unit_index])
}

/// Format an integer with a comma every three digits.
pub fn format_count(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

pub fn format_throughput(ops_per_s: f64) -> String {
    format!("{:.3} Gops/s", ops_per_s / GIGA)
}

pub fn format_bandwidth(bytes_per_s: f64) -> String {
    format!("{:.3} GiB/s", bytes_per_s / GIB)
}

/// Format a duration given in seconds, picking the largest unit that keeps the value >= 1.
pub fn format_seconds(seconds: f64) -> String {
    if seconds >= 1.0 {
        format!("{seconds:.3} s")
    } else if seconds >= 1e-3 {
        format!("{:.3} ms", seconds * 1e3)
    } else if seconds >= 1e-6 {
        format!("{:.3} µs", seconds * 1e6)
    } else {
        format!("{:.0} ns", seconds * 1e9)
    }
}
