//! Grammars of the measurement channels.
//!
//! The same parsers serve the live output of a stage and the persisted logs.

use lazy_static::lazy_static;
use log::trace;
use regex::Regex;
use roofline_shared::results::{MemoryTraffic, OperationCount};
use std::collections::BTreeMap;

/// A pattern whose first capture group holds an unsigned count.
pub struct ExtractionRule {
    pub name: &'static str,
    pattern: &'static Regex,
}

impl ExtractionRule {
    /// Value of the first line matching this rule, if any.
    pub fn extract(&self, text: &str) -> Option<u64> {
        self.pattern
            .captures(text)
            .and_then(|captures| captures.get(1))
            .and_then(|value| value.as_str().parse().ok())
    }
}

/// First value produced by `rules`, tried in priority order.
pub fn extract_first(rules: &[ExtractionRule], text: &str) -> Option<u64> {
    rules.iter().find_map(|rule| {
        let value = rule.extract(text)?;
        trace!("Matched the `{}` rule: {value}", rule.name);
        Some(value)
    })
}

lazy_static! {
    static ref TOTAL_COUNTED_REGEX: Regex = Regex::new(r"\bTOTAL counted:\s*(\d+)").unwrap();
    static ref TOTAL_REGEX: Regex = Regex::new(r"\bTOTAL:\s*(\d+)").unwrap();
    static ref OPERATION_KIND_REGEX: Regex =
        Regex::new(r"\b(ADD|SUB|MUL|DIV):\s*(\d+)").unwrap();
    static ref DRAM_READ_REGEX: Regex = Regex::new(r"\bDRAM_READ_BYTES[ \t]*=[ \t]*(\d+)").unwrap();
    static ref DRAM_WRITE_REGEX: Regex = Regex::new(r"\bDRAM_WRITE_BYTES[ \t]*=[ \t]*(\d+)").unwrap();
    static ref DRAM_TOTAL_REGEX: Regex = Regex::new(r"\bDRAM_TOTAL_BYTES[ \t]*=[ \t]*(\d+)").unwrap();
    /// Both phrasings of the total, the more specific first.
    pub static ref OPERATION_TOTAL_RULES: [ExtractionRule; 2] = [
        ExtractionRule {
            name: "TOTAL counted",
            pattern: &TOTAL_COUNTED_REGEX,
        },
        ExtractionRule {
            name: "TOTAL",
            pattern: &TOTAL_REGEX,
        },
    ];
    static ref DRAM_READ_RULE: ExtractionRule = ExtractionRule {
        name: "DRAM_READ_BYTES",
        pattern: &DRAM_READ_REGEX,
    };
    static ref DRAM_WRITE_RULE: ExtractionRule = ExtractionRule {
        name: "DRAM_WRITE_BYTES",
        pattern: &DRAM_WRITE_REGEX,
    };
    static ref DRAM_TOTAL_RULE: ExtractionRule = ExtractionRule {
        name: "DRAM_TOTAL_BYTES",
        pattern: &DRAM_TOTAL_REGEX,
    };
}

/// Parse memory-traffic counters. Nothing is returned without a total.
pub fn memory_traffic(text: &str) -> Option<MemoryTraffic> {
    let total_bytes = DRAM_TOTAL_RULE.extract(text)?;
    Some(MemoryTraffic {
        read_bytes: DRAM_READ_RULE.extract(text),
        write_bytes: DRAM_WRITE_RULE.extract(text),
        total_bytes,
    })
}

/// Parse an operation count and its optional per-kind breakdown. Nothing is returned
/// without a total.
pub fn operation_count(text: &str) -> Option<OperationCount> {
    let total = extract_first(&*OPERATION_TOTAL_RULES, text)?;
    let breakdown: BTreeMap<String, u64> = OPERATION_KIND_REGEX
        .captures_iter(text)
        .filter_map(|captures| {
            let count = captures[2].parse().ok()?;
            Some((captures[1].to_string(), count))
        })
        .collect();
    Some(OperationCount { total, breakdown })
}
