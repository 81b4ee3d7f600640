use regex::Regex;
use std::sync::OnceLock;

// A sign is only kept on numbers with a decimal point; plain integers match `\d+` alone.
const NUMBER_PATTERN: &str = r"[-+]?\d*\.\d+|\d+";

fn number_regex() -> &'static Regex {
    static NUMBER_RE: OnceLock<Regex> = OnceLock::new();
    NUMBER_RE.get_or_init(|| Regex::new(NUMBER_PATTERN).expect("number pattern is valid"))
}

/// Extracts every number in `text`, left to right.
pub fn extract_numbers(text: &str) -> Vec<f64> {
    number_regex()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}
