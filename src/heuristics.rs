use crate::config::SamplerConfig;

/// Minimum output size for an input of `rows`: `max(floor(rows * fraction), floor)`.
pub fn target_size(rows: usize, config: &SamplerConfig) -> usize {
    let proportional = ((rows as f64) * config.target_size_fraction).floor() as usize;
    proportional.max(config.min_sample_rows)
}

/// Number of distinct values `MostValues` covers: `floor(distinct * fraction)`.
pub fn most_values_count(distinct: usize, fraction: f64) -> usize {
    (((distinct as f64) * fraction).floor() as usize).min(distinct)
}

/// Number of rows `RandomFraction` draws: `round(rows * fraction)`.
pub fn random_fraction_count(rows: usize, fraction: f64) -> usize {
    (((rows as f64) * fraction).round() as usize).min(rows)
}

/// Share of `part` in `whole` as a percentage; `0.0` for an empty whole.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    part / whole * 100.0
}

/// Integer with `,` thousands separators, e.g. `1,234,567`.
pub fn format_usize_with_commas(value: usize) -> String {
    let raw = value.to_string();
    let mut grouped_reversed = String::with_capacity(raw.len() + (raw.len() / 3));
    for (idx, ch) in raw.chars().rev().enumerate() {
        if idx > 0 && idx % 3 == 0 {
            grouped_reversed.push(',');
        }
        grouped_reversed.push(ch);
    }
    grouped_reversed.chars().rev().collect()
}

/// Two-decimal amount with thousands separators, e.g. `12,345.60`.
pub fn format_amount(value: f64) -> String {
    let rounded = format!("{:.2}", value.abs());
    let (whole, fraction) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));
    let whole = whole
        .parse::<usize>()
        .map(format_usize_with_commas)
        .unwrap_or_else(|_| whole.to_string());
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{whole}.{fraction}")
}
