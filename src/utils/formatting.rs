pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else if ms < 3_600_000 {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    } else {
        let hours = ms / 3_600_000;
        let mins = (ms % 3_600_000) / 60_000;
        format!("{}h {}m", hours, mins)
    }
}

pub fn format_cost(usd: f64) -> String {
    let usd = usd.abs();
    if usd < 0.01 {
        format!("${:.4}", usd)
    } else {
        format!("${:.2}", usd)
    }
}

/// Score in `[0, 1]` as a whole percentage.
pub fn format_score(score: f64) -> String {
    format!("{:.0}%", score.clamp(0.0, 1.0) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_bands() {
        assert_eq!(format_duration(250), "250ms");
        assert_eq!(format_duration(1_500), "1.5s");
        assert_eq!(format_duration(15 * 60_000 + 3_000), "15m 3s");
        assert_eq!(format_duration(2 * 3_600_000 + 60_000), "2h 1m");
    }

    #[test]
    fn test_format_cost_precision() {
        assert_eq!(format_cost(0.0042), "$0.0042");
        assert_eq!(format_cost(12.5), "$12.50");
        assert_eq!(format_cost(-0.0), "$0.0000");
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(0.756), "76%");
        assert_eq!(format_score(1.4), "100%");
    }
}
