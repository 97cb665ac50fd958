//! One-line step status and elapsed-time formatting.

use std::time::Duration;

/// Formats the per-step status line: `Step 3/25: Search for laptops (2.4s)`.
///
/// Elapsed time is shown only once the step took longer than a second.
pub fn format_step_status(step: u32, max_steps: u32, description: &str, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs > 1.0 {
        format!("Step {step}/{max_steps}: {description} ({secs:.1}s)")
    } else {
        format!("Step {step}/{max_steps}: {description}")
    }
}

/// Formats a duration for result displays: `12.3s` below a minute, `2m 5s` above.
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        let total = secs as u64;
        format!("{}m {}s", total / 60, total % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_steps_omit_elapsed() {
        let line = format_step_status(3, 25, "Open the cart", Duration::from_millis(400));
        assert_eq!(line, "Step 3/25: Open the cart");

        let line = format_step_status(3, 25, "Open the cart", Duration::from_secs(1));
        assert_eq!(line, "Step 3/25: Open the cart");
    }

    #[test]
    fn test_long_steps_show_elapsed() {
        let line = format_step_status(4, 25, "Read reviews", Duration::from_millis(2440));
        assert_eq!(line, "Step 4/25: Read reviews (2.4s)");
    }

    #[test]
    fn test_durations_under_a_minute_use_seconds() {
        assert_eq!(format_duration(12.34), "12.3s");
        assert_eq!(format_duration(0.0), "0.0s");
    }

    #[test]
    fn test_durations_over_a_minute_use_minutes() {
        assert_eq!(format_duration(60.0), "1m 0s");
        assert_eq!(format_duration(125.7), "2m 5s");
    }
}
