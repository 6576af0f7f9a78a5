//! yt-dlp `--newline` progress line parsing.

use lazy_regex::regex_captures;

/// Percentage from a yt-dlp progress line, clamped to 0..=100.
///
/// Only lines that start with `[download]` followed by a percentage count,
/// so a destination path that happens to contain `%` is ignored.
///
/// ```
/// use tubecore::download::progress::parse_progress;
///
/// assert_eq!(parse_progress("[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10"), Some(45));
/// assert_eq!(parse_progress("[download] Destination: /tmp/50% off.mp4"), None);
/// ```
pub fn parse_progress(line: &str) -> Option<u8> {
    let (_, pct) = regex_captures!(r"^\[download\]\s+(\d+(?:\.\d+)?)%", line.trim_start())?;
    let pct = pct.parse::<f32>().ok()?;
    // Clamp so garbage input cannot jump the bar past 100%
    Some(pct.clamp(0.0, 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_lines() {
        assert_eq!(parse_progress("[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10"), Some(45));
        assert_eq!(
            parse_progress("[download]   3.0% of ~ 120.50MiB at  2.10MiB/s ETA 01:02:03 (frag 3/100)"),
            Some(3)
        );
        assert_eq!(parse_progress("[download] 100% of 4.20MiB in 00:00:02 at 1.90MiB/s"), Some(100));
    }

    #[test]
    fn test_parse_progress_ignores_other_lines() {
        assert_eq!(parse_progress("[download] Destination: /tmp/x.mp4"), None);
        assert_eq!(parse_progress("[download] Destination: /tmp/100% real.mp4"), None);
        assert_eq!(parse_progress("[youtube] abc123: Downloading webpage"), None);
        assert_eq!(parse_progress("[Merger] Merging formats into \"x.mkv\""), None);
        assert_eq!(parse_progress(""), None);
    }

    #[test]
    fn test_parse_progress_clamps() {
        assert_eq!(parse_progress("[download] 250.0% of 1.00MiB"), Some(100));
    }
}
