//! Fixed-width text summary
//!
//! ```text
//! First entry recorded at:  2023-03-02 10:00:00
//! Last entry recorded at:   2023-03-02 10:00:05
//! Processed 3 de-duplicated records of a total of 4 records
//!
//! Device                     Rec Cnt     Mean ±σ          Min      Max
//! A 1                              2     12.0 ± 2.00     10.0     14.0
//! B                                1      5.0 ± 0.00      5.0      5.0
//! ```

use std::fmt::Write;

use crate::query::SessionReport;
use crate::registry::DeviceStats;

/// Placeholder for a time that has not happened yet
const NO_TIME: &str = "(none)";

/// Column header line
pub fn header_line() -> String {
    format!(
        "{:<25} {:>8} {:>8} ±{:<5} {:>8} {:>8}",
        "Device", "Rec Cnt", "Mean", "σ", "Min", "Max"
    )
}

/// One device line
pub fn device_line(row: &DeviceStats) -> String {
    let s = &row.stats;
    format!(
        "{:<25} {:>8} {:>8.1} ±{:>5.2} {:>8.1} {:>8.1}",
        row.device_key, s.count, s.mean, s.stddev, s.min, s.max
    )
}

/// Full summary: times, totals, header and one line per device.
pub fn render_summary(report: &SessionReport) -> String {
    let totals = &report.totals;
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(
        out,
        "First entry recorded at:  {}",
        totals.first_accepted.as_deref().unwrap_or(NO_TIME)
    );
    let _ = writeln!(
        out,
        "Last entry recorded at:   {}",
        totals.last_accepted.as_deref().unwrap_or(NO_TIME)
    );
    let _ = writeln!(
        out,
        "Processed {} de-duplicated records of a total of {} records",
        totals.total_accepted, totals.total_received
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", header_line());
    for row in &report.devices {
        let _ = writeln!(out, "{}", device_line(row));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortOrder;
    use crate::session::SessionTotals;
    use crate::stats::StatSnapshot;

    fn row(key: &str, count: u64, mean: f64, stddev: f64, min: f64, max: f64) -> DeviceStats {
        DeviceStats {
            device_key: key.to_string(),
            stats: StatSnapshot {
                count,
                mean,
                stddev,
                min,
                max,
            },
        }
    }

    #[test]
    fn test_device_line_layout() {
        let line = device_line(&row("A 1", 2, 12.0, 2.0, 10.0, 14.0));
        assert_eq!(
            line,
            "A 1                              2     12.0 ± 2.00     10.0     14.0"
        );
    }

    #[test]
    fn test_device_line_rounding() {
        let line = device_line(&row("Acurite-Tower 2345", 17, 14.849, 1.23456, -0.04, 19.96));
        assert!(line.starts_with("Acurite-Tower 2345        "));
        assert!(line.contains("    14.8 "));
        assert!(line.contains("± 1.23"));
        assert!(line.contains("    -0.0 "));
        assert!(line.ends_with("    20.0"));
    }

    #[test]
    fn test_render_summary() {
        let report = SessionReport {
            order: SortOrder::DeviceKey,
            totals: SessionTotals {
                total_received: 4,
                total_accepted: 3,
                total_duplicates: 1,
                total_malformed: 0,
                first_accepted: Some("2023-03-02 10:00:00".to_string()),
                last_accepted: Some("2023-03-02 10:00:05".to_string()),
            },
            devices: vec![
                row("A 1", 2, 12.0, 2.0, 10.0, 14.0),
                row("B", 1, 5.0, 0.0, 5.0, 5.0),
            ],
        };

        let text = render_summary(&report);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "First entry recorded at:  2023-03-02 10:00:00");
        assert_eq!(lines[1], "Last entry recorded at:   2023-03-02 10:00:05");
        assert_eq!(
            lines[2],
            "Processed 3 de-duplicated records of a total of 4 records"
        );
        assert_eq!(lines[3], "");
        assert!(lines[4].starts_with("Device"));
        assert!(lines[5].starts_with("A 1"));
        assert!(lines[6].starts_with("B "));
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_render_summary_empty_session() {
        let report = SessionReport {
            order: SortOrder::FirstSeen,
            totals: SessionTotals::default(),
            devices: Vec::new(),
        };
        let text = render_summary(&report);
        assert!(text.contains("First entry recorded at:  (none)"));
        assert!(text.contains("Processed 0 de-duplicated records of a total of 0 records"));
    }
}
