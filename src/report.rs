// THEORY:
// Reporting is a pure reader of the `LapLedger`. It never mutates the session and
// never holds on to it: a `LedgerReport` is an owned, round-grouped copy built at
// the moment of export, so a report in progress cannot observe a half-applied
// lap.

use crate::core_modules::frame::Millis;
use crate::core_modules::ledger::LapLedger;
use std::fmt;

/// `MM:SS.mmm`, every field floored. Negative or non-finite input shows as zero.
pub fn format_duration(ms: Millis) -> String {
    let ms = if ms.is_finite() && ms > 0.0 { ms.floor() as u64 } else { 0 };
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{minutes:02}:{seconds:02}.{millis:03}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportLap {
    pub runner_name: String,
    pub duration_ms: Millis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRound {
    pub round: u32,
    pub laps: Vec<ReportLap>,
}

impl ReportRound {
    pub fn best(&self) -> Option<&ReportLap> {
        self.laps
            .iter()
            .min_by(|a, b| a.duration_ms.total_cmp(&b.duration_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LedgerReport {
    pub rounds: Vec<ReportRound>,
}

impl LedgerReport {
    pub fn from_ledger(ledger: &LapLedger) -> Self {
        let rounds = ledger
            .by_round()
            .into_iter()
            .map(|(round, laps)| ReportRound {
                round,
                laps: laps
                    .into_iter()
                    .map(|lap| ReportLap {
                        runner_name: lap.runner_name.clone(),
                        duration_ms: lap.duration_ms,
                    })
                    .collect(),
            })
            .collect();
        Self { rounds }
    }

    pub fn total_rounds(&self) -> usize {
        self.rounds.len()
    }

    pub fn total_laps(&self) -> usize {
        self.rounds.iter().map(|r| r.laps.len()).sum()
    }
}

impl fmt::Display for LedgerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LAP TIMES")?;
        if self.rounds.is_empty() {
            return writeln!(f, "  (no laps recorded)");
        }
        for round in &self.rounds {
            writeln!(f, "Round {}", round.round)?;
            for (i, lap) in round.laps.iter().enumerate() {
                writeln!(
                    f,
                    "  {:>2}. {:<20} {}",
                    i + 1,
                    lap.runner_name,
                    format_duration(lap.duration_ms)
                )?;
            }
            if let Some(best) = round.best() {
                writeln!(
                    f,
                    "  best: {} {}",
                    best.runner_name,
                    format_duration(best.duration_ms)
                )?;
            }
        }
        writeln!(f, "Total rounds: {}", self.total_rounds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::ledger::LapRecord;
    use crate::core_modules::rotation::RunnerId;

    #[test]
    fn formatting_truncates_instead_of_rounding() {
        assert_eq!(format_duration(0.0), "00:00.000");
        assert_eq!(format_duration(4000.9), "00:04.000");
        assert_eq!(format_duration(59_999.999), "00:59.999");
        assert_eq!(format_duration(61_234.5), "01:01.234");
        assert_eq!(format_duration(-5.0), "00:00.000");
        assert_eq!(format_duration(f64::NAN), "00:00.000");
    }

    #[test]
    fn report_groups_rounds_and_finds_best() {
        let mut ledger = LapLedger::new();
        for (ms, id, name, round) in [
            (4200.0, 1, "Ana", 1),
            (3900.0, 2, "Bea", 1),
            (4100.0, 1, "Ana", 2),
        ] {
            ledger.append(LapRecord {
                duration_ms: ms,
                runner_id: RunnerId(id),
                runner_name: name.into(),
                round,
            });
        }
        let report = LedgerReport::from_ledger(&ledger);
        assert_eq!(report.total_rounds(), 2);
        assert_eq!(report.total_laps(), 3);
        assert_eq!(report.rounds[0].best().unwrap().runner_name, "Bea");

        let text = report.to_string();
        assert!(text.contains("Round 2"));
        assert!(text.contains("00:03.900"));
        assert!(text.ends_with("Total rounds: 2\n"));
    }

    #[test]
    fn empty_report_says_so() {
        let report = LedgerReport::from_ledger(&LapLedger::new());
        assert!(report.to_string().contains("no laps recorded"));
    }
}
