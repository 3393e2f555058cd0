use std::fmt;
use std::io;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::{LedgerPage, MalformedResponse, RawLedgerEntry};
use crate::underwriting::{classify_utility, Verdict};

/// A recorded decision as cached from the backend ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub timestamp: String,
    pub fico_score: u16,
    pub utility: f64,
    pub verdict: Verdict,
    pub income: f64,
    pub debt_to_income: f64,
    pub loan_amount: f64,
    pub risk_aversion: f64,
}

impl LedgerEntry {
    /// Default every optional field; only a missing `id` invalidates the row.
    pub fn from_raw(raw: RawLedgerEntry, endpoint: &'static str) -> Result<Self, MalformedResponse> {
        let id = raw.id.ok_or(MalformedResponse::MissingEntryId { endpoint })?;

        let utility = field(raw.utility, endpoint, "utility");
        let verdict = match raw.decision.as_deref().and_then(Verdict::parse) {
            Some(verdict) => verdict,
            None => {
                debug!(id, endpoint, "ledger entry verdict missing; using utility sign");
                classify_utility(utility)
            }
        };
        let fico = field(raw.fico, endpoint, "fico");

        Ok(Self {
            id,
            timestamp: raw.timestamp.unwrap_or_default(),
            fico_score: fico.round().clamp(0.0, f64::from(u16::MAX)) as u16,
            utility,
            verdict,
            income: field(raw.income, endpoint, "income"),
            debt_to_income: field(raw.dti, endpoint, "dti"),
            loan_amount: field(raw.loan_amnt, endpoint, "loan_amnt"),
            risk_aversion: field(raw.risk_lambda, endpoint, "risk_lambda"),
        })
    }

    /// Clock portion of `YYYY-MM-DD HH:MM:SS`, or the raw timestamp when it has no date part.
    pub fn time_of_day(&self) -> &str {
        self.timestamp
            .split_once(' ')
            .map(|(_, time)| time)
            .unwrap_or(&self.timestamp)
    }

    /// Single audit-trail row, e.g. `[10:32:05] TXN-0007: FICO 710 | EU 12.40 | APPROVE`.
    pub fn display_line(&self) -> String {
        format!(
            "[{}] TXN-{:04}: FICO {} | EU {:.2} | {}",
            self.time_of_day(),
            self.id,
            self.fico_score,
            self.utility,
            self.verdict
        )
    }
}

fn field(value: Option<f64>, endpoint: &'static str, name: &'static str) -> f64 {
    match value {
        Some(value) if value.is_finite() => value,
        _ => {
            debug!(endpoint, field = name, "ledger entry field missing; defaulting to 0");
            0.0
        }
    }
}

/// Convert backend rows, dropping (and logging) only those without an id. Order is kept.
pub fn normalize_entries(raw: Vec<RawLedgerEntry>, endpoint: &'static str) -> Vec<LedgerEntry> {
    raw.into_iter()
        .filter_map(|row| match LedgerEntry::from_raw(row, endpoint) {
            Ok(entry) => Some(entry),
            Err(issue) => {
                warn!(%issue, "skipping ledger entry");
                None
            }
        })
        .collect()
}

/// Aggregate figures reported with the unfiltered ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub total: u64,
    pub approval_rate: f64,
    pub avg_utility: f64,
}

impl LedgerSummary {
    /// Prefer the backend's figures; fill any gap from the delivered rows.
    pub fn from_page(page: &LedgerPage, entries: &[LedgerEntry]) -> Self {
        let computed = Self::from_entries(entries);
        Self {
            total: page.total.unwrap_or(computed.total),
            approval_rate: page.approval_rate.unwrap_or(computed.approval_rate),
            avg_utility: page.avg_utility.unwrap_or(computed.avg_utility),
        }
    }

    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        if entries.is_empty() {
            return Self {
                total: 0,
                approval_rate: 0.0,
                avg_utility: 0.0,
            };
        }

        let total = entries.len() as f64;
        let approvals = entries
            .iter()
            .filter(|entry| entry.verdict == Verdict::Approve)
            .count() as f64;
        let utility_sum: f64 = entries.iter().map(|entry| entry.utility).sum();

        Self {
            total: entries.len() as u64,
            approval_rate: round_to(approvals / total * 100.0, 1),
            avg_utility: round_to(utility_sum / total, 2),
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Display-side verdict filter; never changes the cached snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictFilter {
    #[default]
    All,
    Approve,
    Reject,
}

impl VerdictFilter {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        match self {
            VerdictFilter::All => true,
            VerdictFilter::Approve => entry.verdict == Verdict::Approve,
            VerdictFilter::Reject => entry.verdict == Verdict::Reject,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown verdict filter '{0}' (expected ALL, APPROVE or REJECT)")]
pub struct UnknownVerdictFilter(pub String);

impl FromStr for VerdictFilter {
    type Err = UnknownVerdictFilter;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "" | "ALL" => Ok(VerdictFilter::All),
            "APPROVE" => Ok(VerdictFilter::Approve),
            "REJECT" => Ok(VerdictFilter::Reject),
            _ => Err(UnknownVerdictFilter(raw.to_string())),
        }
    }
}

impl fmt::Display for VerdictFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictFilter::All => f.write_str("ALL"),
            VerdictFilter::Approve => f.write_str("APPROVE"),
            VerdictFilter::Reject => f.write_str("REJECT"),
        }
    }
}

/// Write entries as CSV with a header row, in the order given.
pub fn write_csv<'a, W, I>(entries: I, writer: W) -> Result<(), csv::Error>
where
    W: io::Write,
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    for entry in entries {
        csv_writer.serialize(entry)?;
    }
    csv_writer.flush()?;
    Ok(())
}
