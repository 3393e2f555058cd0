use chrono::Utc;
use clap::Args;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use vantage_risk::analytics::AnalyticsDesk;
use vantage_risk::audit::{AuditSyncChannel, LedgerView, SyncStatus, VerdictFilter};
use vantage_risk::backend::HttpBackend;
use vantage_risk::config::AppConfig;
use vantage_risk::error::AppError;
use vantage_risk::health::{default_catalog, HealthMonitor, HealthSnapshot, RandomWalkSampler};
use vantage_risk::underwriting::{
    compare_with_baseline, simulation_delta, utility_frontier, ApplicantProfile, UtilityEngine,
};

#[derive(Args, Debug)]
pub(crate) struct AnalyzeArgs {
    /// Annual income in dollars
    #[arg(long)]
    pub(crate) income: f64,
    /// FICO score (300-850)
    #[arg(long)]
    pub(crate) fico: u16,
    /// Debt-to-income ratio as a percentage (0-100)
    #[arg(long)]
    pub(crate) dti: f64,
    /// Requested loan amount in dollars
    #[arg(long)]
    pub(crate) loan_amount: f64,
    /// Risk aversion coefficient (1.0-5.0)
    #[arg(long, default_value_t = 2.5)]
    pub(crate) risk_aversion: f64,
    /// Print the utility frontier around the operating point
    #[arg(long)]
    pub(crate) frontier: bool,
}

#[derive(Args, Debug)]
pub(crate) struct LedgerArgs {
    /// Filter by FICO or timestamp substring; omit for the full ledger
    #[arg(long)]
    pub(crate) search: Option<String>,
    /// Show only ALL, APPROVE or REJECT entries
    #[arg(long, default_value_t = VerdictFilter::All)]
    pub(crate) verdict: VerdictFilter,
    /// Write the shown entries to a CSV file instead of printing them
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct HealthArgs {
    /// Number of ticks to sample after seeding
    #[arg(long, default_value_t = 1)]
    pub(crate) ticks: u32,
    /// Seed for a reproducible random walk (overrides APP_MONITOR_SEED)
    #[arg(long)]
    pub(crate) seed: Option<u64>,
}

fn http_backend(config: &AppConfig) -> Result<Arc<HttpBackend>, AppError> {
    Ok(Arc::new(HttpBackend::new(&config.backend)?))
}

pub(crate) async fn run_analyze(config: &AppConfig, args: AnalyzeArgs) -> Result<(), AppError> {
    let profile = ApplicantProfile::new(
        args.income,
        args.fico,
        args.dti,
        args.loan_amount,
        args.risk_aversion,
    )?;
    let engine = UtilityEngine::new(http_backend(config)?, config.backend.request_timeout);
    let decision = engine.decide(&profile).await?;
    let baseline = compare_with_baseline(&profile, &decision);

    println!("Underwriting decision");
    println!(
        "- Applicant: income ${:.0} | FICO {} | DTI {:.1}% | loan ${:.0} | lambda {:.2}",
        profile.income(),
        profile.fico_score(),
        profile.debt_to_income(),
        profile.loan_amount(),
        profile.risk_aversion()
    );
    println!("- Verdict: {} ({})", decision.verdict, decision.summary);
    println!("- Expected utility: {:.2}", decision.expected_utility);
    println!(
        "- Probability of default: {:.1}% ({:?} risk)",
        decision.default_probability,
        decision.risk_band()
    );
    println!(
        "- Legacy FICO rule: {} | {}",
        baseline.legacy_verdict,
        if baseline.agrees {
            "agrees with the utility model"
        } else {
            "overridden by the utility model"
        }
    );

    if args.frontier {
        println!("\nUtility frontier");
        for point in utility_frontier(decision.risk_aversion, decision.expected_utility) {
            let marker = if point.is_operating_point { " <- current" } else { "" };
            println!(
                "  lambda {:.3} | utility {:>8.3}{}",
                point.risk_aversion, point.utility, marker
            );
        }
    }

    Ok(())
}

pub(crate) async fn run_ledger(config: &AppConfig, args: LedgerArgs) -> Result<(), AppError> {
    let channel = AuditSyncChannel::new(http_backend(config)?, config.backend.request_timeout);
    let status = match args.search.as_deref() {
        Some(text) => channel.search_submitted(text).await,
        None => channel.initial_load().await,
    };

    if status == SyncStatus::Offline {
        let view = channel.view();
        println!(
            "Ledger offline: {}",
            view.offline_reason.as_deref().unwrap_or("backend unreachable")
        );
        return Ok(());
    }

    if let Some(path) = args.csv {
        let file = File::create(&path)?;
        let written = channel.export_csv(args.verdict, file)?;
        println!("Exported {} ledger entries to {}", written, path.display());
        return Ok(());
    }

    render_ledger(&channel.view(), args.verdict);
    Ok(())
}

fn render_ledger(view: &LedgerView, filter: VerdictFilter) {
    match &view.active_query {
        Some(query) => println!("Decision ledger (search \"{}\", {})", query, filter),
        None => println!("Decision ledger ({})", filter),
    }

    if let Some(summary) = &view.summary {
        println!(
            "- {} decisions | {:.1}% approved | avg utility {:.2}",
            summary.total, summary.approval_rate, summary.avg_utility
        );
    }

    let rows = view.filtered(filter);
    if rows.is_empty() {
        println!("No matching entries");
        return;
    }
    for entry in rows {
        println!("  {}", entry.display_line());
    }
}

pub(crate) fn run_health(config: &AppConfig, args: HealthArgs) -> Result<(), AppError> {
    let seed = args.seed.or(config.monitor.seed);
    let mut monitor = HealthMonitor::new(
        default_catalog(),
        config.monitor.history_capacity,
        RandomWalkSampler::new(seed),
        Utc::now(),
    );

    let mut snapshot = monitor.snapshot();
    for _ in 0..args.ticks {
        snapshot = monitor.tick();
    }

    render_health(&snapshot);
    Ok(())
}

fn render_health(snapshot: &HealthSnapshot) {
    println!(
        "System health at {} | overall {}",
        snapshot.taken_at.format("%Y-%m-%d %H:%M:%S UTC"),
        snapshot.overall
    );
    for metric in &snapshot.metrics {
        println!(
            "- {:<22} {:>9.3} {:<2} {:<8} ({} samples)",
            metric.name(),
            metric.current_value(),
            metric.spec().unit,
            metric.status().to_string(),
            metric.history().len()
        );
    }

    if snapshot.alerts.is_empty() {
        println!("Alerts: none");
    } else {
        println!("Alerts");
        for alert in &snapshot.alerts {
            println!("- [{}] {}", alert.status, alert.message);
        }
    }
}

pub(crate) async fn run_simulate(config: &AppConfig) -> Result<(), AppError> {
    let desk = AnalyticsDesk::new(http_backend(config)?, config.backend.request_timeout);
    let scorecard = desk.refresh_scorecard().await;

    println!("Model scorecard");
    println!(
        "- accuracy {:.2}% | precision {:.2}% | recall {:.2}% | F1 {:.2}",
        scorecard.accuracy, scorecard.precision, scorecard.recall, scorecard.f1_score
    );

    let result = desk.run_simulation().await?;
    println!("\nBacktest (rule-based vs. utility)");
    println!("- Rule-based profit: ${:.0}", result.rule_based_profit);
    println!("- Utility profit: ${:.0}", result.ai_utility_profit);
    println!(
        "- Delta: ${} ({} improvement)",
        simulation_delta(&result),
        result.improvement_pct
    );
    Ok(())
}
