use crate::infra::{insights_service, load_activity, reference_instant};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Args;
use std::fmt::Write as _;
use std::path::PathBuf;
use tenant_insights::config::{AppConfig, InsightsConfig};
use tenant_insights::error::AppError;
use tenant_insights::workflows::insights::{
    format_currency, AppointmentRecord, AppointmentStatus, InMemoryActivitySource, InvoiceRecord,
    InvoiceStatus, JobRecord, JobStatus, NpsSubmission, QuoteRecord, QuoteStatus,
    ReportSelectionController, ReportWindowRequest, TenantActivity, TenantId, WeekWindow,
    WeeklyReport,
};

const DEMO_TENANT: &str = "demo-field-services";
const DEMO_WEEKS: usize = 3;

#[derive(Args, Debug)]
pub(crate) struct ReportGenerateArgs {
    /// Tenant identifier to report on
    #[arg(long)]
    pub(crate) tenant: String,
    /// Directory holding invoices.csv, appointments.csv, quotes.csv, jobs.csv, and nps.csv
    #[arg(long)]
    pub(crate) activity_dir: PathBuf,
    /// Monday of the week to report (defaults to the last completed week)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) week_start: Option<NaiveDate>,
    /// Evaluation date used to pick the last completed week (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Print the stored report as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Tenant identifier used for the synthetic history
    #[arg(long)]
    pub(crate) tenant: Option<String>,
    /// Override the reporting date (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Use activity exports from this directory instead of synthetic data
    #[arg(long)]
    pub(crate) activity_dir: Option<PathBuf>,
}

pub(crate) async fn run_report_generate(args: ReportGenerateArgs) -> Result<(), AppError> {
    let ReportGenerateArgs {
        tenant,
        activity_dir,
        week_start,
        today,
        json,
    } = args;

    let mut config = AppConfig::load()?.insights;
    config.activity_dir = Some(activity_dir);
    let service = insights_service(load_activity(&config)?, &config);

    let mut request = ReportWindowRequest::for_tenant(tenant);
    if let Some(week_start) = week_start {
        request = request.with_week_start(week_start);
    }
    let outcome = service
        .generate_for_week(&request, reference_instant(today))
        .await?;

    if json {
        let body = serde_json::to_string_pretty(&outcome.report).map_err(std::io::Error::from)?;
        println!("{body}");
    } else {
        print!("{}", render_weekly_report(&outcome.report));
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        tenant,
        today,
        activity_dir,
    } = args;

    let tenant = TenantId(tenant.unwrap_or_else(|| DEMO_TENANT.to_string()));
    let now = reference_instant(today);
    let latest = WeekWindow::last_completed(now.date_naive());

    let config = InsightsConfig {
        activity_dir,
        ..InsightsConfig::default()
    };
    let source = match config.activity_dir {
        Some(_) => load_activity(&config)?,
        None => synthetic_activity(&tenant, latest),
    };
    let service = insights_service(source, &config);

    println!("Weekly insights demo for {tenant}");
    let mut window = latest;
    for _ in 1..DEMO_WEEKS {
        window = window.previous();
    }
    for _ in 0..DEMO_WEEKS {
        let request = ReportWindowRequest::for_tenant(tenant.as_str()).with_week_start(window.start());
        let outcome = service.generate_for_week(&request, now).await?;
        println!(
            "- week of {}: {} revenue{}",
            outcome.report.week_start,
            format_currency(outcome.report.report.key_metrics.revenue),
            if outcome.created { "" } else { " (already stored)" }
        );
        window = window.next();
    }

    let mut controller = ReportSelectionController::new(tenant.clone());
    if let Err(err) = controller.refresh(&service).await {
        println!("  History unavailable: {err}");
        return Ok(());
    }
    if let Some(report) = controller.current_report() {
        println!();
        print!("{}", render_weekly_report(report));
    }

    if controller.navigate_previous() {
        if let Some(report) = controller.current_report() {
            println!(
                "\nPrevious week ({}) revenue {} | {} jobs completed",
                report.week_start,
                format_currency(report.report.key_metrics.revenue),
                report.report.key_metrics.jobs_completed
            );
        }
    }

    match controller.trigger_generation(&service).await {
        Ok(()) => {
            if let Some(report) = controller.current_report() {
                println!(
                    "Generation request selected the week of {} ({} reports loaded)",
                    report.week_start,
                    controller.reports().len()
                );
            }
        }
        Err(err) => println!("Generation unavailable: {err}"),
    }

    if let Some(report) = controller.current_report() {
        let sent = service
            .mark_report_sent(tenant.as_str(), &report.id, Utc::now())
            .await?;
        println!("Marked report {} as sent", sent.id);
    }

    Ok(())
}

pub(crate) fn render_weekly_report(report: &WeeklyReport) -> String {
    let metrics = &report.report.key_metrics;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Weekly insights for {} | week of {}",
        report.tenant_id, report.week_start
    );
    let change = match metrics.revenue_change {
        Some(change) => format!(" ({change:+.1}% vs prior week)"),
        None => String::new(),
    };
    let _ = writeln!(out, "Revenue: {}{}", format_currency(metrics.revenue), change);
    let _ = writeln!(
        out,
        "Jobs completed {} | Appointment completion {:.1}% | Quote conversion {:.1}% | NPS {}",
        metrics.jobs_completed,
        metrics.appointment_completion_rate,
        metrics.quote_conversion_rate,
        metrics.nps_score
    );

    for (heading, items) in [
        ("Top wins", &report.report.top_wins),
        ("Needs attention", &report.report.areas_needing_attention),
        ("Action items", &report.report.action_items),
    ] {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{heading}");
        for item in items {
            let _ = writeln!(out, "- {item}");
        }
    }

    let _ = writeln!(out, "\nForecast\n{}", report.report.forecast);
    if let Some(sent_at) = report.sent_at {
        let _ = writeln!(out, "Sent {}", sent_at.format("%Y-%m-%d %H:%M UTC"));
    }
    out
}

/// Three weeks of deterministic activity ending with `latest`, trending upward.
fn synthetic_activity(tenant: &TenantId, latest: WeekWindow) -> InMemoryActivitySource {
    let mut activity = TenantActivity::default();
    let mut window = latest.previous().previous();

    for week in 0..DEMO_WEEKS {
        let monday = window.start();
        let tag = monday.format("%m%d").to_string();
        let growth = 1.0 + 0.12 * week as f64;

        for (slot, (service, base)) in [
            ("Furnace tune-up", 180.0),
            ("Duct cleaning", 420.0),
            ("Water heater install", 1450.0),
        ]
        .into_iter()
        .enumerate()
        {
            activity.invoices.push(InvoiceRecord {
                invoice_id: format!("INV-{tag}-{slot}"),
                service: service.to_string(),
                amount: (base * growth * 100.0_f64).round() / 100.0,
                status: InvoiceStatus::Paid,
                due_on: Some(monday + Duration::days(slot as i64 + 1)),
                paid_at: Some(at(monday, slot as i64 + 1, 15)),
            });
        }
        activity.invoices.push(InvoiceRecord {
            invoice_id: format!("INV-{tag}-open"),
            service: "Thermostat install".to_string(),
            amount: 260.0,
            status: InvoiceStatus::Sent,
            due_on: Some(monday + Duration::days(30)),
            paid_at: None,
        });

        for slot in 0..5 {
            let status = match (week, slot) {
                (0, 3) | (0, 4) | (1, 4) => AppointmentStatus::NoShow,
                (_, 4) => AppointmentStatus::Cancelled,
                _ => AppointmentStatus::Completed,
            };
            activity.appointments.push(AppointmentRecord {
                appointment_id: format!("APT-{tag}-{slot}"),
                scheduled_at: at(monday, slot, 9),
                status,
            });
        }

        for slot in 0..4 {
            let status = if slot <= week {
                QuoteStatus::Accepted
            } else {
                QuoteStatus::Declined
            };
            activity.quotes.push(QuoteRecord {
                quote_id: format!("Q-{tag}-{slot}"),
                sent_at: Some(at(monday, slot as i64, 11)),
                status,
            });
        }

        for slot in 0..(2 + week) {
            activity.jobs.push(JobRecord {
                job_id: format!("JOB-{tag}-{slot}"),
                title: "Seasonal maintenance visit".to_string(),
                status: JobStatus::Completed,
                due_on: Some(monday + Duration::days(slot as i64)),
                completed_at: Some(at(monday, slot as i64, 16)),
            });
        }

        for (slot, score) in [9u8, 10, 6 + week as u8].into_iter().enumerate() {
            activity.nps.push(NpsSubmission {
                submitted_at: at(monday, slot as i64 + 2, 18),
                score,
                comment: (score <= 6).then(|| "Technician arrived outside the window".to_string()),
            });
        }

        window = window.next();
    }

    activity.jobs.push(JobRecord {
        job_id: "JOB-backlog".to_string(),
        title: "Boiler replacement".to_string(),
        status: JobStatus::Scheduled,
        due_on: Some(latest.start() + Duration::days(2)),
        completed_at: None,
    });

    InMemoryActivitySource::new().with_tenant(tenant.clone(), activity)
}

fn at(monday: NaiveDate, offset_days: i64, hour: u32) -> DateTime<Utc> {
    let day = monday + Duration::days(offset_days);
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default();
    Utc.from_utc_datetime(&day.and_time(time))
}
