//! The `mirror` command: resolve, establish the session, run, report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use console::{Term, style};
use tabled::Tabled;
use treemirror::gateway::{Gateway, GatewayOptions, ProxySettings, SessionSettings};
use treemirror::reference::resolve;
use treemirror::sync::{MAX_PROXY_ATTEMPTS, SyncContext, SyncOptions, SyncReport};

use crate::MirrorArgs;
use crate::commands::prompt::{TermPrompter, ask_proxy_credentials, ask_target};
use crate::config::Config;
use crate::progress::ProgressReporter;

/// How many per-file errors are listed after the summary.
const MAX_LISTED_ERRORS: usize = 10;

pub(crate) async fn handle_mirror(
    args: MirrorArgs,
    config: &Config,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let is_tty = Term::stdout().is_term();
    let interactive = Term::stderr().is_term();
    let gateway_options = gateway_options(&args, config);
    let sync_options = sync_options(&args, config);
    let json = args.json;
    let mut prompter = TermPrompter::new();

    let (repo, branch, dest) = match args.repo {
        Some(repo) => (repo, args.branch, args.dest),
        None if interactive => {
            let target = ask_target(&mut prompter)?;
            (
                target.repo,
                args.branch.or(target.branch),
                args.dest.or(target.dest),
            )
        }
        None => return Err("a repository reference is required (owner/name or URL)".into()),
    };

    let reference = resolve(&repo, branch.as_deref())?;
    let destination = dest.unwrap_or_else(|| PathBuf::from(&reference.name));
    let endpoints = config.endpoints()?;

    let default_proxy_host = gateway_options
        .settings
        .proxy
        .as_ref()
        .map(|proxy| proxy.url.clone());
    let gateway = Arc::new(Gateway::new(gateway_options)?);

    let check_url = endpoints.reachability_url();
    gateway
        .establish_with(
            check_url.as_str(),
            |attempt| {
                if !interactive {
                    return None;
                }
                ask_proxy_credentials(
                    &mut prompter,
                    attempt,
                    MAX_PROXY_ATTEMPTS,
                    default_proxy_host.as_deref(),
                )
            },
            MAX_PROXY_ATTEMPTS,
        )
        .await?;

    if gateway.verification_disabled() {
        if is_tty {
            eprintln!(
                "{} TLS certificate verification is disabled for this run",
                style("Warning:").yellow().bold()
            );
        } else {
            tracing::warn!("TLS certificate verification is disabled for this run");
        }
    }

    if is_tty && !json {
        println!(
            "Mirroring {} into {}",
            style(&reference).cyan(),
            style(destination.display()).bold()
        );
    }

    let reporter = Arc::new(ProgressReporter::new());
    let ctx = SyncContext::builder()
        .gateway(Arc::clone(&gateway))
        .endpoints(endpoints)
        .options(sync_options)
        .progress(reporter.as_callback())
        .shutdown_flag(shutdown_flag)
        .build()?;

    let result = ctx.run(reference, &destination).await;
    reporter.finish();
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if is_tty {
        print_summary_table(&report, &destination);
    } else {
        log_summary(&report, &destination);
    }

    Ok(())
}

fn gateway_options(args: &MirrorArgs, config: &Config) -> GatewayOptions {
    GatewayOptions {
        settings: SessionSettings {
            timeout: args
                .timeout
                .map(|secs| Duration::from_secs(secs.max(1)))
                .unwrap_or_else(|| config.timeout()),
            user_agent: config.user_agent(),
            proxy: args
                .proxy
                .clone()
                .or_else(|| config.network.proxy.clone())
                .map(ProxySettings::new),
            accept_invalid_certs: args.insecure || config.network.insecure,
        },
        requests_per_second: args.rps.or(config.network.requests_per_second),
        exclusive_session: args.exclusive_session || config.network.exclusive_session,
    }
}

fn sync_options(args: &MirrorArgs, config: &Config) -> SyncOptions {
    SyncOptions {
        concurrency: args.concurrency.unwrap_or(config.sync.concurrency).max(1),
        strategy: args.strategy.map(Into::into).unwrap_or(config.sync.strategy),
        dry_run: args.dry_run,
    }
}

/// One line of the summary table.
#[derive(Debug, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

impl SummaryRow {
    fn new(metric: &'static str, value: impl ToString) -> Self {
        Self {
            metric,
            value: value.to_string(),
        }
    }
}

fn summary_rows(report: &SyncReport, destination: &Path) -> Vec<SummaryRow> {
    let summary = &report.summary;
    let mut rows = vec![
        SummaryRow::new("Repository", &report.reference),
        SummaryRow::new("Destination", destination.display()),
        SummaryRow::new("Discovery", report.strategy),
    ];

    if report.dry_run {
        rows.push(SummaryRow::new("Entries found", report.entries_discovered));
    } else {
        rows.extend([
            SummaryRow::new("Files written", summary.files_written),
            SummaryRow::new("Empty files", summary.files_empty),
            SummaryRow::new("Directories created", summary.directories_created),
            SummaryRow::new("Skipped (existing)", summary.files_skipped_existing),
            SummaryRow::new("Skipped (binary)", summary.files_skipped_binary),
            SummaryRow::new("Total size", summary.total_size()),
        ]);
    }

    rows.push(SummaryRow::new("Errors", summary.errors));
    rows.push(SummaryRow::new(
        "Elapsed",
        format!("{:.1}s", report.elapsed.as_secs_f64()),
    ));
    if report.truncated {
        rows.push(SummaryRow::new("Listing", "truncated by remote"));
    }
    if report.exclusive_session {
        rows.push(SummaryRow::new("Session", "exclusive"));
    }
    if report.interrupted {
        rows.push(SummaryRow::new("Status", "interrupted"));
    }
    rows
}

fn print_summary_table(report: &SyncReport, destination: &Path) {
    let mut table = tabled::Table::new(summary_rows(report, destination));
    table.with(tabled::settings::Style::rounded());
    println!("\n{table}");

    let errors = &report.summary.error_messages;
    if !errors.is_empty() {
        eprintln!(
            "{}",
            style(format!("Errors ({} total):", errors.len())).yellow().bold()
        );
        for message in errors.iter().take(MAX_LISTED_ERRORS) {
            eprintln!("  - {message}");
        }
        if errors.len() > MAX_LISTED_ERRORS {
            eprintln!("  ... and {} more errors", errors.len() - MAX_LISTED_ERRORS);
        }
    }
}

fn log_summary(report: &SyncReport, destination: &Path) {
    let summary = &report.summary;
    for message in summary.error_messages.iter().take(MAX_LISTED_ERRORS) {
        tracing::error!(error = %message, "File failed");
    }
    if summary.error_messages.len() > MAX_LISTED_ERRORS {
        tracing::error!(
            additional_errors = summary.error_messages.len() - MAX_LISTED_ERRORS,
            "Additional file errors occurred"
        );
    }

    tracing::info!(
        reference = %report.reference,
        destination = %destination.display(),
        strategy = %report.strategy,
        files_written = summary.files_written,
        files_empty = summary.files_empty,
        directories_created = summary.directories_created,
        skipped_existing = summary.files_skipped_existing,
        skipped_binary = summary.files_skipped_binary,
        errors = summary.errors,
        total_size = %summary.total_size(),
        elapsed_secs = report.elapsed.as_secs_f64(),
        interrupted = report.interrupted,
        dry_run = report.dry_run,
        "Summary"
    );
}
