use anyhow::Context;
use clap::Parser;
use pg_replica_auditor::output::{render_json, render_text};
use pg_replica_auditor::progress::LoggingObserver;
use pg_replica_auditor::Cli;
use replica_audit_core::{AuditState, Auditor, Side};
use replica_audit_postgresql::{describe_target, PostgresFetcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(cli.log_filter()))
        .init();

    tracing::info!("pg-replica-auditor {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Primary: {}", describe_target(&cli.connection.primary));
    tracing::info!("Replica: {}", describe_target(&cli.connection.replica));

    let config = cli.audit.to_config();

    let primary = PostgresFetcher::connect(&cli.connection.primary, Side::Primary)
        .await
        .context("Failed to connect to primary")?;
    let downstream = match PostgresFetcher::connect(&cli.connection.replica, Side::Downstream).await
    {
        Ok(fetcher) => fetcher,
        Err(e) => {
            primary.close().await;
            return Err(anyhow::Error::new(e).context("Failed to connect to replica"));
        }
    };

    let report = Auditor::new(&primary, &downstream, config)
        .with_observer(LoggingObserver::new())
        .run()
        .await;

    primary.close().await;
    downstream.close().await;

    if let Some(mismatch) = report.failure().and_then(|(_, cause)| cause.mismatch()) {
        tracing::error!("Rows at id = {} differ ({})", mismatch.id, mismatch.kind);
        for diff in &mismatch.diffs {
            tracing::error!("  {}", diff);
        }
    }

    if cli.json {
        println!("{}", render_json(&report)?);
    } else {
        print!("{}", render_text(&report));
    }

    match report.state {
        AuditState::Failed { stage, cause } => Err(anyhow::Error::new(cause)
            .context(format!("Audit of '{}' failed while {:?}", report.table, stage))),
        _ => Ok(()),
    }
}
