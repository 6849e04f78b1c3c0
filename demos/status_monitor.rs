use ragconsole_session::status::format_uptime;
use ragconsole_session::{ConsoleSession, SessionConfig};
use tracing_subscriber::EnvFilter;

/// Print the API status bar as it would be rendered
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let session = ConsoleSession::builder(SessionConfig::from_env()?).build()?;
    let prober = session.prober();
    println!("Application started at {}", prober.started_at());

    prober.start();
    let mut reports = prober.subscribe();

    loop {
        tokio::select! {
            changed = reports.changed() => {
                if changed.is_err() {
                    break;
                }
                let report = reports.borrow_and_update().clone();
                if let Some(at) = report.last_update {
                    println!(
                        "{} ({}) {}ms | up {} | checked {}",
                        report.status.label(),
                        report.reason,
                        report.latency_ms,
                        format_uptime(report.uptime_secs),
                        at.format("%H:%M:%S"),
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!();
    for sample in prober.history() {
        println!("{} {:?} {} {}ms", sample.timestamp, sample.status, sample.reason, sample.latency_ms);
    }
    session.shutdown().await;
    Ok(())
}
