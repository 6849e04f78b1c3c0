use ragconsole_session::{ConsoleSession, SessionConfig};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Keep the dashboard snapshot live and print it whenever it changes
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let session = ConsoleSession::builder(SessionConfig::from_env()?).build()?;
    let feed = session.feed();

    feed.mount();
    let mut updates = feed.subscribe();
    let mut connected = feed.watch_connected();

    // Ask for fresh numbers once the channel is up
    tokio::spawn({
        let feed = feed.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            if let Err(e) = feed.request_stats().await {
                println!("Could not request stats: {}", e);
            }
        }
    });

    println!("Watching dashboard (Ctrl+C to stop)");
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                println!(
                    "documents={} sessions={} queries={} users={} recent={:?}",
                    snapshot.documents.total,
                    snapshot.sessions.total,
                    snapshot.queries.total,
                    snapshot.users.total,
                    snapshot.recent_documents.iter().map(|d| d.filename.as_str()).collect::<Vec<_>>(),
                );
            }
            changed = connected.changed() => {
                if changed.is_err() {
                    break;
                }
                let live = *connected.borrow_and_update();
                println!("Live channel: {}", if live { "up" } else { "down, polling" });
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.shutdown().await;
    Ok(())
}
