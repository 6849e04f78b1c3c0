use ragconsole_session::connection::{CloseCause, TaskFault};
use ragconsole_session::{ConnectionCallbacks, ConsoleSession, SessionConfig};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

/// Follow one backend task until it finishes:
/// `cargo run --example task_progress -- <task-id>`
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let task_id = std::env::args().nth(1).ok_or("usage: task_progress <task-id>")?;
    let config = SessionConfig::from_env()?;
    let session = ConsoleSession::builder(config).build()?;

    if !session.auth().is_authenticated() {
        let username = std::env::var("RAGCONSOLE_USERNAME").expect("RAGCONSOLE_USERNAME must be set");
        let password = std::env::var("RAGCONSOLE_PASSWORD").expect("RAGCONSOLE_PASSWORD must be set");
        session.service().login(&username, &password).await?;
    }

    let (done_tx, done_rx) = oneshot::channel();
    let done_tx = std::sync::Mutex::new(Some(done_tx));

    let callbacks = ConnectionCallbacks::new()
        .on_connected(|| println!("Channel open"))
        .on_progress(|envelope| println!("Progress: {}", envelope.data.clone().unwrap_or_default()))
        .on_complete(|envelope| println!("Completed: {}", envelope.data.clone().unwrap_or_default()))
        .on_error(|fault| match fault {
            TaskFault::Reported(envelope) => println!("Task failed: {:?}", envelope.fields),
            TaskFault::ConnectionLost(reason) => println!("Connection lost: {}", reason),
        })
        .on_disconnected(move |cause: &CloseCause| {
            println!("Channel closed: {:?}", cause);
            if let Some(tx) = done_tx.lock().ok().and_then(|mut slot| slot.take()) {
                let _ = tx.send(());
            }
        });

    session.pool().connect(&task_id, callbacks).await?;
    println!("Watching task {} (Ctrl+C to stop)", task_id);

    tokio::select! {
        _ = done_rx => {}
        _ = tokio::signal::ctrl_c() => println!("Interrupted"),
    }

    session.shutdown().await;
    Ok(())
}
