use ragconsole_session::{ConsoleSession, SessionConfig};
use tracing_subscriber::EnvFilter;

/// Sign in, print who we are, sign out
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = SessionConfig::from_env()?;
    println!("API: {}", config.api_url);
    let session = ConsoleSession::builder(config).build()?;

    if !session.auth().is_authenticated() {
        let username = std::env::var("RAGCONSOLE_USERNAME").expect("RAGCONSOLE_USERNAME must be set");
        let password = std::env::var("RAGCONSOLE_PASSWORD").expect("RAGCONSOLE_PASSWORD must be set");
        println!("Signing in as {}...", username);
        session.service().login(&username, &password).await?;
    }

    let user = session.service().current_user().await?;
    println!("Signed in: {:?}", user);
    println!("Admin: {}", session.auth().is_admin());

    println!("Signing out...");
    session.service().logout().await;
    session.shutdown().await;
    println!("Done");

    Ok(())
}
