//! hello-app server: loads settings from env (.env honored), resolves the database dialect, serves API and UI.

use hello_app::Settings;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hello_app=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    hello_app::run(settings).await
}
