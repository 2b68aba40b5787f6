use std::process::ExitCode;
use std::sync::Arc;

use thermosync_server::configs::Settings;
use thermosync_server::run;

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::new() {
        Ok(settings) => Arc::new(settings),
        Err(error) => {
            eprintln!("Failed to load settings: {error}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                let app_name = env!("CARGO_PKG_NAME").replace('-', "_");
                let level = settings.logger.level.as_str();

                format!("{app_name}={level},tower_http={level}").into()
            }),
        )
        .init();

    if let Err(error) = run(&settings).await {
        tracing::error!("{error:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
