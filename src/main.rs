use anyhow::Context;
use multiload::{
    telemetry::{get_subscriber, init_telemetry},
    Config,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry(get_subscriber("info", std::io::stdout))?;

    if let Err(e) = _main().await {
        tracing::error!(
            error.msg = %e,
            error.details = ?e,
            "The server is exiting due to an error"
        );
        return Err(e);
    }

    Ok(())
}

async fn _main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    tracing::debug!(?config, "Loaded configuration");

    multiload::run(config).await.context("Failed to start server")
}
