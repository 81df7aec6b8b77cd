use anyhow::Context;
use tracing::Subscriber;
use tracing_subscriber::{fmt::MakeWriter, EnvFilter};

/// Formats events to `sink`, filtered by `RUST_LOG` or `default_filter` when unset.
pub fn get_subscriber<Sink>(default_filter: &str, sink: Sink) -> impl Subscriber + Send + Sync
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(sink).finish()
}

/// Installs `subscriber` globally and routes `log` records (actix-web's access log) into it.
pub fn init_telemetry(subscriber: impl Subscriber + Send + Sync) -> Result<(), anyhow::Error> {
    tracing_log::LogTracer::init().context("Failed to redirect `log` records to tracing")?;
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set the global tracing subscriber")?;
    Ok(())
}
