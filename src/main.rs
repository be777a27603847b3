use anyhow::Result as AnyhowResult;
use clap::Parser;
use fragmentgif::config::Config;

#[tokio::main]
async fn main() -> AnyhowResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = Config::parse();
    log::debug!("{config:?}");

    if let Err(e) = fragmentgif::server::serve(config).await {
        log::error!("{e:#}");
        return Err(e);
    }
    Ok(())
}
