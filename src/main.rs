use coverstamp::config::Config;
use coverstamp::errors::Result;
use coverstamp::service::ArtworkService;
use std::sync::Arc;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(feature = "cli")]
    {
        use clap::Parser;
        use coverstamp::cli;

        let cli = cli::Cli::parse();

        let subscriber = FmtSubscriber::builder()
            .with_max_level(cli.log_level)
            .with_writer(std::io::stderr)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("setting default subscriber failed");

        let config = Config::load(Some(cli.overrides()));
        let service = Arc::new(ArtworkService::from_config(&config)?);

        cli::run(cli.command, service, &config).await?;
    }

    #[cfg(all(not(feature = "cli"), feature = "server"))]
    {
        // Server-only mode
        let subscriber = FmtSubscriber::builder()
            .with_max_level(tracing::Level::INFO)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("setting default subscriber failed");

        let config = Config::load(None);
        let service = Arc::new(ArtworkService::from_config(&config)?);

        // Parse command line arguments manually for server address
        let address = std::env::args().nth(1).unwrap_or_default();
        let addr = coverstamp::server::parse_address(
            &address,
            config.default_host(),
            config.default_port(),
        )?;

        coverstamp::server::start_server(addr, service, config.sync.interval).await?;
    }

    #[cfg(all(not(feature = "cli"), not(feature = "server")))]
    {
        eprintln!("coverstamp was built without the 'cli' and 'server' features.");
    }

    Ok(())
}
