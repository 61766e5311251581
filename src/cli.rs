//! Command-line interface for coverstamp.
//!
//! Handles argument parsing and runs each subcommand against an
//! [`ArtworkService`].

use crate::config::{CliOverrides, Config};
use crate::errors::{CoverstampError, Result};
use crate::numbering::{NumberingPolicy, RenumberOrder};
use crate::service::{ArtworkService, ImportOptions};
use crate::store::Template;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

/// Command-line arguments for coverstamp.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding project data.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory rendered images are written to.
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    /// Public base URL rendered images are served from.
    #[arg(long, global = true)]
    pub public_url: Option<String>,

    /// Episodes rendered at once during a batch.
    #[arg(short, long, global = true)]
    pub concurrency: Option<usize>,

    /// Extra directory of fonts to load.
    #[arg(long, global = true)]
    pub font_dir: Option<PathBuf>,

    /// Set the logging level.
    #[arg(long, short = 'L', global = true, value_name = "LEVEL", default_value_t = if cfg!(debug_assertions) { Level::DEBUG } else { Level::INFO })]
    pub log_level: Level,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a project with the default template.
    Init {
        /// Project name.
        name: String,
    },

    /// Show or change a project's template.
    Template {
        #[arg(short, long)]
        project: String,

        /// Replace the template with the contents of a JSON file.
        #[arg(long, conflicts_with = "base")]
        set: Option<PathBuf>,

        /// Set the base artwork URL or path.
        #[arg(long)]
        base: Option<String>,
    },

    /// Import episodes from a feed.
    Import {
        #[arg(short, long)]
        project: String,

        /// Feed URL or path.
        #[arg(short, long)]
        feed: String,

        /// Delete existing episodes first.
        #[arg(long)]
        replace: bool,

        /// How new episodes are numbered.
        #[arg(long, value_enum, default_value_t = Numbering::Feed)]
        numbering: Numbering,

        /// First number for `--numbering custom-start`.
        #[arg(long, default_value_t = 1)]
        start: u32,
    },

    /// Import new episodes from the project's feed.
    Sync {
        #[arg(short, long, required_unless_present = "all")]
        project: Option<String>,

        /// Sync every project with auto-sync turned on.
        #[arg(long, conflicts_with = "project")]
        all: bool,
    },

    /// Turn the periodic feed sync on or off for a project.
    AutoSync {
        #[arg(short, long)]
        project: String,

        #[arg(value_enum)]
        state: Toggle,
    },

    /// Export generated artwork.
    Export {
        #[arg(short, long)]
        project: String,

        #[command(subcommand)]
        what: Export,
    },

    /// Renumber every episode sequentially.
    Renumber {
        #[arg(short, long)]
        project: String,

        #[arg(long, value_enum, default_value_t = Order::PublishedAt)]
        order: Order,

        #[arg(long, default_value_t = 1)]
        start: u32,
    },

    /// Copy episode and season numbers from the project's feed.
    FixNumbers {
        #[arg(short, long)]
        project: String,
    },

    /// Toggle an episode's bonus flag.
    Bonus {
        #[arg(short, long)]
        episode: String,
    },

    /// List projects, or the episodes of one project.
    List {
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Generate artwork for one episode.
    Generate {
        #[arg(short, long)]
        episode: String,
    },

    /// Generate artwork for a project's episodes. Ctrl+C stops after the
    /// episodes in flight.
    Batch {
        #[arg(short, long)]
        project: String,

        /// Only these episode ids.
        #[arg(short, long, value_delimiter = ',')]
        episodes: Vec<String>,
    },

    /// Start the HTTP server.
    #[cfg(feature = "server")]
    Serve {
        /// Address to listen on, as `HOST:PORT`, `HOST` or `PORT`.
        address: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum Export {
    /// Print the feed with generated artwork swapped in, as JSON.
    Feed,
    /// Print every generated artwork URL for manual updates.
    Urls,
    /// Write all generated images into a ZIP.
    Zip {
        /// Where to write the archive; defaults to `<project-name>-artwork.zip`.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Numbering {
    Feed,
    Sequential,
    CustomStart,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Order {
    PublishedAt,
    CurrentNumber,
}

impl From<Order> for RenumberOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::PublishedAt => RenumberOrder::PublishedAt,
            Order::CurrentNumber => RenumberOrder::CurrentNumber,
        }
    }
}

fn numbering_policy(numbering: Numbering, start: u32) -> NumberingPolicy {
    match numbering {
        Numbering::Feed => NumberingPolicy::Feed,
        Numbering::Sequential => NumberingPolicy::Sequential,
        Numbering::CustomStart => NumberingPolicy::CustomStart(start),
    }
}

impl Cli {
    /// Configuration overrides taken from the global flags.
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            data_dir: self.data_dir.clone(),
            storage_dir: self.storage_dir.clone(),
            public_url: self.public_url.clone(),
            concurrency: self.concurrency,
            port: None,
            font_dir: self.font_dir.clone(),
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Executes a subcommand.
#[cfg_attr(not(feature = "server"), allow(unused_variables))]
pub async fn run(command: Command, service: Arc<ArtworkService>, config: &Config) -> Result<()> {
    let stores = service.stores().clone();

    match command {
        Command::Init { name } => {
            let project = stores.projects.create_project(&name).await?;
            println!("{}", project.id);
        }
        Command::Template { project, set, base } => {
            if let Some(path) = set {
                let template: Template = serde_json::from_slice(&tokio::fs::read(&path).await?)?;
                template.style.colors()?;
                stores.templates.save_template(&project, &template).await?;
            } else if let Some(base) = base {
                service.set_base_artwork(&project, &base).await?;
            }

            let template = stores
                .templates
                .get_template(&project)
                .await?
                .ok_or_else(|| CoverstampError::NotFound(format!("template for project {}", project)))?;
            print_json(&template)?;
        }
        Command::Import {
            project,
            feed,
            replace,
            numbering,
            start,
        } => {
            let options = ImportOptions {
                replace,
                numbering: numbering_policy(numbering, start),
            };
            let summary = service.import_feed(&project, &feed, options).await?;
            print_json(&summary)?;
        }
        Command::Sync {
            project: Some(project),
            ..
        } => print_json(&service.sync_feed(&project).await?)?,
        Command::Sync { project: None, .. } => print_json(&service.sync_all().await?)?,
        Command::AutoSync { project, state } => {
            let project = service
                .set_auto_sync(&project, matches!(state, Toggle::On))
                .await?;
            println!("{} auto-sync={}", project.id, project.auto_sync);
        }
        Command::Export { project, what } => match what {
            Export::Feed => print_json(&service.export_feed(&project).await?)?,
            Export::Urls => print!("{}", service.artwork_urls(&project).await?),
            Export::Zip { output } => {
                let archive = service.export_archive(&project).await?;
                let path = output.unwrap_or_else(|| PathBuf::from(&archive.filename));
                tokio::fs::write(&path, &archive.bytes).await?;
                tracing::info!("Wrote {} images to {}.", archive.file_count, path.display());
            }
        },
        Command::Renumber {
            project,
            order,
            start,
        } => {
            let changed = service.auto_number(&project, order.into(), start).await?;
            tracing::info!("Renumbered {} episodes.", changed);
        }
        Command::FixNumbers { project } => print_json(&service.fix_numbers(&project).await?)?,
        Command::Bonus { episode } => {
            let episode = service.toggle_bonus(&episode).await?;
            println!("{} bonus={}", episode.id, episode.bonus);
        }
        Command::List { project: None } => {
            for project in stores.projects.list_projects().await? {
                println!("{}\t{}", project.id, project.name);
            }
        }
        Command::List {
            project: Some(project),
        } => {
            for episode in stores.episodes.list_episodes(&project).await? {
                println!(
                    "{}\t{}\t{}{}\t{}",
                    episode.id,
                    episode.number.as_deref().unwrap_or("-"),
                    episode.title,
                    if episode.bonus { " (bonus)" } else { "" },
                    episode.generated_artwork_url.as_deref().unwrap_or(""),
                );
            }
        }
        Command::Generate { episode } => {
            let url = service.generate_single(&episode).await?;
            println!("{}", url);
        }
        Command::Batch { project, episodes } => {
            let ids = (!episodes.is_empty()).then_some(episodes);

            let canceller = {
                let service = Arc::clone(&service);
                let project = project.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::warn!("Ctrl+C received, stopping after the episodes in flight.");
                        service.cancel_batch(&project);
                    }
                })
            };

            let result = service.generate_batch(&project, ids).await;
            canceller.abort();

            print_json(&result?)?;
        }
        #[cfg(feature = "server")]
        Command::Serve { address } => {
            let addr = crate::server::parse_address(
                address.as_deref().unwrap_or_default(),
                config.default_host(),
                config.default_port(),
            )?;
            crate::server::start_server(addr, service, config.sync.interval).await?;
        }
    }

    Ok(())
}
