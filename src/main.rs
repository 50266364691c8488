use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};

use crate::core::{db::ParticipantDb, settings::Settings};

mod core;
mod error;
mod import;
mod util;
mod web;

#[derive(Parser, Debug)]
#[command(name = "badgescan")]
#[command(version = "0.1")]
#[command(about = "Tracks hackers and the activities they check into at an in-person event.", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: RunType,
}

#[derive(clap::Args, Debug)]
struct StoreArgs {
    /// Location of a Json settings file.
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Location of the SQLite database, overriding the settings file.
    #[arg(short, long)]
    database: Option<PathBuf>,
}

impl StoreArgs {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::load(self.settings.as_deref())?;
        if self.database.is_some() {
            settings.database = self.database.clone();
        }

        Ok(settings)
    }
}

#[derive(Subcommand, Debug)]
enum RunType {
    /// Create the database and its tables if they do not exist yet.
    Init {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Serve the hacker and scan API over HTTP.
    Serve {
        #[command(flatten)]
        store: StoreArgs,

        /// Port to listen on, overriding the settings file.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Register every hacker (and their scans) from a Json file.
    /// Entries that clash with existing hackers are skipped and logged.
    Import {
        #[command(flatten)]
        store: StoreArgs,

        import_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        RunType::Init { store } => {
            let settings = store.settings()?;
            ParticipantDb::init(&settings.database()).await?;
            log::info!("Database ready at {}", settings.database().display());
        }
        RunType::Serve { store, port } => {
            let mut settings = store.settings()?;
            if port.is_some() {
                settings.web_port = port;
            }

            let db = Arc::new(ParticipantDb::init(&settings.database()).await?);
            log::info!("Loaded database {}", settings.database().display());

            web::run_http_server(db, settings.web_port()).await?;
        }
        RunType::Import { store, import_file } => {
            let settings = store.settings()?;
            let db = ParticipantDb::init(&settings.database()).await?;

            let summary = import::import_file(&db, &import_file).await?;
            log::info!(
                "{} new hackers added successfully with {} total new scans ({} hackers and {} scans skipped)",
                summary.participants,
                summary.scans,
                summary.skipped_participants,
                summary.skipped_scans
            );
        }
    }

    Ok(())
}
