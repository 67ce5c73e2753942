use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use confwatch::{
    ChangeEvent, ConfigSource, FileSource, SharedHandler, SharedListener, SourceSettings,
    handler_for_extension,
};

#[derive(Parser)]
#[command(name = "confwatch")]
#[command(about = "Merge configuration files by priority and follow their changes")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to ./confwatch.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged configuration as JSON
    Dump {
        /// Files or directories, each optionally suffixed with :PRIORITY
        #[arg(required = true)]
        paths: Vec<SourceArg>,
    },

    /// Print every change as a JSON line until interrupted
    Watch {
        /// Files or directories, each optionally suffixed with :PRIORITY
        #[arg(required = true)]
        paths: Vec<SourceArg>,
    },
}

/// `PATH[:PRIORITY]` from the command line.
#[derive(Debug, Clone)]
struct SourceArg {
    path: PathBuf,
    priority: Option<u32>,
}

impl FromStr for SourceArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((path, priority)) = s.rsplit_once(':') {
            if let Ok(priority) = priority.parse::<u32>() {
                if path.is_empty() {
                    return Err(format!("missing path in '{s}'"));
                }
                return Ok(Self {
                    path: PathBuf::from(path),
                    priority: Some(priority),
                });
            }
        }

        Ok(Self {
            path: PathBuf::from(s),
            priority: None,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => SourceSettings::load_from(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => SourceSettings::load().context("failed to load settings")?,
    };
    confwatch::logging::init_with_config(&settings.logging);

    let source = FileSource::with_settings(settings);

    match cli.command {
        Commands::Dump { paths } => {
            add_sources(&source, &paths)?;
            let snapshot = source.get_configurations();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Watch { paths } => {
            let (tx, rx) = crossbeam_channel::unbounded::<ChangeEvent>();
            let listener: SharedListener = Arc::new(move |event: &ChangeEvent| {
                let _ = tx.send(event.clone());
            });

            // Attach first so the initial load is reported as creates.
            source
                .dynamic_config_handler(Some(listener))
                .context("failed to start file watcher")?;
            add_sources(&source, &paths)?;

            let stdout = std::io::stdout();
            for event in rx {
                let mut out = stdout.lock();
                writeln!(out, "{}", serde_json::to_string(&event)?)?;
                out.flush()?;
            }
        }
    }

    source.cleanup()?;
    Ok(())
}

fn add_sources(source: &FileSource, paths: &[SourceArg]) -> Result<()> {
    let default_priority = source.settings().default_file_priority;
    let by_extension: SharedHandler = Arc::new(|path: &Path, content: &[u8]| {
        handler_for_extension(path).parse(path, content)
    });

    for arg in paths {
        source
            .add_file(
                &arg.path,
                arg.priority.unwrap_or(default_priority),
                Some(by_extension.clone()),
            )
            .with_context(|| format!("failed to load {}", arg.path.display()))?;
    }

    Ok(())
}
