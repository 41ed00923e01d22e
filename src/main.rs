use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use content_redirection::client::InProcessLoader;
use content_redirection::fs::{Backing, HostFs};
use content_redirection::interface::RedirectionModule;
use content_redirection::layer::Resolution;
use content_redirection::manifest::StackManifest;
use content_redirection::{Config, ContentRedirection, RedirectionService, Status};

#[derive(Parser)]
#[command(
    name = "content-redirection",
    about = "Inspect layered content redirection stacks",
    version
)]
struct Cli {
    /// Configuration file (defaults to ./content-redirection.* if present)
    #[arg(long, global = true, env = "CONTENT_REDIRECTION_CONFIG")]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve logical paths through a layer stack
    Resolve {
        #[arg(long)]
        manifest: PathBuf,
        /// Host directory standing in for the original volumes
        #[arg(long)]
        original: Option<PathBuf>,
        /// Print one JSON object per path
        #[arg(long)]
        json: bool,
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// List a logical directory through a layer stack
    Ls {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        original: Option<PathBuf>,
        path: String,
    },
    /// Print every status code with its name
    StatusCodes,
    /// Bind to the service and print the negotiated version
    Version,
}

fn init_tracing(verbose: u8, json: bool) {
    let default_filter = match verbose {
        0 => "content_redirection=info,warn",
        1 => "content_redirection=debug,info",
        _ => "content_redirection=trace,debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config = Config::load_from(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Resolve { manifest, original, json, paths } => {
            let service = build_stack(&config, &manifest)?;
            for path in &paths {
                let resolution =
                    service.resolve(path).with_context(|| format!("Failed to resolve {}", path))?;
                if json {
                    let line = serde_json::json!({ "path": path, "resolution": resolution });
                    println!("{}", line);
                } else {
                    println!("{}", describe(path, &resolution, original.as_deref()));
                }
            }
        }
        Commands::Ls { manifest, original, path } => {
            let service = build_stack(&config, &manifest)?;
            let original_listing = match &original {
                Some(root) => HostFs
                    .read_dir(&host_path(root, &path))
                    .with_context(|| format!("Failed to list original {}", path))?,
                None => None,
            };
            let listing = service
                .list_directory(&path, original_listing)
                .with_context(|| format!("Failed to list {}", path))?;
            match listing {
                Some(names) => names.iter().for_each(|name| println!("{}", name)),
                None => anyhow::bail!("{}: no such directory", path),
            }
        }
        Commands::StatusCodes => {
            for status in Status::ALL {
                println!("{:>7} {}", status.code(), status.name());
            }
        }
        Commands::Version => {
            let (_, client) = bind(&config)?;
            let binding = client.binding().context("Client is not bound")?;
            println!("{} {}", config.module.name, binding.version());
            let unavailable = binding.capabilities().unavailable();
            if !unavailable.is_empty() {
                let names: Vec<String> = unavailable.iter().map(ToString::to_string).collect();
                println!("unavailable: {}", names.join(", "));
            }
        }
    }

    Ok(())
}

fn bind(
    config: &Config,
) -> anyhow::Result<(Arc<RedirectionService>, ContentRedirection<InProcessLoader>)> {
    let service = Arc::new(RedirectionService::new(config));
    let module: Arc<dyn RedirectionModule> = service.clone();
    let loader = InProcessLoader::new().with_module(config.module.name.clone(), module);

    let mut client = ContentRedirection::with_module_name(loader, config.module.name.clone());
    client.init_library().context("Failed to bind to redirection service")?;
    Ok((service, client))
}

fn build_stack(config: &Config, manifest: &Path) -> anyhow::Result<Arc<RedirectionService>> {
    let manifest = StackManifest::load(manifest)?;
    let (service, mut client) = bind(config)?;
    manifest.apply(&client).context("Failed to apply manifest")?;
    client.deinit_library()?;
    Ok(service)
}

fn host_path(root: &Path, logical: &str) -> PathBuf {
    root.join(logical.trim_start_matches('/'))
}

fn describe(path: &str, resolution: &Resolution, original: Option<&Path>) -> String {
    match resolution {
        Resolution::Redirected { layer, host_path } => {
            format!("{} -> {} [layer {}]", path, host_path.display(), layer)
        }
        Resolution::Whiteout { layer } => format!("{}: deleted [layer {}]", path, layer),
        Resolution::Absent { layer } => format!("{}: not found [layer {}]", path, layer),
        Resolution::Original { path: normalized } => match original {
            Some(root) => {
                format!("{} -> {} [original]", path, host_path(root, normalized).display())
            }
            None => format!("{} -> original", path),
        },
    }
}
