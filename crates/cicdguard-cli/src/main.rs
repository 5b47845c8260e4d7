mod display;

use anyhow::{Context, Result};
use cicdguard_core::config::DEFAULT_CONFIG_PATH;
use cicdguard_core::ingest::{self, IngestOptions};
use cicdguard_core::parser::WorkflowParser;
use cicdguard_core::providers::{GitHubClient, JenkinsClient, JfrogClient};
use cicdguard_core::report::{self, ScanReport};
use cicdguard_core::schema::{GithubOrganization, GithubRepository, Visibility};
use cicdguard_core::{GraphStore, GuardConfig, Inventory, MemoryStore, OpenStore, Platform, SqliteStore};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "cicdguard",
    version,
    about = "cicdguard: CI/CD attack-surface inventory",
    long_about = "Scan GitHub, Jenkins and JFrog, store what you find as a graph of typed entities, \
                  and flag configuration weaknesses against a fixed rule catalog."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite inventory file
    #[arg(long, global = true, default_value = ".cicdguard/inventory.db")]
    db: PathBuf,

    /// TOML config file (defaults to .cicdguard/config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep the inventory in memory for this run only
    #[arg(long, global = true)]
    memory: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a GitHub organization and one of its repositories
    Github {
        #[arg(long)]
        org: String,

        #[arg(long)]
        repo: String,
    },

    /// Ingest local workflow files for a repository without calling GitHub
    Workflows {
        /// Workflow file or directory containing workflow files
        #[arg(default_value = ".github/workflows/")]
        path: PathBuf,

        /// Repository the workflows belong to
        #[arg(long)]
        repo: String,

        /// Owning organization
        #[arg(long)]
        org: Option<String>,

        /// Repository visibility; defaults to the stored value, if any
        #[arg(long, value_enum)]
        visibility: Option<VisibilityArg>,
    },

    /// Scan the configured Jenkins server
    Jenkins,

    /// Scan the configured JFrog platform
    Jfrog,

    /// List recorded vulnerabilities
    Vulns {
        #[arg(short, long, value_enum, default_value = "text")]
        format: VulnFormat,
    },

    /// Export the inventory graph
    Graph {
        #[arg(short, long, value_enum, default_value = "mermaid")]
        format: GraphFormat,
    },

    /// Delete stored nodes (and their edges) for a platform
    Reset {
        #[arg(long, value_enum, default_value = "all")]
        platform: ResetScope,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum VisibilityArg {
    Public,
    Private,
    Internal,
}

impl From<VisibilityArg> for Visibility {
    fn from(arg: VisibilityArg) -> Self {
        match arg {
            VisibilityArg::Public => Visibility::Public,
            VisibilityArg::Private => Visibility::Private,
            VisibilityArg::Internal => Visibility::Internal,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum VulnFormat {
    Text,
    Json,
    Sarif,
}

#[derive(Clone, Copy, ValueEnum)]
enum GraphFormat {
    Dot,
    Mermaid,
}

#[derive(Clone, Copy, ValueEnum)]
enum ResetScope {
    Github,
    Jenkins,
    Jfrog,
    All,
}

impl ResetScope {
    fn platforms(self) -> Vec<Platform> {
        match self {
            ResetScope::Github => vec![Platform::GitHub],
            ResetScope::Jenkins => vec![Platform::Jenkins],
            ResetScope::Jfrog => vec![Platform::Jfrog],
            ResetScope::All => Platform::ALL.to_vec(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    if cli.memory {
        run(cli.command, Inventory::new(MemoryStore::new()), &config).await
    } else {
        let store = SqliteStore::open(&cli.db)
            .with_context(|| format!("Failed to open inventory at {}", cli.db.display()))?;
        run(cli.command, Inventory::new(store), &config).await
    }
}

fn load_config(explicit: Option<&Path>) -> Result<GuardConfig> {
    let default = Path::new(DEFAULT_CONFIG_PATH);
    let path = match explicit {
        Some(path) => Some(path),
        None if default.is_file() => Some(default),
        None => None,
    };
    GuardConfig::load(path).context("Failed to load configuration")
}

async fn run<S: GraphStore>(command: Commands, mut inventory: Inventory<S>, config: &GuardConfig) -> Result<()> {
    let options = IngestOptions::from(&config.scan);

    match command {
        Commands::Github { org, repo } => {
            let client = GitHubClient::new(config)?;
            let snapshot = client.snapshot(&org, &repo).await?;
            let summary = ingest::ingest_github(&mut inventory, &snapshot, options)?;
            display::print_ingest_summary(&format!("GitHub {}/{}", org, repo), &summary);
        }
        Commands::Workflows { path, repo, org, visibility } => {
            let visibility = visibility.map_or(Visibility::Unknown, Visibility::from);
            cmd_workflows(&mut inventory, &path, repo, org, visibility, options)?;
        }
        Commands::Jenkins => {
            let client = JenkinsClient::new(config)?;
            let snapshot = client.snapshot().await?;
            let summary = ingest::ingest_jenkins(&mut inventory, &snapshot, options)?;
            display::print_ingest_summary(&format!("Jenkins {}", snapshot.server.url), &summary);
        }
        Commands::Jfrog => {
            let client = JfrogClient::new(config)?;
            let snapshot = client.snapshot().await?;
            let summary = ingest::ingest_jfrog(&mut inventory, &snapshot, options)?;
            display::print_ingest_summary(&format!("JFrog {}", snapshot.server.url), &summary);
        }
        Commands::Vulns { format } => {
            let scan = ScanReport::build(&inventory)?;
            match format {
                VulnFormat::Text => display::print_vulnerabilities(&scan),
                VulnFormat::Json => println!("{}", serde_json::to_string_pretty(&scan)?),
                VulnFormat::Sarif => {
                    println!("{}", serde_json::to_string_pretty(&report::to_sarif(&scan))?)
                }
            }
        }
        Commands::Graph { format } => {
            let rendered = match format {
                GraphFormat::Dot => report::to_dot(&inventory)?,
                GraphFormat::Mermaid => report::to_mermaid(&inventory)?,
            };
            println!("{}", rendered);
        }
        Commands::Reset { platform } => {
            for platform in platform.platforms() {
                let removed = inventory.reset_platform(platform)?;
                display::print_reset(platform, removed);
            }
        }
    }

    Ok(())
}

fn cmd_workflows<S: GraphStore>(
    inventory: &mut Inventory<S>,
    path: &Path,
    repo: String,
    org: Option<String>,
    visibility: Visibility,
    options: IngestOptions,
) -> Result<()> {
    let files = discover_workflow_files(path)?;
    if files.is_empty() {
        anyhow::bail!(
            "No workflow files found at '{}'. \
            Make sure the path points to a YAML workflow file or directory.",
            path.display()
        );
    }

    let mut docs = Vec::new();
    for file in &files {
        match WorkflowParser::parse_file(file) {
            Ok(doc) => docs.push(doc),
            Err(err) => warn!(file = %file.display(), error = %format!("{:#}", err), "Skipping workflow"),
        }
    }

    let organization = org.map(|name| GithubOrganization {
        name,
        ..Default::default()
    });
    let repository = GithubRepository {
        name: repo,
        visibility,
        ..Default::default()
    };

    let summary = ingest::ingest_workflows(inventory, organization.as_ref(), &repository, &docs, options)?;
    display::print_ingest_summary(&format!("workflows of {}", repository.name), &summary);
    Ok(())
}

fn discover_workflow_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    if path.is_dir() {
        let mut files: Vec<PathBuf> = glob::glob(&format!("{}/**/*.yml", path.display()))
            .context("Failed to read glob pattern")?
            .chain(
                glob::glob(&format!("{}/**/*.yaml", path.display()))
                    .context("Failed to read glob pattern")?,
            )
            .filter_map(|r| r.ok())
            .collect();
        files.sort();
        return Ok(files);
    }

    anyhow::bail!("Path '{}' does not exist", path.display());
}
