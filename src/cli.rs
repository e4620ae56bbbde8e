use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "rrs",
    version,
    about = "Deliverable and publication harvesting for research project pages"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Harvest(HarvestArgs),
    Project(ProjectArgs),
    Inspect(InspectArgs),
    Citation(CitationArgs),
    Query(QueryArgs),
    Export(ExportArgs),
    Import(ImportArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, default_value = ".cache/rrs")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl StoreArgs {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.cache_root.join("rrs_index.sqlite"))
    }

    pub fn manifest_dir(&self) -> PathBuf {
        self.cache_root.join("manifests")
    }
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    #[arg(long, conflicts_with = "html_file", required_unless_present = "html_file")]
    pub url: Option<String>,

    #[arg(long)]
    pub html_file: Option<PathBuf>,

    /// Base URL used to resolve relative links of a local HTML file
    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long, default_value_t = false)]
    pub no_cache: bool,
}

#[derive(Args, Debug, Clone)]
pub struct HarvestArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(long)]
    pub project_url: Option<String>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub url: String,

    #[arg(long)]
    pub max_pages: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[arg(long, default_value = ".cache/rrs")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Args, Debug, Clone)]
pub struct CitationArgs {
    /// Citation strings to parse
    pub citations: Vec<String>,

    /// Reference list file, split into individual citations
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Full-text query; without it stored publications are listed
    #[arg(long)]
    pub query: Option<String>,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Earliest publication year to list
    #[arg(long, conflicts_with = "query")]
    pub since: Option<i64>,

    /// Latest publication year to list
    #[arg(long, conflicts_with = "query")]
    pub until: Option<i64>,

    #[arg(long, default_value_t = false, conflicts_with_all = ["query", "since", "until"])]
    pub undated: bool,

    #[arg(long, default_value_t = false, conflicts_with = "query")]
    pub deliverables: bool,

    #[arg(long, default_value_t = false, conflicts_with = "query")]
    pub newest_first: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    EsBulk,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::EsBulk => "es-bulk",
        }
    }

    pub fn default_file_name(self) -> &'static str {
        match self {
            Self::Json => "publications.json",
            Self::EsBulk => "publications.ndjson",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
    pub format: ExportFormat,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value = "rrs")]
    pub index: String,

    /// Push the bulk body to this search server instead of only writing it
    #[arg(long)]
    pub es_url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub project_url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}
