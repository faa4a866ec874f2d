use serde::Deserialize;

/// Main configuration structure for Catalog-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub renderer: RendererConfig,
    pub parser: ParserConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
}

/// Crawl space and retry behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Region slugs, visited in this order
    pub regions: Vec<String>,

    /// Highest category filter value (filters run from 1 to this value)
    pub max_filter: u32,

    /// Highest page number visited per (region, filter)
    pub max_page: u32,

    /// Catalog page address with `{region}`, `{filter}` and `{page}` placeholders
    pub catalog_url_template: String,

    /// Maximum attempts per catalog page before it is skipped
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Maximum attempts per listing page
    #[serde(default = "default_listing_attempts")]
    pub listing_attempts: u32,

    /// Lower bound of the politeness delay (milliseconds)
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the politeness delay (milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Hard limit on a single worker invocation (milliseconds)
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// How workers are isolated from the orchestrator
    #[serde(default)]
    pub isolation: IsolationMode,
}

impl CrawlerConfig {
    /// Builds the catalog page address for one (region, filter, page) triple
    pub fn catalog_url(&self, region_index: usize, filter: u32, page: u32) -> Option<String> {
        let region = self.regions.get(region_index)?;
        Some(expand_catalog_template(
            &self.catalog_url_template,
            region,
            filter,
            page,
        ))
    }
}

/// Substitutes the `{region}`, `{filter}` and `{page}` placeholders
pub fn expand_catalog_template(template: &str, region: &str, filter: u32, page: u32) -> String {
    template
        .replace("{region}", region)
        .replace("{filter}", &filter.to_string())
        .replace("{page}", &page.to_string())
}

/// Worker isolation mechanism
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationMode {
    /// One child process per unit of work
    #[default]
    Process,
    /// One spawned async task per unit of work
    Task,
}

/// Page renderer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RendererConfig {
    /// User agent sent with every request
    pub user_agent: String,

    /// Navigation timeout (milliseconds)
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// CSS selector matching listing links on a catalog page
    pub child_link_selector: String,

    /// Element that must be present before a listing page counts as loaded
    #[serde(default)]
    pub listing_ready_selector: Option<String>,
}

/// Listing parser configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    #[serde(rename = "field")]
    pub fields: Vec<FieldConfig>,
}

/// One extracted field
#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    /// Column name of the field
    pub name: String,

    /// Regex with one capture group, matched against the raw document
    #[serde(default)]
    pub pattern: Option<String>,

    /// CSS selector whose text (or `attr`) is the value
    #[serde(default)]
    pub selector: Option<String>,

    /// Attribute to read instead of the element text
    #[serde(default)]
    pub attr: Option<String>,

    /// A record missing this field is discarded
    #[serde(default)]
    pub required: bool,

    /// Characters removed from the extracted value
    #[serde(default)]
    pub strip: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the record file (CSV or SQLite database)
    pub records_path: String,

    /// Path to the JSON checkpoint file
    pub checkpoint_path: String,

    /// Record storage format
    #[serde(default)]
    pub format: OutputFormat,
}

/// Record storage format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Sqlite,
}

/// Remote replication target (a git hosting contents API)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RemoteConfig {
    /// Base URL of the contents API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Repository in `owner/name` form
    pub repository: String,

    /// Branch the replica is committed to
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Path of the replica inside the repository
    pub path: String,

    /// Environment variable holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_listing_attempts() -> u32 {
    3
}

fn default_min_delay_ms() -> u64 {
    5000
}

fn default_max_delay_ms() -> u64 {
    8000
}

fn default_operation_timeout_ms() -> u64 {
    90_000
}

fn default_navigation_timeout_ms() -> u64 {
    60_000
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_token_env() -> String {
    "FILE_TOKEN".to_string()
}
