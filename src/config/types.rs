use serde::Deserialize;

/// Main configuration structure for Reel-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub selectors: SiteProfile,
}

/// Where the listing lives
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// First listing page; pagination is discovered from it
    #[serde(rename = "root-url")]
    pub root_url: String,

    /// Maximum number of listing pages to visit (root included)
    #[serde(rename = "page-limit", default)]
    pub page_limit: Option<usize>,
}

/// HTTP behavior: identity, timeouts, politeness and retries
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// User-Agent sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Minimum time between any two outbound requests (milliseconds)
    #[serde(rename = "politeness-interval-ms")]
    pub politeness_interval_ms: u64,

    /// Attempt ceiling per URL, first try included
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles per attempt (milliseconds)
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff (milliseconds)
    #[serde(rename = "backoff-max-ms")]
    pub backoff_max_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            politeness_interval_ms: 1000,
            max_attempts: 4,
            backoff_base_ms: 500,
            backoff_max_ms: 8000,
        }
    }
}

/// A desktop browser identity; the listing serves degraded markup to bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/69.0.3497.100 Safari/537.36";

/// Worker pool and persistence retry policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of detail pages processed concurrently
    pub workers: usize,

    /// Upsert attempts per record before it is counted as failed
    #[serde(rename = "persist-attempts")]
    pub persist_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            persist_attempts: 3,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving one `{id}.jpg` per record
    #[serde(rename = "image-dir")]
    pub image_dir: String,
}

/// CSS selectors and field labels describing the source markup
///
/// Defaults match the Douban Top 250 listing and its detail pages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteProfile {
    pub paginator: String,
    pub pagination_link: String,
    pub item: String,
    pub item_link: String,
    pub rank: String,
    pub name: String,
    pub info: String,
    pub label: String,
    pub directors_label: String,
    pub writers_label: String,
    pub actors_label: String,
    pub country_label: String,
    pub genre: String,
    pub release_date: String,
    pub rating: String,
    pub image: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            paginator: "div.paginator".to_string(),
            pagination_link: "a[href]".to_string(),
            item: "div.pic".to_string(),
            item_link: "a[href]".to_string(),
            rank: "span.top250-no".to_string(),
            name: "span[property='v:itemreviewed']".to_string(),
            info: "div#info".to_string(),
            label: "span.pl".to_string(),
            directors_label: "导演".to_string(),
            writers_label: "编剧".to_string(),
            actors_label: "主演".to_string(),
            country_label: "制片国家/地区:".to_string(),
            genre: "span[property='v:genre']".to_string(),
            release_date: "span[property='v:initialReleaseDate']".to_string(),
            rating: "strong[property='v:average']".to_string(),
            image: "#mainpic img[src]".to_string(),
        }
    }
}

impl SiteProfile {
    /// All selector strings with the key they were configured under
    pub fn selectors(&self) -> [(&'static str, &str); 12] {
        [
            ("paginator", self.paginator.as_str()),
            ("pagination-link", self.pagination_link.as_str()),
            ("item", self.item.as_str()),
            ("item-link", self.item_link.as_str()),
            ("rank", self.rank.as_str()),
            ("name", self.name.as_str()),
            ("info", self.info.as_str()),
            ("label", self.label.as_str()),
            ("genre", self.genre.as_str()),
            ("release-date", self.release_date.as_str()),
            ("rating", self.rating.as_str()),
            ("image", self.image.as_str()),
        ]
    }

    /// All label strings with the key they were configured under
    pub fn labels(&self) -> [(&'static str, &str); 4] {
        [
            ("directors-label", self.directors_label.as_str()),
            ("writers-label", self.writers_label.as_str()),
            ("actors-label", self.actors_label.as_str()),
            ("country-label", self.country_label.as_str()),
        ]
    }
}
