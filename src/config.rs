use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "htsgetd")]
#[command(about = "htsget ticket server for BAM and BCF data")]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "HTSGET_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "HTSGET_PORT", default_value = "8080")]
    pub port: u16,

    /// Base URL for ticket URLs (e.g., https://example.com)
    #[arg(long, env = "HTSGET_BASE_URL")]
    pub base_url: Option<String>,

    /// Directory containing one subdirectory per bucket
    #[arg(long, env = "HTSGET_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Soft size limit in bytes for merged transfer chunks
    #[arg(long, env = "HTSGET_BLOCK_SIZE", default_value = "1073741824")]
    pub block_size: u64,

    /// If set, restricts reads to a comma-separated list of buckets
    #[arg(long, env = "HTSGET_BUCKETS", default_value = "")]
    pub buckets: String,

    /// Require client bearer tokens and forward them in ticket URLs
    #[arg(long, env = "HTSGET_SECURE", default_value = "false")]
    pub secure: bool,

    /// Enable CORS for all origins
    #[arg(long, env = "HTSGET_CORS", default_value = "true")]
    pub cors: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }

    /// The bucket allow-list, or `None` when reads from any bucket are
    /// allowed.
    pub fn bucket_whitelist(&self) -> Option<HashSet<String>> {
        let buckets: HashSet<String> = self
            .buckets
            .split(',')
            .map(str::trim)
            .filter(|bucket| !bucket.is_empty())
            .map(String::from)
            .collect();
        if buckets.is_empty() { None } else { Some(buckets) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitelist_parses_comma_separated_buckets() {
        let config = Config::parse_from(["htsgetd", "--buckets", "a, b,,c"]);
        let whitelist = config.bucket_whitelist().unwrap();
        assert_eq!(whitelist.len(), 3);
        assert!(whitelist.contains("b"));
    }

    #[test]
    fn test_empty_whitelist_allows_everything() {
        let config = Config::parse_from(["htsgetd"]);
        assert!(config.bucket_whitelist().is_none());
    }
}
