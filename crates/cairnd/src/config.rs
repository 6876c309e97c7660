//! TOML configuration for the cairn daemon.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cairn_schema::LinkCodec;
use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Data directory and listen addresses.
    pub node: NodeSection,
    /// Provider identity and retrieval addresses.
    pub provider: ProviderSection,
    /// Chain publication settings.
    pub chain: ChainSection,
    /// Batching thresholds.
    pub batch: BatchSection,
    /// Announcement endpoints.
    pub announce: AnnounceSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[node]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Directory for persistent data (chain database, provider key).
    pub data_dir: PathBuf,
    /// Address the chain is served from (`GET /head`, `GET /<cid>`).
    pub listen_addr: String,
    /// Address the ingest API listens on (`POST /publish`, `POST /retract`).
    pub ingest_addr: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|h| h.join(".cairn"))
            .unwrap_or_else(|| PathBuf::from(".cairn"));
        Self {
            data_dir,
            listen_addr: "0.0.0.0:3104".to_string(),
            ingest_addr: "127.0.0.1:3105".to_string(),
        }
    }
}

/// `[provider]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    /// Path to the hex-encoded ed25519 seed. Generated on first start if
    /// absent. Defaults to `<data_dir>/provider.key`.
    pub key_file: Option<PathBuf>,
    /// Multiaddrs from which the announced content is retrievable.
    pub addrs: Vec<String>,
    /// Hex-encoded opaque metadata copied into each advertisement.
    pub metadata: Option<String>,
}

/// `[chain]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChainSection {
    /// Multihashes per entry-chunk block.
    pub ad_entries_chunk_size: Option<usize>,
    /// Block codec: `"dag-json"` (default) or `"dag-cbor"`.
    pub link_codec: Option<LinkCodec>,
    /// Announcement topic name.
    pub topic: Option<String>,
    /// HTTP multiaddrs the chain is announced as available from.
    pub publisher_http_addrs: Vec<String>,
}

/// `[batch]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    /// Large/small cut-off for batching.
    pub count_threshold: Option<usize>,
    /// Hard upper bound of multihashes per flushed batch.
    pub max_mhs_per_advertisement: Option<usize>,
    /// Upper bound on batch staleness, in seconds.
    pub max_delay_secs: Option<u64>,
}

/// `[announce]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnnounceSection {
    /// HTTP endpoints to POST head announcements to. Empty disables
    /// announcements; indexers then poll the head endpoint.
    pub endpoints: Vec<String>,
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                let config: CliConfig = toml::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Effective provider key file path.
    pub fn provider_key_file(&self) -> PathBuf {
        self.provider
            .key_file
            .clone()
            .unwrap_or_else(|| self.node.data_dir.join("provider.key"))
    }

    /// Effective chain database directory.
    pub fn chain_dir(&self) -> PathBuf {
        self.node.data_dir.join("chain")
    }

    /// Effective entry-chunk size.
    pub fn ad_entries_chunk_size(&self) -> usize {
        self.chain
            .ad_entries_chunk_size
            .unwrap_or(cairn_chain::DEFAULT_AD_ENTRIES_CHUNK_SIZE)
    }

    /// Effective block codec.
    pub fn link_codec(&self) -> LinkCodec {
        self.chain.link_codec.unwrap_or_default()
    }

    /// Effective announcement topic.
    pub fn topic(&self) -> String {
        self.chain
            .topic
            .clone()
            .unwrap_or_else(|| "/cairn/ingest/mainnet".to_string())
    }

    /// Effective advertisement metadata bytes.
    pub fn metadata(&self) -> anyhow::Result<Vec<u8>> {
        match &self.provider.metadata {
            Some(hex_str) => Ok(hex::decode(hex_str)?),
            None => Ok(Vec::new()),
        }
    }

    /// Effective large/small batching cut-off.
    pub fn count_threshold(&self) -> usize {
        self.batch.count_threshold.unwrap_or(1000)
    }

    /// Effective per-batch multihash bound.
    pub fn max_mhs_per_advertisement(&self) -> usize {
        self.batch
            .max_mhs_per_advertisement
            .unwrap_or(cairn_batch::DEFAULT_MAX_MHS_PER_ADVERTISEMENT)
    }

    /// Effective batch staleness bound.
    pub fn max_delay(&self) -> Duration {
        self.batch
            .max_delay_secs
            .map(Duration::from_secs)
            .unwrap_or(cairn_batch::DEFAULT_MAX_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[node]
data_dir = "/tmp/cairn-test"
listen_addr = "127.0.0.1:4104"
ingest_addr = "127.0.0.1:4105"

[provider]
key_file = "/tmp/cairn-test/key"
addrs = ["/dns4/provider.example/tcp/443/https"]
metadata = "cafe"

[chain]
ad_entries_chunk_size = 64
link_codec = "dag-cbor"
topic = "/cairn/ingest/testnet"
publisher_http_addrs = ["/dns4/pub.example/tcp/3104/http"]

[batch]
count_threshold = 50
max_mhs_per_advertisement = 500
max_delay_secs = 5

[announce]
endpoints = ["https://indexer.example/announce"]

[log]
level = "debug"
"#;

        let config = CliConfig::from_toml(toml).unwrap();
        assert_eq!(config.node.data_dir, PathBuf::from("/tmp/cairn-test"));
        assert_eq!(config.node.listen_addr, "127.0.0.1:4104");
        assert_eq!(config.node.ingest_addr, "127.0.0.1:4105");
        assert_eq!(config.provider_key_file(), PathBuf::from("/tmp/cairn-test/key"));
        assert_eq!(config.provider.addrs.len(), 1);
        assert_eq!(config.metadata().unwrap(), vec![0xca, 0xfe]);
        assert_eq!(config.ad_entries_chunk_size(), 64);
        assert_eq!(config.link_codec(), LinkCodec::DagCbor);
        assert_eq!(config.topic(), "/cairn/ingest/testnet");
        assert_eq!(config.count_threshold(), 50);
        assert_eq!(config.max_mhs_per_advertisement(), 500);
        assert_eq!(config.max_delay(), Duration::from_secs(5));
        assert_eq!(config.announce.endpoints.len(), 1);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = CliConfig::from_toml("").unwrap();
        assert_eq!(config.node.listen_addr, "0.0.0.0:3104");
        assert_eq!(config.link_codec(), LinkCodec::DagJson);
        assert_eq!(config.ad_entries_chunk_size(), cairn_chain::DEFAULT_AD_ENTRIES_CHUNK_SIZE);
        assert_eq!(
            config.max_mhs_per_advertisement(),
            cairn_batch::DEFAULT_MAX_MHS_PER_ADVERTISEMENT
        );
        assert_eq!(config.max_delay(), cairn_batch::DEFAULT_MAX_DELAY);
        assert!(config.metadata().unwrap().is_empty());
        assert!(config.announce.endpoints.is_empty());
        assert_eq!(config.provider_key_file(), config.node.data_dir.join("provider.key"));
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[batch]
count_threshold = 7
"#;
        let config = CliConfig::from_toml(toml).unwrap();
        assert_eq!(config.count_threshold(), 7);
        // Unspecified sections get defaults.
        assert_eq!(config.node.ingest_addr, "127.0.0.1:3105");
        assert_eq!(config.topic(), "/cairn/ingest/mainnet");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cairn.toml");
        std::fs::write(
            &path,
            r#"
[node]
data_dir = "/tmp/cairn-file-test"
"#,
        )
        .unwrap();

        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config.node.data_dir, PathBuf::from("/tmp/cairn-file-test"));
        assert_eq!(config.chain_dir(), PathBuf::from("/tmp/cairn-file-test/chain"));
    }

    #[test]
    fn test_rejects_bad_metadata_hex() {
        let toml = r#"
[provider]
metadata = "zz"
"#;
        let config = CliConfig::from_toml(toml).unwrap();
        assert!(config.metadata().is_err());
    }
}
