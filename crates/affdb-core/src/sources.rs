use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::products::SourceNetwork;
use crate::tuning::{FilterRules, KeywordTable, ScoringTable, Tuning};
use crate::ConfigError;

/// Inclusive price range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceBand {
    #[must_use]
    pub fn new(min: Decimal, max: Decimal) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.min && price <= self.max
    }
}

/// Which shopper a catalog is curated for. Drives the wrong-gender filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    #[default]
    Any,
    Women,
    Men,
}

/// How the feed client authenticates against a network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthScheme {
    /// Public feed, no credential.
    #[default]
    None,
    /// `Authorization: Bearer <credential>`.
    Bearer,
    /// HTTP basic auth with the credential as password.
    Basic { username: String },
    /// Credential passed as a query parameter.
    Query { param: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagingStyle {
    /// `?page=N`, starting at 1.
    #[default]
    PageNumber,
    /// Opaque cursor echoed back from a response field.
    Cursor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub network: SourceNetwork,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub base_url: String,
    /// Name of the env var holding the API credential. Never the secret itself.
    #[serde(default)]
    pub credential_env: Option<String>,
    #[serde(default)]
    pub auth: AuthScheme,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub paging: PagingStyle,
    /// JSON field holding the item array; `items` when unset.
    #[serde(default)]
    pub items_field: Option<String>,
    #[serde(default)]
    pub max_pages: Option<u32>,
    #[serde(default)]
    pub max_synced: Option<u64>,
    /// Request (credit) budget for one run.
    #[serde(default)]
    pub max_requests: Option<u32>,
    /// Band that earns the "reasonable price" quality point.
    pub reasonable_price: PriceBand,
    /// Absolute window; listings priced outside it are dropped outright.
    pub price_window: PriceBand,
    #[serde(default)]
    pub min_quality_score: Option<u32>,
    #[serde(default)]
    pub audience: Audience,
    /// Replaces the file-level `scoring` table for this source.
    #[serde(default)]
    pub scoring: Option<ScoringTable>,
    /// Replaces the file-level `keywords` table for this source.
    #[serde(default)]
    pub keywords: Option<KeywordTable>,
    /// Replaces the file-level `filter_rules` for this source.
    #[serde(default)]
    pub filter_rules: Option<FilterRules>,
}

impl SourceConfig {
    /// Look up this source's credential through `lookup`.
    ///
    /// Returns `Ok(None)` for sources that need no credential.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] when the source declares an
    /// auth scheme but the named env var is absent or empty.
    pub fn resolve_credential<F>(&self, lookup: F) -> Result<Option<String>, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        if self.auth == AuthScheme::None {
            return Ok(None);
        }
        let var = self.credential_env.clone().unwrap_or_default();
        match lookup(&var) {
            Ok(value) if !value.trim().is_empty() => Ok(Some(value)),
            _ => Err(ConfigError::MissingCredential {
                source_name: self.name.clone(),
                var,
            }),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub scoring: ScoringTable,
    #[serde(default)]
    pub keywords: KeywordTable,
    #[serde(default)]
    pub filter_rules: FilterRules,
}

impl SourcesFile {
    /// Tables in effect for `source`. A per-source section replaces the
    /// file-level one as a whole; the reasonable price band always comes
    /// from the source.
    #[must_use]
    pub fn tuning_for(&self, source: &SourceConfig) -> Tuning {
        let scoring = source.scoring.as_ref().unwrap_or(&self.scoring).clone();
        Tuning {
            keywords: source.keywords.as_ref().unwrap_or(&self.keywords).clone(),
            filter_rules: source
                .filter_rules
                .as_ref()
                .unwrap_or(&self.filter_rules)
                .clone(),
            scoring: scoring.for_band(source.reasonable_price),
        }
    }

    /// Enabled sources in file order.
    pub fn enabled(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Case-insensitive lookup by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&SourceConfig> {
        self.sources
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// Load and validate the source registry from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sources(path: &Path) -> Result<SourcesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SourcesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_sources(&content)
}

/// Parse and validate source registry YAML.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_sources(content: &str) -> Result<SourcesFile, ConfigError> {
    let sources_file: SourcesFile = serde_yaml::from_str(content)?;
    validate_sources(&sources_file)?;
    Ok(sources_file)
}

fn validate_scoring(owner: &str, table: &ScoringTable) -> Result<(), ConfigError> {
    if !table.rating_threshold.is_finite() || table.rating_threshold < 0.0 {
        return Err(ConfigError::Validation(format!(
            "{owner} scoring.rating_threshold must be a non-negative number"
        )));
    }
    if table.description_long_chars > table.description_rich_chars {
        return Err(ConfigError::Validation(format!(
            "{owner} scoring.description_long_chars must not exceed description_rich_chars"
        )));
    }
    Ok(())
}

fn validate_sources(sources_file: &SourcesFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();
    validate_scoring("sources file", &sources_file.scoring)?;

    for source in &sources_file.sources {
        if source.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source name must be non-empty".to_string(),
            ));
        }

        if !seen_names.insert(source.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name: '{}'",
                source.name
            )));
        }

        if !(source.base_url.starts_with("http://") || source.base_url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "source '{}' base_url must be an absolute http(s) URL",
                source.name
            )));
        }

        if source.page_size == 0 {
            return Err(ConfigError::Validation(format!(
                "source '{}' page_size must be greater than zero",
                source.name
            )));
        }

        for (label, band) in [
            ("reasonable_price", source.reasonable_price),
            ("price_window", source.price_window),
        ] {
            if band.min.is_sign_negative() || band.min > band.max {
                return Err(ConfigError::Validation(format!(
                    "source '{}' has invalid {label}: min {} / max {}",
                    source.name, band.min, band.max
                )));
            }
        }

        if let Some(scoring) = &source.scoring {
            validate_scoring(&format!("source '{}'", source.name), scoring)?;
        }

        if source.auth != AuthScheme::None
            && source
                .credential_env
                .as_deref()
                .is_none_or(|v| v.trim().is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "source '{}' declares an auth scheme but no credential_env",
                source.name
            )));
        }
    }

    Ok(())
}
