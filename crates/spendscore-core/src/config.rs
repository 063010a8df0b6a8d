//! Scoring configuration: vocabularies, dataset filters and training knobs
//!
//! Everything the tokenizer, weighting engine and cleaners treat as fixed
//! domain knowledge lives here as immutable data handed to them explicitly.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Explicit override path, or the override in the data dir
//!    (~/.local/share/spendscore/config/vocabulary.toml)
//! 2. Fall back to embedded defaults (compiled into binary)

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/vocabulary.toml");

/// Word lists and label mappings
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    pub stopwords: HashSet<String>,
    pub generic_tokens: HashSet<String>,
    pub strong_tokens: HashSet<String>,
    pub allowed_categories: HashSet<String>,
    /// (alias, category) in match priority order
    pub category_aliases: Vec<(String, String)>,
    /// Category -> hand-authored keywords, in weight-decay order
    pub curated_keywords: BTreeMap<String, Vec<String>>,
}

impl Vocabulary {
    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    pub fn is_generic(&self, token: &str) -> bool {
        self.generic_tokens.contains(token)
    }

    pub fn is_strong(&self, token: &str) -> bool {
        self.strong_tokens.contains(token)
    }

    pub fn is_allowed_category(&self, category: &str) -> bool {
        self.allowed_categories.contains(category)
    }

    /// Exact alias lookup (first entry wins on duplicates)
    pub fn alias(&self, key: &str) -> Option<&str> {
        self.category_aliases
            .iter()
            .find(|(alias, _)| alias == key)
            .map(|(_, category)| category.as_str())
    }
}

/// Row-level filters applied while cleaning datasets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetFilters {
    pub min_amount: f64,
    pub max_amount: f64,
    pub min_description_tokens: usize,
    pub english_like_ratio: f64,
    pub min_category_count: usize,
    pub max_category_count: usize,
    pub min_spending_category_count: usize,
    pub min_spending_months: usize,
    pub outlier_lower_quantile: f64,
    pub outlier_upper_quantile: f64,
    pub seed: u64,
}

impl Default for DatasetFilters {
    fn default() -> Self {
        Self {
            min_amount: 1.0,
            max_amount: 5_000_000_000.0,
            min_description_tokens: 1,
            english_like_ratio: 0.9,
            min_category_count: 55,
            max_category_count: 400,
            min_spending_category_count: 80,
            min_spending_months: 6,
            outlier_lower_quantile: 0.01,
            outlier_upper_quantile: 0.99,
            seed: 42,
        }
    }
}

/// Knobs for model construction and evaluation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingParams {
    /// Tokens seen fewer times than this in a category get no weight
    pub token_min_count: u32,
    /// Learned weights kept per category
    pub token_top_n: usize,
    /// Keywords listed per category in the exported artifact
    pub keyword_top_n: usize,
    /// Categories below this many rows get no learned prior
    pub min_category_samples: usize,
    pub curated_weight_start: f64,
    pub curated_weight_step: f64,
    pub curated_weight_floor: f64,
    pub synthetic_prior: f64,
    pub test_frac: f64,
    pub top_k: usize,
    pub confusion_top_n: usize,
    pub robust_min_samples: usize,
    pub split_seed: u64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            token_min_count: 2,
            token_top_n: 120,
            keyword_top_n: 50,
            min_category_samples: 25,
            curated_weight_start: 0.15,
            curated_weight_step: 0.005,
            curated_weight_floor: 0.05,
            synthetic_prior: 0.01,
            test_frac: 0.2,
            top_k: 3,
            confusion_top_n: 8,
            robust_min_samples: 5,
            split_seed: 42,
        }
    }
}

/// Full configuration handed to the engine
///
/// `Default` is an empty vocabulary with default thresholds; use
/// [`ScoringConfig::embedded`] for the shipped word lists.
#[derive(Debug, Clone, Default)]
pub struct ScoringConfig {
    pub vocabulary: Vocabulary,
    pub filters: DatasetFilters,
    pub training: TrainingParams,
}

impl ScoringConfig {
    /// The configuration compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// Load configuration (override first, then default)
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let (content, _) = read_config_source(override_path)?;
        Self::from_toml_str(&content)
    }

    /// Parse config from TOML content
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        let vocabulary = raw
            .vocabulary
            .map(|v| Vocabulary {
                stopwords: v.stopwords.into_iter().collect(),
                generic_tokens: v.generic_tokens.into_iter().collect(),
                strong_tokens: v.strong_tokens.into_iter().collect(),
                allowed_categories: v.allowed_categories.into_iter().collect(),
                category_aliases: v.category_aliases,
                curated_keywords: v.curated_keywords,
            })
            .unwrap_or_default();

        let mut filters = DatasetFilters::default();
        if let Some(f) = raw.filters {
            apply(&mut filters.min_amount, f.min_amount);
            apply(&mut filters.max_amount, f.max_amount);
            apply(&mut filters.min_description_tokens, f.min_description_tokens);
            apply(&mut filters.english_like_ratio, f.english_like_ratio);
            apply(&mut filters.min_category_count, f.min_category_count);
            apply(&mut filters.max_category_count, f.max_category_count);
            apply(
                &mut filters.min_spending_category_count,
                f.min_spending_category_count,
            );
            apply(&mut filters.min_spending_months, f.min_spending_months);
            apply(&mut filters.outlier_lower_quantile, f.outlier_lower_quantile);
            apply(&mut filters.outlier_upper_quantile, f.outlier_upper_quantile);
            apply(&mut filters.seed, f.seed);
        }

        let mut training = TrainingParams::default();
        if let Some(t) = raw.training {
            apply(&mut training.token_min_count, t.token_min_count);
            apply(&mut training.token_top_n, t.token_top_n);
            apply(&mut training.keyword_top_n, t.keyword_top_n);
            apply(&mut training.min_category_samples, t.min_category_samples);
            apply(&mut training.curated_weight_start, t.curated_weight_start);
            apply(&mut training.curated_weight_step, t.curated_weight_step);
            apply(&mut training.curated_weight_floor, t.curated_weight_floor);
            apply(&mut training.synthetic_prior, t.synthetic_prior);
            apply(&mut training.test_frac, t.test_frac);
            apply(&mut training.top_k, t.top_k);
            apply(&mut training.confusion_top_n, t.confusion_top_n);
            apply(&mut training.robust_min_samples, t.robust_min_samples);
            apply(&mut training.split_seed, t.split_seed);
        }

        if !(0.0..=1.0).contains(&training.test_frac) {
            return Err(Error::Config(format!(
                "test_frac must be within [0, 1], got {}",
                training.test_frac
            )));
        }

        Ok(Self {
            vocabulary,
            filters,
            training,
        })
    }
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Embedded,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Embedded => write!(f, "embedded defaults"),
        }
    }
}

/// Resolve which source `load` would read, without parsing it
pub fn resolve_config_source(override_path: Option<&Path>) -> ConfigSource {
    let candidate = match override_path {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path(),
    };
    match candidate {
        Some(path) if path.exists() => ConfigSource::File(path),
        _ => ConfigSource::Embedded,
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("spendscore").join("config").join("vocabulary.toml"))
}

fn read_config_source(override_path: Option<&Path>) -> Result<(String, ConfigSource)> {
    match resolve_config_source(override_path) {
        ConfigSource::File(path) => {
            let content = fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;
            tracing::debug!(path = %path.display(), "Loaded config override");
            Ok((content, ConfigSource::File(path)))
        }
        ConfigSource::Embedded => Ok((DEFAULT_CONFIG.to_string(), ConfigSource::Embedded)),
    }
}

fn apply<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    vocabulary: Option<RawVocabulary>,
    filters: Option<RawFilters>,
    training: Option<RawTraining>,
}

#[derive(Debug, Deserialize)]
struct RawVocabulary {
    #[serde(default)]
    stopwords: Vec<String>,
    #[serde(default)]
    generic_tokens: Vec<String>,
    #[serde(default)]
    strong_tokens: Vec<String>,
    #[serde(default)]
    allowed_categories: Vec<String>,
    #[serde(default)]
    category_aliases: Vec<(String, String)>,
    #[serde(default)]
    curated_keywords: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawFilters {
    min_amount: Option<f64>,
    max_amount: Option<f64>,
    min_description_tokens: Option<usize>,
    english_like_ratio: Option<f64>,
    min_category_count: Option<usize>,
    max_category_count: Option<usize>,
    min_spending_category_count: Option<usize>,
    min_spending_months: Option<usize>,
    outlier_lower_quantile: Option<f64>,
    outlier_upper_quantile: Option<f64>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawTraining {
    token_min_count: Option<u32>,
    token_top_n: Option<usize>,
    keyword_top_n: Option<usize>,
    min_category_samples: Option<usize>,
    curated_weight_start: Option<f64>,
    curated_weight_step: Option<f64>,
    curated_weight_floor: Option<f64>,
    synthetic_prior: Option<f64>,
    test_frac: Option<f64>,
    top_k: Option<usize>,
    confusion_top_n: Option<usize>,
    robust_min_samples: Option<usize>,
    split_seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_default_config() {
        let config = ScoringConfig::embedded().unwrap();
        assert!(config.vocabulary.is_stopword("the"));
        assert!(config.vocabulary.is_generic("subscription"));
        assert!(config.vocabulary.is_strong("rent"));
        assert!(config.vocabulary.is_allowed_category("Eating Out"));
        assert_eq!(config.vocabulary.alias("mortgage"), Some("Rent"));
        assert_eq!(config.filters, DatasetFilters::default());
        assert_eq!(config.training, TrainingParams::default());
    }

    #[test]
    fn test_curated_keywords_keep_order() {
        let config = ScoringConfig::embedded().unwrap();
        let rent = &config.vocabulary.curated_keywords["Rent"];
        assert_eq!(rent[0], "rent");
        assert_eq!(rent[1], "landlord");
        assert_eq!(config.vocabulary.curated_keywords.len(), 20);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = ScoringConfig::from_toml_str(
            r#"
            [vocabulary]
            stopwords = ["zzz"]

            [training]
            top_k = 5
            "#,
        )
        .unwrap();

        assert!(config.vocabulary.is_stopword("zzz"));
        assert!(!config.vocabulary.is_stopword("the"));
        assert!(config.vocabulary.curated_keywords.is_empty());
        assert_eq!(config.training.top_k, 5);
        assert_eq!(config.training.token_top_n, 120);
        assert_eq!(config.filters.seed, 42);
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = ScoringConfig::from_toml_str("").unwrap();
        assert!(config.vocabulary.stopwords.is_empty());
        assert_eq!(config.training, TrainingParams::default());
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let result = ScoringConfig::from_toml_str("[training\ntop_k = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_out_of_range_test_frac_rejected() {
        let result = ScoringConfig::from_toml_str("[training]\ntest_frac = 1.5");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[filters]\nmin_category_count = 3").unwrap();

        let config = ScoringConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.filters.min_category_count, 3);
        assert_eq!(
            resolve_config_source(Some(file.path())),
            ConfigSource::File(file.path().to_path_buf())
        );
    }

    #[test]
    fn test_missing_override_falls_back_to_embedded() {
        let missing = Path::new("/nonexistent/spendscore/vocabulary.toml");
        assert_eq!(resolve_config_source(Some(missing)), ConfigSource::Embedded);
        let config = ScoringConfig::load(Some(missing)).unwrap();
        assert!(config.vocabulary.is_stopword("payment"));
    }
}
