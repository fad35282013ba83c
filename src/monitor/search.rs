//! Search plan: keyword permutations and page URLs
//!
//! A cycle walks every keyword permutation across its result pages. The
//! default plan has a single permutation (the configured keyword set);
//! rotation is a configurable extension that varies the query string from
//! run to run without changing what qualifies.

use crate::config::{PermutationMode, SearchConfig};
use crate::ConfigError;
use url::Url;

/// One keyword permutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    words: Vec<String>,
}

impl KeywordSet {
    /// Normalized key identifying this set in statistics
    pub fn key(&self) -> String {
        self.words.join(" ").to_lowercase()
    }

    /// Query-string form: lowercase words joined with dashes
    pub fn query(&self) -> String {
        self.words
            .iter()
            .map(|w| w.trim().to_lowercase().replace(' ', "-"))
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// The resolved search plan for one monitor instance
#[derive(Debug, Clone)]
pub struct SearchPlan {
    base_url: Url,
    query_template: String,
    permutations: Vec<KeywordSet>,
}

impl SearchPlan {
    /// Resolves the plan from search configuration
    pub fn from_config(config: &SearchConfig) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|_| ConfigError::InvalidUrl(config.base_url.clone()))?;

        let permutations = expand(&config.keywords, config.permutations);

        Ok(Self {
            base_url,
            query_template: config.query_template.clone(),
            permutations,
        })
    }

    /// The keyword permutations walked each cycle
    pub fn permutations(&self) -> &[KeywordSet] {
        &self.permutations
    }

    /// Builds the result-page URL for a permutation and page number
    pub fn page_url(&self, set: &KeywordSet, page: u32) -> String {
        let path = self
            .query_template
            .replace("{query}", &set.query())
            .replace("{page}", &page.to_string());

        match self.base_url.join(&path) {
            Ok(url) => url.to_string(),
            // The template was validated; a join failure means a hostile
            // keyword, fall back to simple concatenation
            Err(_) => format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path),
        }
    }
}

fn expand(keywords: &[String], mode: PermutationMode) -> Vec<KeywordSet> {
    let words: Vec<String> = keywords.to_vec();
    match mode {
        PermutationMode::Single => vec![KeywordSet { words }],
        PermutationMode::Rotate => {
            let n = words.len().max(1);
            (0..n)
                .map(|i| {
                    let mut rotated = words.clone();
                    rotated.rotate_left(i);
                    KeywordSet { words: rotated }
                })
                .collect()
        }
    }
}
