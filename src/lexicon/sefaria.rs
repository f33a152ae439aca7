//! Sefaria lexicon adapter
//!
//! HTTP client for the public words API (lookup by form) and the search
//! wrapper (full-text search over dictionary entries).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{
    is_allowed_lexicon, lexicon_for_path, DictionaryHit, DictionarySearch, Lexicon, LexiconEntry,
    WordLookup, LEXICON_ALLOW_LIST,
};
use crate::error::{ResolverError, Result};
use crate::models::LexiconReference;

const SEARCH_RESULT_SIZE: u32 = 8;
const SEARCH_SLOP: u32 = 10;

/// Client for the Sefaria words and search APIs
#[derive(Clone)]
pub struct SefariaClient {
    base: Url,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(rename = "_source")]
    source: HitSource,
}

#[derive(Deserialize)]
struct HitSource {
    #[serde(rename = "ref")]
    location_ref: String,
    #[serde(rename = "titleVariants", default)]
    title_variants: Vec<String>,
    path: String,
    #[serde(default)]
    exact: String,
}

impl SefariaClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| ResolverError::Config(format!("Invalid lexicon base URL: {}", e)))?;
        Ok(Self {
            base,
            client: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ResolverError::Config(format!("Base URL {} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn words_url(&self, form: &str, location_ref: Option<&str>) -> Result<Url> {
        let mut url = self.endpoint(&["api", "words", form])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("always_consonants", "1")
                .append_pair("never_split", "1");
            if let Some(location) = location_ref {
                query.append_pair("lookup_ref", location);
            }
        }
        Ok(url)
    }

    /// Raw allow-listed entries for a form
    async fn fetch_entries(&self, form: &str, location_ref: Option<&str>) -> Result<Vec<LexiconEntry>> {
        let url = self.words_url(form, location_ref)?;
        debug!(%url, "Fetching word entries");

        let entries: Vec<LexiconEntry> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(entries
            .into_iter()
            .filter(|e| is_allowed_lexicon(&e.lexicon_name))
            .collect())
    }

    fn search_payload(query: &str) -> serde_json::Value {
        let filters: Vec<&str> = LEXICON_ALLOW_LIST.iter().map(|(path, _)| *path).collect();
        let filter_fields: Vec<Option<&str>> = vec![None; filters.len()];
        serde_json::json!({
            "aggs": [],
            "field": "naive_lemmatizer",
            "filter_fields": filter_fields,
            "filters": filters,
            "query": query,
            "size": SEARCH_RESULT_SIZE,
            "slop": SEARCH_SLOP,
            "sort_fields": ["pagesheetrank"],
            "sort_method": "score",
            "sort_reverse": false,
            "sort_score_missing": 0.04,
            "source_proj": true,
            "type": "text"
        })
    }
}

/// Split entries into (possible, associated) relative to a location
pub fn split_by_location(entries: Vec<LexiconEntry>, location_ref: Option<&str>) -> WordLookup {
    match location_ref {
        None => WordLookup {
            possible: entries,
            associated: Vec::new(),
        },
        Some(location) => {
            let (associated, possible) = entries
                .into_iter()
                .partition(|e| e.refs.iter().any(|r| r == location));
            WordLookup {
                possible,
                associated,
            }
        }
    }
}

fn hit_from_source(source: HitSource) -> Option<DictionaryHit> {
    let lexicon_name = lexicon_for_path(&source.path)?;
    let headword = source.title_variants.into_iter().next()?;
    Some(DictionaryHit {
        location_ref: source.location_ref,
        headword,
        lexicon_name: lexicon_name.to_string(),
        text: source.exact,
    })
}

#[async_trait]
impl Lexicon for SefariaClient {
    async fn lookup_form(&self, form: &str, location_ref: Option<&str>) -> Result<WordLookup> {
        let entries = self.fetch_entries(form, location_ref).await?;
        Ok(split_by_location(entries, location_ref))
    }

    async fn resolve(&self, reference: &LexiconReference) -> Result<Option<LexiconEntry>> {
        let entries = self.fetch_entries(&reference.headword, None).await?;
        Ok(entries.into_iter().find(|e| {
            e.headword == reference.headword && e.lexicon_name == reference.lexicon_name
        }))
    }
}

#[async_trait]
impl DictionarySearch for SefariaClient {
    async fn search(&self, query: &str) -> Result<Vec<DictionaryHit>> {
        let url = self.endpoint(&["api", "search-wrapper", "es8"])?;
        let response: SearchResponse = self
            .client
            .post(url)
            .json(&Self::search_payload(query))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut hits = Vec::with_capacity(response.hits.hits.len());
        for hit in response.hits.hits {
            let location = hit.source.location_ref.clone();
            match hit_from_source(hit.source) {
                Some(h) => hits.push(h),
                None => warn!(location_ref = %location, "Dropping search hit outside the lexicon allow-list"),
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(headword: &str, refs: &[&str]) -> LexiconEntry {
        serde_json::from_value(serde_json::json!({
            "headword": headword,
            "parent_lexicon": "Jastrow Dictionary",
            "refs": refs,
        }))
        .unwrap()
    }

    #[test]
    fn test_words_url_encodes_form_and_ref() {
        let client = SefariaClient::new("https://www.sefaria.org").unwrap();
        let url = client.words_url("בית דין", Some("Sanhedrin 63a:1")).unwrap();
        assert!(url.path().starts_with("/api/words/"));
        assert!(!url.path().contains(' '));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("never_split".to_string(), "1".to_string())));
        assert!(pairs.contains(&("lookup_ref".to_string(), "Sanhedrin 63a:1".to_string())));
    }

    #[test]
    fn test_endpoint_with_trailing_slash_base() {
        let client = SefariaClient::new("http://localhost:8000/").unwrap();
        let url = client.endpoint(&["api", "search-wrapper", "es8"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/search-wrapper/es8");
    }

    #[test]
    fn test_split_by_location() {
        let entries = vec![entry("a", &["Chullin 60a:2"]), entry("b", &[])];
        let lookup = split_by_location(entries.clone(), Some("Chullin 60a:2"));
        assert_eq!(lookup.associated.len(), 1);
        assert_eq!(lookup.associated[0].headword, "a");
        assert_eq!(lookup.possible[0].headword, "b");

        let lookup = split_by_location(entries, None);
        assert_eq!(lookup.possible.len(), 2);
        assert!(lookup.associated.is_empty());
    }

    #[test]
    fn test_search_payload_filters_allow_list() {
        let payload = SefariaClient::search_payload("peace offering");
        assert_eq!(payload["filters"].as_array().unwrap().len(), LEXICON_ALLOW_LIST.len());
        assert_eq!(payload["filter_fields"][0], serde_json::Value::Null);
        assert_eq!(payload["size"], 8);
    }

    #[test]
    fn test_hit_mapping() {
        let source = HitSource {
            location_ref: "Jastrow, שלום 1".to_string(),
            title_variants: vec!["שְׁלוֹם".to_string()],
            path: "Reference/Dictionary/Jastrow".to_string(),
            exact: "peace".to_string(),
        };
        let hit = hit_from_source(source).unwrap();
        assert_eq!(hit.lexicon_name, "Jastrow Dictionary");
        assert_eq!(hit.headword, "שְׁלוֹם");

        let foreign = HitSource {
            location_ref: "x".to_string(),
            title_variants: vec!["y".to_string()],
            path: "Reference/Dictionary/Krupnik".to_string(),
            exact: String::new(),
        };
        assert!(hit_from_source(foreign).is_none());
    }
}
