use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::DocumentDescriptor;
use crate::services::drive_client::{escape_query_value, DriveApi, DriveError, ListQuery};

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub selected_ids: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MatchBuckets {
    pub by_name: Vec<DocumentDescriptor>,
    pub by_fulltext: Vec<DocumentDescriptor>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    pub selected: MatchBuckets,
    pub global: MatchBuckets,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchResponse {
    /// Nothing to search for; serialized as `{"results":{}}`.
    Empty {
        results: serde_json::Map<String, serde_json::Value>,
    },
    Found(SearchResults),
}

impl SearchResponse {
    pub fn empty() -> Self {
        SearchResponse::Empty {
            results: serde_json::Map::new(),
        }
    }
}

/// The two `q` strings issued per search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQueries {
    pub by_name: String,
    pub by_fulltext: String,
}

pub fn tokenize(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_string).collect()
}

/// Every word must match: `name contains 'a' and name contains 'b'`.
pub fn build_queries(words: &[String]) -> SearchQueries {
    let clause = |field: &str| {
        words
            .iter()
            .map(|word| format!("{} contains '{}'", field, escape_query_value(word)))
            .collect::<Vec<_>>()
            .join(" and ")
    };

    SearchQueries {
        by_name: clause("name"),
        by_fulltext: clause("fullText"),
    }
}

/// Drop fulltext hits already matched by name, then split both lists by
/// selection. Provider order is kept inside every bucket.
pub fn partition(
    name_hits: Vec<DocumentDescriptor>,
    fulltext_hits: Vec<DocumentDescriptor>,
    selected_ids: &HashSet<String>,
) -> SearchResults {
    let fulltext_hits: Vec<DocumentDescriptor> = {
        let name_ids: HashSet<&str> = name_hits.iter().map(|doc| doc.id.as_str()).collect();
        fulltext_hits
            .into_iter()
            .filter(|doc| !name_ids.contains(doc.id.as_str()))
            .collect()
    };

    let (selected_name, global_name): (Vec<_>, Vec<_>) = name_hits
        .into_iter()
        .partition(|doc| selected_ids.contains(&doc.id));
    let (selected_fulltext, global_fulltext): (Vec<_>, Vec<_>) = fulltext_hits
        .into_iter()
        .partition(|doc| selected_ids.contains(&doc.id));

    SearchResults {
        selected: MatchBuckets {
            by_name: selected_name,
            by_fulltext: selected_fulltext,
        },
        global: MatchBuckets {
            by_name: global_name,
            by_fulltext: global_fulltext,
        },
    }
}

/// Run the name query, then the fulltext query, and merge the results.
pub async fn search(
    drive: &dyn DriveApi,
    words: &[String],
    selected_ids: &HashSet<String>,
    page_size: u32,
) -> Result<SearchResults, DriveError> {
    let queries = build_queries(words);

    let name_hits = drive
        .list_files(&ListQuery::new(queries.by_name).page_size(page_size))
        .await?
        .files;
    let fulltext_hits = drive
        .list_files(&ListQuery::new(queries.by_fulltext).page_size(page_size))
        .await?
        .files;

    tracing::debug!(
        by_name = name_hits.len(),
        by_fulltext = fulltext_hits.len(),
        "Drive search returned"
    );

    Ok(partition(name_hits, fulltext_hits, selected_ids))
}
