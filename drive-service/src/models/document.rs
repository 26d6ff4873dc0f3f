use serde::{Deserialize, Serialize};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A Drive item as the browser and the Drive API both describe it.
///
/// Missing fields deserialize as empty strings; an item without a mime type
/// never matches any traversal rule and is skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescriptor {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
}

/// One page of `files.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DocumentDescriptor>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    #[serde(default)]
    pub docs: Vec<DocumentDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct FetchResponse {
    pub downloaded: Vec<String>,
}
