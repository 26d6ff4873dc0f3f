pub mod credential;
pub mod document;

pub use credential::Credential;
pub use document::{
    DocumentDescriptor, FetchRequest, FetchResponse, FileList, FOLDER_MIME_TYPE, PDF_MIME_TYPE,
};
