pub mod credentials;
pub mod drive_client;
pub mod metrics;
pub mod oauth;
pub mod search;
pub mod storage;
pub mod traversal;

pub use drive_client::{DriveApi, DriveClient, DriveError};
pub use oauth::{OAuthClient, OAuthError};
pub use storage::{LocalStorage, Storage};
