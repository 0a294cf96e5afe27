pub mod credential;
pub mod credential_format;
pub mod credential_request;
pub mod metadata;
pub mod offer;
pub mod proof;
pub mod token;
pub mod util;
