// components/catalog_client/src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unrecognized catalog reference: {0}")]
    UnrecognizedReference(String),

    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog returned {status} for {url}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },

    #[error("catalog authentication failed: {0}")]
    Auth(String),

    #[error("no further page to fetch")]
    NoNextPage,

    #[error("track has no resolvable payload: {0}")]
    Unresolvable(String),
}
