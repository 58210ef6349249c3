use thiserror::Error;

/// Environment failure of the local medium. Missing records are not errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access local collection {collection}: {source}")]
    Io {
        collection: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse local collection {collection}: {source}")]
    Corrupt {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Password hashing failed: {0}")]
    Hash(String),
}

impl StoreError {
    pub(crate) fn io(collection: &str, source: std::io::Error) -> Self {
        StoreError::Io {
            collection: collection.to_string(),
            source,
        }
    }

    pub(crate) fn corrupt(collection: &str, source: serde_json::Error) -> Self {
        StoreError::Corrupt {
            collection: collection.to_string(),
            source,
        }
    }
}
