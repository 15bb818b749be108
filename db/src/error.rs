use std::path::PathBuf;

/// Failure to read or durably write the store file
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not access store file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not (de)serialize store: {0}")]
    Serialization(#[from] serde_json::Error),
}
