//! Error types for catalog harvesting.

use thiserror::Error;

use crate::time::TimeParseError;

/// Result type alias using HarvestError.
pub type HarvestResult<T> = Result<T, HarvestError>;

/// Primary error type for harvesting operations.
#[derive(Debug, Error)]
pub enum HarvestError {
    // === Configuration ===
    #[error("Configuration error in {resource}: {message}")]
    Configuration { resource: String, message: String },

    // === Remote providers ===
    #[error("Fetching from {provider} at {endpoint} failed: {message}")]
    ProviderFetch {
        provider: String,
        endpoint: String,
        message: String,
    },

    // === Harvested data ===
    #[error("Unexpected data shape in {resource}: {message}")]
    DataShape { resource: String, message: String },

    // === Context ===
    #[error("Collection '{collection}' failed: {source}")]
    Collection {
        collection: String,
        #[source]
        source: Box<HarvestError>,
    },

    #[error("Build task aborted: {0}")]
    TaskAborted(String),
}

/// Coarse classification of a [`HarvestError`], looking through context wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    ProviderFetch,
    DataShape,
    TaskAborted,
}

impl HarvestError {
    pub fn configuration(resource: impl Into<String>, message: impl Into<String>) -> Self {
        HarvestError::Configuration {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn provider_fetch(
        provider: impl Into<String>,
        endpoint: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        HarvestError::ProviderFetch {
            provider: provider.into(),
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    pub fn data_shape(resource: impl Into<String>, message: impl Into<String>) -> Self {
        HarvestError::DataShape {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Wrap this error with the name of the collection being built.
    pub fn in_collection(self, collection: impl Into<String>) -> Self {
        HarvestError::Collection {
            collection: collection.into(),
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HarvestError::Configuration { .. } => ErrorKind::Configuration,
            HarvestError::ProviderFetch { .. } => ErrorKind::ProviderFetch,
            HarvestError::DataShape { .. } => ErrorKind::DataShape,
            HarvestError::Collection { source, .. } => source.kind(),
            HarvestError::TaskAborted(_) => ErrorKind::TaskAborted,
        }
    }

    /// Name of the innermost collection this error was raised in, if any.
    pub fn collection(&self) -> Option<&str> {
        match self {
            HarvestError::Collection { collection, source } => {
                source.collection().or(Some(collection.as_str()))
            }
            _ => None,
        }
    }
}

impl From<TimeParseError> for HarvestError {
    fn from(err: TimeParseError) -> Self {
        HarvestError::DataShape {
            resource: "time".to_string(),
            message: err.to_string(),
        }
    }
}
