use ffnet_common::fetch::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// A marker the record cannot exist without is absent from the markup.
    #[error("{entity} is missing mandatory field `{field}`")]
    MandatoryFieldMissing {
        entity: &'static str,
        field: &'static str,
    },

    #[error("{entity} field `{field}` holds an unusable number `{value}`")]
    InvalidNumber {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("unable to build url `{url}`")]
    InvalidUrl {
        url: String,
        #[source]
        source: http::uri::InvalidUri,
    },

    #[error("unable to parse markup")]
    Markup(#[source] std::io::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ExtractError {
    /// Whether the same request could succeed on another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractError::Fetch(err) if err.is_transient())
    }

    pub(crate) fn missing(entity: &'static str, field: &'static str) -> Self {
        ExtractError::MandatoryFieldMissing { entity, field }
    }
}
