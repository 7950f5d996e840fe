use thiserror::Error;

/// Why a call to the map-matching or analysis service didn't produce a usable answer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Service responded with status {code}: {message}")]
    Status { code: u16, message: String },

    // The matching service understood the request, but couldn't place the line on any street
    #[error("No match: {0}")]
    NoMatch(String),

    #[error("A line needs at least 2 points to be matched, got {0}")]
    TooFewPoints(usize),

    #[error("The matching service accepts at most {max} points, got {got}")]
    TooManyPoints { got: usize, max: usize },

    #[error("No service credential is configured for map matching")]
    MissingCredential,

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Malformed(err.to_string())
    }
}

impl From<geojson::Error> for ServiceError {
    fn from(err: geojson::Error) -> Self {
        ServiceError::Malformed(err.to_string())
    }
}

/// Problems with GeoJSON handed to us by the host, rather than by a remote service.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Feature {idx} has no geometry")]
    MissingGeometry { idx: usize },

    #[error("Feature {idx} is a {kind}, not a line")]
    NotALine { idx: usize, kind: &'static str },

    #[error("Feature {idx} has no id")]
    MissingId { idx: usize },
}
