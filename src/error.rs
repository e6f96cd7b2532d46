use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no polygon boundary available; draw or upload a field boundary first")]
    MissingBoundary,

    #[error("reference dataset not available at {path:?}: {reason}")]
    MissingReferenceData { path: PathBuf, reason: String },

    #[error("failed to parse timestamp {value:?} in field '{field}' of record {record}")]
    TimestampParse {
        field: String,
        value: String,
        record: usize,
    },

    #[error("invalid boundary geometry: {0}")]
    InvalidGeometry(String),

    #[error("record {record} has no field '{field}'")]
    MissingField { field: String, record: usize },

    #[error("field '{field}' of record {record} is not numeric")]
    NonNumericField { field: String, record: usize },

    #[error("adjustment factor must be finite, got {0}")]
    InvalidAdjustment(f64),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[cfg(feature = "shapefile")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}
