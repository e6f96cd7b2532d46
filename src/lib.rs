pub mod boundary;
pub mod error;
pub mod generator;
pub mod geometry;
pub mod model;
pub mod parser;
pub mod rescale;
pub mod schema;
pub mod store;
pub mod temporal;
pub mod writer;
pub mod zip_handler;

pub use boundary::{resolve, Boundary, Feature, FeatureCollection, FeatureGeometry};
pub use error::{Error, Result};
pub use generator::{generate, generate_at, GenerationOptions};
pub use geometry::Offset;
pub use model::{AttributeValue, GeneratedDataset, Record, ReferenceDataset, Shape};
pub use parser::load_boundary_file;
pub use rescale::AdjustmentFactor;
pub use schema::{DatasetKind, DatasetSchema};
pub use temporal::Timestamp;
pub use writer::{write_archive, GeoJsonWriter, OutputFormat};
pub use zip_handler::{ZipHandler, ZipPackager};
