//! Market data acquisition: provider trait, Polygon aggregates client,
//! chunked download, CSV import and synthetic series.

pub mod circuit_breaker;
pub mod csv_import;
pub mod download;
pub mod polygon;
pub mod provider;
pub mod synthetic;

pub use circuit_breaker::CircuitBreaker;
pub use csv_import::{load_csv, read_csv};
pub use download::{chunk_ranges, download_history};
pub use polygon::{PolygonProvider, PolygonSettings};
pub use provider::{DataError, DataProvider, DataSource, DownloadProgress, FetchResult, LogProgress};
