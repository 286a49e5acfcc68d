//! Domain types shared by training and serving.

pub mod bar;
pub mod horizon;

pub use bar::{PriceBar, RawSeries, SeriesError, SeriesKind};
pub use horizon::{Horizon, UnsupportedHorizon};
