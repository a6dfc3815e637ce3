//! Price data access port trait.

use crate::domain::error::GlidepathError;
use crate::domain::price_history::PricePoint;

pub trait PriceDataPort {
    /// Closing prices recorded for `source`, ascending by date with one
    /// record per date.
    fn fetch_closes(&self, source: &str) -> Result<Vec<PricePoint>, GlidepathError>;

    /// Sources this port can serve.
    fn list_sources(&self) -> Result<Vec<String>, GlidepathError>;
}
