//! Feature row source port trait.

use crate::domain::bar::Bar;
use crate::domain::error::TraderError;
use chrono::NaiveDate;

pub trait DataPort {
    /// Time-ordered, fully populated bars for `symbol` within `[start, end]`.
    ///
    /// Empty results are `DataUnavailable`; a window whose rows were all
    /// dropped for missing values is `IndicatorComputation`.
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, TraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, TraderError>;
}
