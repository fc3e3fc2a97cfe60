//! Domain types for themelab

pub mod bar;
pub mod calendar;
pub mod security;

pub use bar::{visible_bars, PriceBar};
pub use calendar::{previous_trading_date, trailing_weekdays};
pub use security::{normalize_ticker, Label, LabelKind, SecurityMetadata, TICKER_WIDTH};
