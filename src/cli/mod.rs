pub mod convert;
pub mod providers;
pub mod rates;
pub mod setup;
pub mod ui;
