pub use self::stock_options::{StockOptionsArgs, StockOptionsTool};

pub mod stock_options;
