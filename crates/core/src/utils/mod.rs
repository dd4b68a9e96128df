pub mod amounts;
pub mod decimal_serde;
pub mod time_utils;
