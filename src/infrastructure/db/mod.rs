pub mod client;
pub mod row_values;
pub mod sql_utils;
