pub mod change;
pub mod ports;
pub mod report;
pub mod schema;
pub mod value_objects;
