pub mod collation;
pub mod differ;
pub mod generator;
pub mod index_length;
pub mod migrate;
pub mod sync;
