pub mod bucket;
pub mod writer;
