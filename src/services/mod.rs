pub mod documents;
pub mod lifecycle;
pub mod number_format;
pub mod sequence_allocator;
