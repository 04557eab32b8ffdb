pub mod extractor;
pub mod jwt;
pub mod sse;
pub mod test_utils;
