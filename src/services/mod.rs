pub mod compression;

pub use compression::{CompressionConfig, CompressionError, ImageCompressor};
