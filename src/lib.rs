// 图片压缩后端库
//
// 本库提供远程图片压缩缓存的核心功能，包括：
// - API 路由
// - 压缩缓存服务

pub mod api;
pub mod services;

pub use services::compression::{
    CompressionConfig, CompressionError, CompressionOutcome, FreshEntryPolicy, ImageCompressor,
    Lifetime, OutcomeStatus,
};
