// 压缩模块 - 远程图片的压缩/转换与缓存管理
//
// 本模块提供：
// - 源 URL 校验与缓存键派生
// - 基于修改时间的生命周期判定
// - 压缩目录准备
// - 按 mime 分发的编解码（PNG/GIF -> WebP，其余 -> JPEG）
// - 压缩流程编排

pub mod codec;
pub mod compressor;
pub mod config;
pub mod directory;
pub mod error;
pub mod fetcher;
pub mod freshness;
pub mod key_lock;
pub mod path;
pub mod source;
pub mod store;

pub use codec::{CodecDispatcher, EncodedArtifact, ImageCodec, SourceMime, TargetFormat};
pub use compressor::{ArtifactLookup, CompressionOutcome, ImageCompressor, OutcomeStatus};
pub use config::{CompressionConfig, FreshEntryPolicy};
pub use directory::{DirectoryProvisioner, Provisioned};
pub use error::{CodecError, CompressionError, ConfigError, FetchError};
pub use fetcher::{HttpSourceFetcher, SourceFetcher};
pub use freshness::{Clock, FixedClock, FreshnessEvaluator, Lifetime, SystemClock};
pub use key_lock::KeyLocks;
pub use path::CacheKey;
pub use source::SourceReference;
pub use store::{ArtifactMetadata, ArtifactStore, FsArtifactStore, MemoryArtifactStore};
