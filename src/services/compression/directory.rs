// 目录准备 - 确保压缩目录存在
//
// 幂等：目录已存在不算错误；创建失败时返回 DirectoryUnavailable

use std::path::Path;
use tracing::{debug, info, warn};

use crate::services::compression::error::CompressionError;
use crate::services::compression::store::ArtifactStore;

/// 目录准备的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// 目录原本就存在
    AlreadyExisted,
    /// 目录是本次新建的
    Created,
}

/// 目录准备器
pub struct DirectoryProvisioner;

impl DirectoryProvisioner {
    /// 确保目录存在，不存在则递归创建
    ///
    /// # 返回
    /// - `Ok(Provisioned)`: 调用结束后目录存在
    /// - `Err(CompressionError::DirectoryUnavailable)`: 目录不存在且无法创建
    pub async fn ensure_dir(
        store: &dyn ArtifactStore,
        path: &Path,
    ) -> Result<Provisioned, CompressionError> {
        if store.is_dir(path).await {
            debug!("压缩目录已存在: {:?}", path);
            return Ok(Provisioned::AlreadyExisted);
        }

        match store.create_dir_all(path).await {
            Ok(()) => {
                info!("已创建压缩目录: {:?}", path);
                Ok(Provisioned::Created)
            }
            // 并发请求可能已抢先创建
            Err(_) if store.is_dir(path).await => Ok(Provisioned::AlreadyExisted),
            Err(e) => {
                warn!("压缩目录创建失败: {:?}, 错误: {}", path, e);
                Err(CompressionError::DirectoryUnavailable {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }
    }
}
