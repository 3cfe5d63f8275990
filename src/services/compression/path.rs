// 缓存键与路径
//
// 缓存键 = (压缩根目录, 可选子目录, 文件名)，确定性地映射到唯一的产物路径

use std::path::{Component, Path, PathBuf};

use crate::services::compression::error::CompressionError;
use crate::services::compression::source::SourceReference;

/// 缓存键
///
/// 相同的源引用和子目录总是得到相同的缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    root: PathBuf,
    sub_dir: Option<PathBuf>,
    basename: String,
}

impl CacheKey {
    /// 从源引用派生缓存键
    ///
    /// # 参数
    /// - `root`: 压缩根目录
    /// - `sub_dir`: 调用方传入的附加目录，空字符串表示不使用
    /// - `source`: 已校验的源引用
    pub fn derive(
        root: &Path,
        sub_dir: &str,
        source: &SourceReference,
    ) -> Result<Self, CompressionError> {
        Ok(Self {
            root: root.to_path_buf(),
            sub_dir: Self::sanitize_sub_dir(sub_dir)?,
            basename: source.basename().to_string(),
        })
    }

    /// 子目录只能是相对路径，且不能跳出根目录
    fn sanitize_sub_dir(sub_dir: &str) -> Result<Option<PathBuf>, CompressionError> {
        let trimmed = sub_dir.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let mut sanitized = PathBuf::new();
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(part) => sanitized.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(CompressionError::InvalidSubDirectory(sub_dir.to_string()));
                }
            }
        }

        if sanitized.as_os_str().is_empty() {
            Ok(None)
        } else {
            Ok(Some(sanitized))
        }
    }

    /// 产物所在目录（根目录 + 子目录）
    pub fn dir(&self) -> PathBuf {
        match &self.sub_dir {
            Some(sub_dir) => self.root.join(sub_dir),
            None => self.root.clone(),
        }
    }

    /// 产物完整路径
    pub fn path(&self) -> PathBuf {
        self.dir().join(&self.basename)
    }

    /// 相对于根目录的路径，用于拼接对外访问地址
    pub fn relative_path(&self) -> PathBuf {
        match &self.sub_dir {
            Some(sub_dir) => sub_dir.join(&self.basename),
            None => PathBuf::from(&self.basename),
        }
    }
}
