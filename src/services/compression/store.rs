// 产物存储 - 压缩产物的读写抽象
//
// 文件系统本身就是缓存索引：文件的修改时间是唯一的过期记录。
// 本模块把它抽象成可注入的存储能力，包括：
// - FsArtifactStore：基于 tokio::fs 的真实磁盘存储（写入采用临时文件 + rename）
// - MemoryArtifactStore：内存存储，用于测试

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::services::compression::freshness::{Clock, SystemClock};

/// 产物元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
    /// 创建时间（部分平台/文件系统不提供）
    pub created_at: Option<DateTime<Utc>>,
    /// 最后修改时间，反映最近一次成功的（重新）压缩
    pub modified_at: DateTime<Utc>,
    /// 字节大小
    pub len: u64,
    /// 是否为普通文件
    pub is_file: bool,
}

/// 产物存储能力
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// 获取路径的元数据，路径不存在时返回 `Ok(None)`
    async fn metadata(&self, path: &Path) -> io::Result<Option<ArtifactMetadata>>;

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// 写入完整字节内容，读者不会观察到部分写入
    async fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    async fn is_dir(&self, path: &Path) -> bool;

    /// 递归创建目录
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// 临时文件后缀
const TEMP_SUFFIX: &str = ".tmp";

/// 磁盘存储
#[derive(Debug, Default, Clone)]
pub struct FsArtifactStore;

impl FsArtifactStore {
    pub fn new() -> Self {
        Self
    }

    /// 同目录下的临时文件路径，保证 rename 不跨文件系统
    fn temp_path(path: &Path) -> PathBuf {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.{}{}", file_name, uuid::Uuid::new_v4(), TEMP_SUFFIX))
    }

    fn is_temp_file_name(name: &str) -> bool {
        name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
    }

    /// 清理根目录下残留的临时文件（写入与 rename 之间进程退出时留下）
    ///
    /// 只应在启动时、尚无写入进行时调用
    ///
    /// # 返回
    /// 删除的临时文件数量；根目录不存在时返回 0
    pub async fn sweep_temp_files(&self, root: &Path) -> io::Result<usize> {
        let mut removed = 0;
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };

            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file()
                    && Self::is_temp_file_name(&entry.file_name().to_string_lossy())
                {
                    match fs::remove_file(&path).await {
                        Ok(()) => {
                            debug!("已删除残留临时文件: {:?}", path);
                            removed += 1;
                        }
                        Err(e) => warn!("删除残留临时文件失败: {:?}, 错误: {}", path, e),
                    }
                }
            }
        }

        Ok(removed)
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn metadata(&self, path: &Path) -> io::Result<Option<ArtifactMetadata>> {
        let meta = match fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(Some(ArtifactMetadata {
            created_at: meta.created().ok().map(DateTime::<Utc>::from),
            modified_at: DateTime::<Utc>::from(meta.modified()?),
            len: meta.len(),
            is_file: meta.is_file(),
        }))
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path).await
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let temp_path = Self::temp_path(path);

        if let Err(e) = fs::write(&temp_path, bytes).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, path).await {
            warn!("重命名临时文件失败: {:?} -> {:?}, 错误: {}", temp_path, path, e);
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        debug!("产物已写入: {:?} ({} 字节)", path, bytes.len());
        Ok(())
    }

    async fn is_dir(&self, path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // 压缩目录权限 0775
            fs::set_permissions(path, std::fs::Permissions::from_mode(0o775)).await?;
        }

        Ok(())
    }
}

/// 内存中的文件条目
#[derive(Debug, Clone)]
struct MemoryFile {
    bytes: Vec<u8>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: HashMap<PathBuf, MemoryFile>,
    dirs: HashSet<PathBuf>,
}

/// 内存存储
///
/// 时间戳取自注入的时钟，测试可以精确控制产物的“年龄”
pub struct MemoryArtifactStore {
    state: RwLock<MemoryState>,
    clock: Arc<dyn Clock>,
}

impl MemoryArtifactStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            clock,
        }
    }

    /// 直接放入一个文件（不检查父目录），用于构造测试场景
    pub async fn insert_file(&self, path: impl Into<PathBuf>, bytes: Vec<u8>) {
        let now = self.clock.now();
        self.state.write().await.files.insert(
            path.into(),
            MemoryFile {
                bytes,
                created_at: now,
                modified_at: now,
            },
        );
    }

    /// 修改文件的修改时间，用于模拟过期
    pub async fn set_modified(&self, path: &Path, modified_at: DateTime<Utc>) -> bool {
        match self.state.write().await.files.get_mut(path) {
            Some(file) => {
                file.modified_at = modified_at;
                true
            }
            None => false,
        }
    }

    pub async fn file_count(&self) -> usize {
        self.state.read().await.files.len()
    }
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn metadata(&self, path: &Path) -> io::Result<Option<ArtifactMetadata>> {
        let state = self.state.read().await;

        if let Some(file) = state.files.get(path) {
            return Ok(Some(ArtifactMetadata {
                created_at: Some(file.created_at),
                modified_at: file.modified_at,
                len: file.bytes.len() as u64,
                is_file: true,
            }));
        }

        if state.dirs.contains(path) {
            return Ok(Some(ArtifactMetadata {
                created_at: None,
                modified_at: self.clock.now(),
                len: 0,
                is_file: false,
            }));
        }

        Ok(None)
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.state
            .read()
            .await
            .files
            .get(path)
            .map(|file| file.bytes.clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.state.write().await;

        if state.dirs.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", path.display()),
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !state.dirs.contains(parent) {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("parent directory {} does not exist", parent.display()),
                ));
            }
        }

        let now = self.clock.now();
        let created_at = state
            .files
            .get(path)
            .map(|file| file.created_at)
            .unwrap_or(now);
        state.files.insert(
            path.to_path_buf(),
            MemoryFile {
                bytes: bytes.to_vec(),
                created_at,
                modified_at: now,
            },
        );
        Ok(())
    }

    async fn is_dir(&self, path: &Path) -> bool {
        self.state.read().await.dirs.contains(path)
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state.write().await;

        // 路径或任一祖先是普通文件时失败，与真实文件系统一致
        if let Some(blocker) = path.ancestors().find(|a| state.files.contains_key(*a)) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists and is not a directory", blocker.display()),
            ));
        }

        for ancestor in path.ancestors().filter(|a| !a.as_os_str().is_empty()) {
            state.dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::compression::freshness::FixedClock;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed_clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 1, 27, 15, 30, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_fs_store_missing_file_has_no_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new();

        let meta = store.metadata(&temp_dir.path().join("missing.jpg")).await.unwrap();
        assert!(meta.is_none());
    }

    #[tokio::test]
    async fn test_fs_store_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new();
        let path = temp_dir.path().join("a.jpg");

        store.write(&path, b"hello").await.unwrap();
        assert_eq!(store.read(&path).await.unwrap(), b"hello");

        let meta = store.metadata(&path).await.unwrap().unwrap();
        assert!(meta.is_file);
        assert_eq!(meta.len, 5);

        // 不应残留临时文件
        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_fs_store_sweeps_leftover_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new();
        let nested = temp_dir.path().join("products");
        std::fs::create_dir_all(&nested).unwrap();

        std::fs::write(temp_dir.path().join("a.jpg"), b"artifact").unwrap();
        std::fs::write(temp_dir.path().join(".a.jpg.1234.tmp"), b"partial").unwrap();
        std::fs::write(nested.join(".b.png.5678.tmp"), b"partial").unwrap();
        // 非隐藏的 .tmp 不是本存储产生的
        std::fs::write(nested.join("report.tmp"), b"keep").unwrap();

        let removed = store.sweep_temp_files(temp_dir.path()).await.unwrap();

        assert_eq!(removed, 2);
        assert!(temp_dir.path().join("a.jpg").exists());
        assert!(!temp_dir.path().join(".a.jpg.1234.tmp").exists());
        assert!(!nested.join(".b.png.5678.tmp").exists());
        assert!(nested.join("report.tmp").exists());
    }

    #[tokio::test]
    async fn test_fs_store_sweep_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new();

        let removed = store
            .sweep_temp_files(&temp_dir.path().join("missing"))
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn test_fs_store_overwrite_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new();
        let path = temp_dir.path().join("a.jpg");

        store.write(&path, b"first").await.unwrap();
        store.write(&path, b"second").await.unwrap();
        assert_eq!(store.read(&path).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_fs_store_create_dir_all_on_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        assert!(store.create_dir_all(&blocker.join("nested")).await.is_err());
        assert!(!store.is_dir(&blocker).await);
    }

    #[tokio::test]
    async fn test_memory_store_requires_parent_directory() {
        let store = MemoryArtifactStore::new(fixed_clock());
        let path = Path::new("/cache/a.jpg");

        assert!(store.write(path, b"x").await.is_err());

        store.create_dir_all(Path::new("/cache")).await.unwrap();
        store.write(path, b"x").await.unwrap();
        assert_eq!(store.read(path).await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_memory_store_timestamps_follow_clock() {
        let clock = fixed_clock();
        let store = MemoryArtifactStore::new(clock.clone());
        let path = Path::new("/cache/a.jpg");
        store.create_dir_all(Path::new("/cache")).await.unwrap();

        store.write(path, b"x").await.unwrap();
        let first = store.metadata(path).await.unwrap().unwrap();

        clock.advance(chrono::Duration::hours(1));
        store.write(path, b"y").await.unwrap();
        let second = store.metadata(path).await.unwrap().unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.modified_at, first.modified_at + chrono::Duration::hours(1));
    }

    #[tokio::test]
    async fn test_memory_store_file_blocks_directory() {
        let store = MemoryArtifactStore::new(fixed_clock());
        store.insert_file("/cache", b"not a dir".to_vec()).await;

        let result = store.create_dir_all(Path::new("/cache/sub")).await;
        assert!(result.is_err());
        assert!(!store.is_dir(Path::new("/cache")).await);
    }
}
