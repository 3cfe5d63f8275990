// 源图片引用 - 从 URL 派生文件名、扩展名和目录提示
//
// 校验规则：
// - URL 必须可解析，且包含目录提示和非空文件名
// - 文件名（去掉查询串）必须带有可识别的图片扩展名
// - GIF 源一律拒绝压缩（原样透传，不缓存）
//
// GIF 只按文件名的扩展名识别，而不是在整个 URL 中查找 ".gif"：
// `https://example.com/x.gif/y.jpg` 的文件名是 `y.jpg`，按 JPEG 处理

use std::fmt;
use url::Url;

use crate::services::compression::error::CompressionError;

/// 可识别的扩展名（小写）
const RECOGNIZED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "jpe", "png", "gif"];

/// 源图片引用
///
/// 每个请求构造一次，从不持久化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReference {
    url: Url,
    original: String,
    basename: String,
    extension: String,
    directory: String,
}

impl SourceReference {
    /// 解析并校验源 URL
    ///
    /// # 返回
    /// - `Ok(SourceReference)`: 合法的源引用
    /// - `Err(CompressionError::UnsupportedSource)`: 缺少扩展名/目录、扩展名不可识别或为 GIF
    pub fn parse(raw: &str) -> Result<Self, CompressionError> {
        let trimmed = raw.trim();
        let url = Url::parse(trimmed)
            .map_err(|e| CompressionError::unsupported(raw, format!("invalid url: {}", e)))?;

        let path = url.path();
        let (directory, last_segment) = match path.rfind('/') {
            Some(idx) => (&path[..=idx], &path[idx + 1..]),
            None => ("", path),
        };
        if directory.is_empty() {
            return Err(CompressionError::unsupported(raw, "missing directory"));
        }

        let basename = urlencoding::decode(last_segment)
            .map_err(|e| CompressionError::unsupported(raw, format!("invalid file name: {}", e)))?
            .into_owned();
        if basename.is_empty() || basename == "." || basename == ".." {
            return Err(CompressionError::unsupported(raw, "missing file name"));
        }
        if basename.contains(['/', '\\', '\0']) {
            return Err(CompressionError::unsupported(raw, "file name contains separators"));
        }

        let extension = match basename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
            _ => return Err(CompressionError::unsupported(raw, "missing file extension")),
        };

        if extension == "gif" {
            return Err(CompressionError::unsupported(
                raw,
                "gif images are passed through without compression",
            ));
        }
        if !RECOGNIZED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(CompressionError::unsupported(
                raw,
                format!("unrecognized extension [{}]", extension),
            ));
        }

        Ok(Self {
            original: trimmed.to_string(),
            directory: directory.to_string(),
            basename,
            extension,
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// 调用方传入的原始 URL 字符串
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// 去掉查询串之后的文件名，也是缓存文件名
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// 小写扩展名
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// 目录提示（URL 路径中文件名之前的部分）
    pub fn directory(&self) -> &str {
        &self.directory
    }
}

impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}
