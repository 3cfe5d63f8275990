// 编解码分发 - 按 mime 解码源图片，按目标格式有损编码
//
// 本模块提供：
// - 源 mime 检测（按字节嗅探，而不是相信 URL 扩展名）
// - mime -> 解码函数 的查表分发，新增格式只需要加一行表项
// - WebP / JPEG 有损编码（质量 0-100）
// - 编解码器 panic 隔离：编解码调用被视为不可信、可能失败的操作

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat, ImageResult};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

use crate::services::compression::error::CodecError;

/// 支持解码的源图片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMime {
    Jpeg,
    Png,
    Gif,
}

impl SourceMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMime::Jpeg => "image/jpeg",
            SourceMime::Png => "image/png",
            SourceMime::Gif => "image/gif",
        }
    }

    /// 按字节内容嗅探 mime
    pub fn sniff(bytes: &[u8]) -> Result<Self, CodecError> {
        let format = image::guess_format(bytes)
            .map_err(|e| CodecError::UnknownFormat(e.to_string()))?;

        match format {
            ImageFormat::Jpeg => Ok(SourceMime::Jpeg),
            ImageFormat::Png => Ok(SourceMime::Png),
            ImageFormat::Gif => Ok(SourceMime::Gif),
            other => Err(CodecError::UnknownFormat(format!("{:?}", other))),
        }
    }
}

impl fmt::Display for SourceMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 编码目标格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Webp,
    Jpeg,
}

impl TargetFormat {
    /// PNG/GIF 源输出 WebP，其余（以及默认）输出 JPEG
    pub fn for_source(mime: SourceMime) -> Self {
        match mime {
            SourceMime::Png | SourceMime::Gif => TargetFormat::Webp,
            SourceMime::Jpeg => TargetFormat::Jpeg,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            TargetFormat::Webp => "image/webp",
            TargetFormat::Jpeg => "image/jpeg",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetFormat::Webp => f.write_str("webp"),
            TargetFormat::Jpeg => f.write_str("jpeg"),
        }
    }
}

type DecodeFn = fn(&[u8]) -> ImageResult<DynamicImage>;

/// 解码查表
const DECODERS: &[(SourceMime, DecodeFn)] = &[
    (SourceMime::Jpeg, decode_jpeg),
    (SourceMime::Png, decode_png),
    (SourceMime::Gif, decode_gif),
];

fn decode_jpeg(bytes: &[u8]) -> ImageResult<DynamicImage> {
    image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
}

fn decode_png(bytes: &[u8]) -> ImageResult<DynamicImage> {
    image::load_from_memory_with_format(bytes, ImageFormat::Png)
}

// 动态 GIF 只取第一帧
fn decode_gif(bytes: &[u8]) -> ImageResult<DynamicImage> {
    image::load_from_memory_with_format(bytes, ImageFormat::Gif)
}

/// 编解码能力
///
/// `encode` 按值接收光栅图像：无论编码成功与否，图像都在调用结束时释放
pub trait ImageCodec: Send + Sync {
    fn decode(&self, bytes: &[u8], mime: SourceMime) -> Result<DynamicImage, CodecError>;

    fn encode(
        &self,
        raster: DynamicImage,
        format: TargetFormat,
        quality: u8,
    ) -> Result<Vec<u8>, CodecError>;
}

/// 基于 image / webp crate 的编解码分发器
#[derive(Debug, Default, Clone, Copy)]
pub struct CodecDispatcher;

impl CodecDispatcher {
    pub fn new() -> Self {
        Self
    }

    fn encode_webp(raster: &DynamicImage, quality: u8) -> Result<Vec<u8>, CodecError> {
        let rgba = raster.to_rgba8();
        let (width, height) = rgba.dimensions();

        let encoder = webp::Encoder::from_rgba(&rgba, width, height);
        let webp_data = encoder
            .encode_simple(false, f32::from(quality))
            .map_err(|e| CodecError::Encode {
                format: TargetFormat::Webp,
                reason: format!("{:?}", e),
            })?;

        Ok(webp_data.to_vec())
    }

    fn encode_jpeg(raster: &DynamicImage, quality: u8) -> Result<Vec<u8>, CodecError> {
        // JPEG 不支持透明通道
        let rgb = raster.to_rgb8();
        let mut buffer = Vec::new();

        {
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
            encoder
                .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
                .map_err(|e| CodecError::Encode {
                    format: TargetFormat::Jpeg,
                    reason: e.to_string(),
                })?;
        }

        Ok(buffer)
    }
}

impl ImageCodec for CodecDispatcher {
    fn decode(&self, bytes: &[u8], mime: SourceMime) -> Result<DynamicImage, CodecError> {
        let decoder = DECODERS
            .iter()
            .find(|(candidate, _)| *candidate == mime)
            .map(|(_, decode)| *decode)
            .ok_or_else(|| CodecError::Decode {
                mime,
                reason: "no decoder registered".to_string(),
            })?;

        decoder(bytes).map_err(|e| CodecError::Decode {
            mime,
            reason: e.to_string(),
        })
    }

    fn encode(
        &self,
        raster: DynamicImage,
        format: TargetFormat,
        quality: u8,
    ) -> Result<Vec<u8>, CodecError> {
        match format {
            TargetFormat::Webp => Self::encode_webp(&raster, quality),
            TargetFormat::Jpeg => Self::encode_jpeg(&raster, quality),
        }
    }
}

/// 一次成功转码的产物
#[derive(Debug, Clone)]
pub struct EncodedArtifact {
    pub source_mime: SourceMime,
    pub format: TargetFormat,
    pub bytes: Vec<u8>,
}

/// 嗅探 -> 解码 -> 编码
///
/// 编解码器内部的 panic 会被捕获并转换为 `CodecError`
pub fn transcode(
    codec: &dyn ImageCodec,
    source: &[u8],
    quality: u8,
) -> Result<EncodedArtifact, CodecError> {
    let source_mime = SourceMime::sniff(source)?;

    let raster = panic::catch_unwind(AssertUnwindSafe(|| codec.decode(source, source_mime)))
        .map_err(|payload| CodecError::Decode {
            mime: source_mime,
            reason: format!("codec panicked: {}", panic_message(payload.as_ref())),
        })??;

    let (width, height) = raster.dimensions();
    let format = TargetFormat::for_source(source_mime);
    debug!(
        "解码完成: {} {}x{}, 目标格式 {} (质量 {})",
        source_mime, width, height, format, quality
    );

    let bytes = panic::catch_unwind(AssertUnwindSafe(|| codec.encode(raster, format, quality)))
        .map_err(|payload| CodecError::Encode {
            format,
            reason: format!("codec panicked: {}", panic_message(payload.as_ref())),
        })??;

    Ok(EncodedArtifact {
        source_mime,
        format,
        bytes,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
