//! # 像素变换模块
//!
//! ## 设计思路
//!
//! 所有变换都作用于已完全解码的 `DecodedRaster`，输入引用不被修改，输出为新的栅格。
//! 核心操作是反色：对每个像素的 R/G/B 取 `255 - value`，A 保持不变，单次线性扫描。
//!
//! 其余操作（灰度、旋转、缩放、降噪、直方图均衡）复用 `image` crate 的 imageops；
//! 缩放优先走 `fast_image_resize`，失败时回退 `imageops::resize`。

use fast_image_resize as fr;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, Rgba, RgbaImage};
use serde::Serialize;

use super::{DecodedRaster, ImageError};

/// 3x3 降噪卷积核（`filter3x3` 会按核总和归一化）。
const NOISE_REDUCTION_KERNEL: [f32; 9] = [1., 2., 1., 2., 4., 2., 1., 2., 1.];

/// 顺时针旋转角度。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rotation {
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// 非 90/180/270 的角度按 90 度处理。
    pub fn from_degrees(degrees: u32) -> Self {
        match degrees {
            180 => Self::Deg180,
            270 => Self::Deg270,
            90 => Self::Deg90,
            other => {
                log::warn!("⚠️ 不支持的旋转角度 {}，按 90 度处理", other);
                Self::Deg90
            }
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

/// 可作用于栅格的像素操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PixelOperation {
    /// RGB 反色，alpha 不变。
    Invert,
    Grayscale,
    Rotate(Rotation),
    /// 精确缩放到目标尺寸（Lanczos3）。
    Scale { width: u32, height: u32 },
    NoiseReduction,
    HistogramEqualize,
}

impl PixelOperation {
    /// 从外部字符串解析操作。
    ///
    /// 支持：`invert`、`grayscale`、`rotate90` / `rotate:180`、`scale:800x600`、
    /// `denoise`、`equalize`。
    ///
    /// # 示例
    /// ```rust
    /// use image_manipulation::image_handler::{PixelOperation, Rotation};
    ///
    /// assert_eq!(PixelOperation::from_str("invert")?, PixelOperation::Invert);
    /// assert_eq!(
    ///     PixelOperation::from_str("rotate:270")?,
    ///     PixelOperation::Rotate(Rotation::Deg270)
    /// );
    /// # Ok::<(), image_manipulation::image_handler::ImageError>(())
    /// ```
    pub fn from_str(operation: &str) -> Result<Self, ImageError> {
        let normalized = operation.trim().to_lowercase();

        if let Some(rest) = normalized.strip_prefix("rotate") {
            let degrees = rest.trim_start_matches([':', '=']);
            if degrees.is_empty() {
                return Ok(Self::Rotate(Rotation::Deg90));
            }
            let degrees = degrees.parse::<u32>().map_err(|_| {
                ImageError::InvalidOperation(format!("旋转角度无效：{}", operation))
            })?;
            return Ok(Self::Rotate(Rotation::from_degrees(degrees)));
        }

        if let Some(rest) = normalized.strip_prefix("scale") {
            let size = rest.trim_start_matches([':', '=']);
            let (width, height) = size
                .split_once('x')
                .and_then(|(w, h)| Some((w.parse::<u32>().ok()?, h.parse::<u32>().ok()?)))
                .ok_or_else(|| {
                    ImageError::InvalidOperation(format!("缩放尺寸无效：{}（示例：scale:800x600）", operation))
                })?;
            if width == 0 || height == 0 {
                return Err(ImageError::InvalidOperation("缩放尺寸必须大于 0".to_string()));
            }
            return Ok(Self::Scale { width, height });
        }

        match normalized.as_str() {
            "invert" | "negate" => Ok(Self::Invert),
            "grayscale" | "greyscale" | "gray" => Ok(Self::Grayscale),
            "denoise" | "noise-reduction" => Ok(Self::NoiseReduction),
            "equalize" | "histogram-equalize" => Ok(Self::HistogramEqualize),
            other => Err(ImageError::InvalidOperation(format!(
                "未知操作：{}（可选：invert / grayscale / rotate90|180|270 / scale:WxH / denoise / equalize）",
                other
            ))),
        }
    }

    /// 稳定标签，用于日志与输出文件名。
    pub fn label(&self) -> String {
        match self {
            Self::Invert => "invert".to_string(),
            Self::Grayscale => "grayscale".to_string(),
            Self::Rotate(rotation) => format!("rotate{}", rotation.degrees()),
            Self::Scale { width, height } => format!("scale{}x{}", width, height),
            Self::NoiseReduction => "denoise".to_string(),
            Self::HistogramEqualize => "equalize".to_string(),
        }
    }

    /// 对栅格执行该操作，返回新栅格；输入不变。
    pub fn apply(&self, raster: &DecodedRaster) -> Result<DecodedRaster, ImageError> {
        match self {
            Self::Invert => Ok(invert(raster)),
            Self::Grayscale => grayscale(raster),
            Self::Rotate(rotation) => rotate(raster, *rotation),
            Self::Scale { width, height } => scale(raster, *width, *height),
            Self::NoiseReduction => noise_reduction(raster),
            Self::HistogramEqualize => histogram_equalize(raster),
        }
    }
}

/// 原地反色：R/G/B 取 `255 - value`，A 不变。
///
/// 缓冲长度须为 4 的倍数，末尾不足 4 字节的部分不处理。
pub fn invert_rgba_in_place(pixels: &mut [u8]) {
    for pixel in pixels.chunks_exact_mut(4) {
        pixel[0] = 255 - pixel[0];
        pixel[1] = 255 - pixel[1];
        pixel[2] = 255 - pixel[2];
    }
}

/// 反色，返回与输入同尺寸的新栅格。
pub fn invert(raster: &DecodedRaster) -> DecodedRaster {
    let mut output = raster.clone();
    invert_rgba_in_place(output.pixels_mut());
    output
}

fn grayscale(raster: &DecodedRaster) -> Result<DecodedRaster, ImageError> {
    let image = DynamicImage::ImageRgba8(raster.to_rgba_image()?);
    Ok(DecodedRaster::from_rgba_image(image.grayscale().to_rgba8()))
}

fn rotate(raster: &DecodedRaster, rotation: Rotation) -> Result<DecodedRaster, ImageError> {
    let image = raster.to_rgba_image()?;
    let rotated = match rotation {
        Rotation::Deg90 => imageops::rotate90(&image),
        Rotation::Deg180 => imageops::rotate180(&image),
        Rotation::Deg270 => imageops::rotate270(&image),
    };
    Ok(DecodedRaster::from_rgba_image(rotated))
}

fn scale(raster: &DecodedRaster, width: u32, height: u32) -> Result<DecodedRaster, ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidOperation("缩放尺寸必须大于 0".to_string()));
    }

    match resize_with_fast_image_resize(raster, width, height) {
        Ok(resized) => Ok(resized),
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 缩放失败，回退 imageops::resize：{}", err);
            let image = raster.to_rgba_image()?;
            let resized = imageops::resize(&image, width, height, FilterType::Lanczos3);
            Ok(DecodedRaster::from_rgba_image(resized))
        }
    }
}

fn resize_with_fast_image_resize(
    raster: &DecodedRaster,
    target_width: u32,
    target_height: u32,
) -> Result<DecodedRaster, ImageError> {
    let (src_width, src_height) = raster.dimensions();
    let src_image = fr::images::Image::from_vec_u8(
        src_width,
        src_height,
        raster.pixels().to_vec(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| ImageError::Decode(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ImageError::Decode(format!("fast_image_resize 执行失败：{}", e)))?;

    DecodedRaster::new(target_width, target_height, dst_image.into_vec())
}

fn noise_reduction(raster: &DecodedRaster) -> Result<DecodedRaster, ImageError> {
    let image = raster.to_rgba_image()?;
    let filtered: RgbaImage = imageops::filter3x3(&image, &NOISE_REDUCTION_KERNEL);
    Ok(DecodedRaster::from_rgba_image(filtered))
}

/// 直方图均衡：基于亮度的累计直方图重新映射，输出不透明灰度图。
fn histogram_equalize(raster: &DecodedRaster) -> Result<DecodedRaster, ImageError> {
    let gray_image = DynamicImage::ImageRgba8(raster.to_rgba_image()?).to_luma8();

    let mut histogram = [0u64; 256];
    for pixel in gray_image.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    let mut cumulative = [0u64; 256];
    let mut sum = 0u64;
    for (count, slot) in histogram.iter().zip(cumulative.iter_mut()) {
        sum += *count;
        *slot = sum;
    }

    let max_value = cumulative[255];
    if max_value == 0 {
        return Ok(raster.clone());
    }

    let lookup: Vec<u8> = cumulative
        .iter()
        .map(|&value| ((value as f64 / max_value as f64) * 255.0) as u8)
        .collect();

    let equalized = ImageBuffer::from_fn(gray_image.width(), gray_image.height(), |x, y| {
        let value = lookup[gray_image.get_pixel(x, y)[0] as usize];
        Rgba([value, value, value, 255])
    });

    Ok(DecodedRaster::from_rgba_image(equalized))
}
