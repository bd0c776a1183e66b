//! 从单帧 DICOM 文件加载经校准的 HU 切片.

use super::{AttenuationMap, CropRect};
use crate::Idx2d;
use dicom::dictionary_std::tags;
use dicom::object::file::{OpenFileOptions, ReadPreamble};
use dicom::object::{DefaultDicomObject, Tag};
use dicom::pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 加载 HU 切片的错误.
#[derive(Debug, Error)]
pub enum LoadError {
    /// 目录或文件的底层 I/O 错误.
    #[error("访问 `{}` 失败: {source}", .path.display())]
    Io {
        /// 出错的路径.
        path: PathBuf,
        /// 底层错误.
        source: std::io::Error,
    },

    /// 文件无法打开, 或 DICOM 对象/像素数据无法解析.
    #[error("无法读取 `{}`: {reason}", .path.display())]
    Dicom {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误描述.
        reason: String,
    },

    /// 缺少 HU 校准所需的 rescale 元素.
    #[error("`{}` 缺少校准元素 {element}", .path.display())]
    MissingCalibration {
        /// 文件路径.
        path: PathBuf,
        /// 缺少的元素名.
        element: &'static str,
    },

    /// 像素数据的长度不足一帧.
    #[error("`{}` 的像素数据不完整: 期望 {expected} 个, 实际 {found} 个", .path.display())]
    Truncated {
        /// 文件路径.
        path: PathBuf,
        /// 一帧应有的像素数.
        expected: usize,
        /// 实际解码出的像素数.
        found: usize,
    },

    /// 裁剪区域超出图像范围.
    #[error("`{}` 的裁剪区域 {crop:?} 超出图像范围 {shape:?}", .path.display())]
    CropOutOfBounds {
        /// 文件路径.
        path: PathBuf,
        /// 裁剪区域.
        crop: CropRect,
        /// 图像原始形状 (高, 宽).
        shape: Idx2d,
    },

    /// 同一通道内的切片形状不一致, 无法堆叠.
    #[error("`{}` 的形状 {found:?} 与本批次切片形状 {expected:?} 不一致", .path.display())]
    ShapeMismatch {
        /// 文件路径.
        path: PathBuf,
        /// 本批次第一张切片的形状.
        expected: Idx2d,
        /// 该文件的形状.
        found: Idx2d,
    },
}

impl LoadError {
    #[inline]
    fn dicom(path: &Path, e: impl std::fmt::Display) -> Self {
        Self::Dicom {
            path: path.to_owned(),
            reason: e.to_string(),
        }
    }
}

/// 打开单帧 DICOM 文件, 读取像素并按 `RescaleSlope` / `RescaleIntercept`
/// 换算为 CT HU 值, 然后按 `crop` (若有) 裁剪.
///
/// 裁剪发生在校准之后. 多帧对象只读取第一帧.
///
/// # 错误
///
/// - 文件不可读或无法解码时返回 [`LoadError::Dicom`];
/// - 缺少任一 rescale 元素时返回 [`LoadError::MissingCalibration`];
/// - 裁剪区域越界时返回 [`LoadError::CropOutOfBounds`].
pub fn load_hu<P: AsRef<Path>>(path: P, crop: Option<CropRect>) -> Result<AttenuationMap, LoadError> {
    let path = path.as_ref();
    // 部分设备导出的 `.IMA` 没有 128 字节前导区, 只以 `DICM` 开头.
    let obj = OpenFileOptions::new()
        .read_preamble(ReadPreamble::Auto)
        .open_file(path)
        .map_err(|e| LoadError::dicom(path, e))?;

    let slope = calibration(&obj, path, tags::RESCALE_SLOPE, "RescaleSlope")?;
    let intercept = calibration(&obj, path, tags::RESCALE_INTERCEPT, "RescaleIntercept")?;

    let decoded = obj
        .decode_pixel_data()
        .map_err(|e| LoadError::dicom(path, e))?;
    let shape = (decoded.rows() as usize, decoded.columns() as usize);

    // rescale 由我们自己施加, 因此这里取存储值.
    let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
    let stored: Vec<f32> = decoded
        .to_vec_with_options(&options)
        .map_err(|e| LoadError::dicom(path, e))?;

    let frame = shape.0 * shape.1;
    if stored.len() < frame {
        return Err(LoadError::Truncated {
            path: path.to_owned(),
            expected: frame,
            found: stored.len(),
        });
    }
    let hu = stored[..frame]
        .iter()
        .map(|&v| (v as f64 * slope + intercept) as f32)
        .collect();
    // 长度已检查, 不会返回 `None`, 可直接 unwrap.
    let map = AttenuationMap::from_shape_vec(shape, hu).unwrap();

    match crop {
        None => Ok(map),
        Some(rect) => map.crop(rect).ok_or(LoadError::CropOutOfBounds {
            path: path.to_owned(),
            crop: rect,
            shape,
        }),
    }
}

/// 读取一个必需的校准元素.
fn calibration(
    obj: &DefaultDicomObject,
    path: &Path,
    tag: Tag,
    element: &'static str,
) -> Result<f64, LoadError> {
    // 内存对象上的访问只会因元素不存在而失败.
    let elem = obj.element(tag).map_err(|_| LoadError::MissingCalibration {
        path: path.to_owned(),
        element,
    })?;
    elem.to_float64().map_err(|e| LoadError::dicom(path, e))
}
