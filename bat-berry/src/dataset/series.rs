use super::PersistenceError;
use crate::consts::series::{MODALITY, PATIENT_ID, PATIENT_NAME, UUID_UID_ROOT};
use dicom::core::{dicom_value, DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::{tags, uids, StandardDataDictionary};
use dicom::object::{FileDicomObject, FileMetaTableBuilder, InMemDicomObject};
use ndarray::{Array3, ArrayView3};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// 一个多帧 DICOM 对象的像素, 形状为 `[帧, 行, 列]`.
///
/// HU 值向零截断为 `i16` (超出范围时饱和), mask 转换为 0/1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeriesFrames(Array3<i16>);

impl From<ArrayView3<'_, f32>> for SeriesFrames {
    fn from(value: ArrayView3<'_, f32>) -> Self {
        // `as` 对浮点数向零截断并饱和, NaN 变为 0.
        Self(value.mapv(|v| v as i16))
    }
}

impl From<ArrayView3<'_, bool>> for SeriesFrames {
    fn from(value: ArrayView3<'_, bool>) -> Self {
        Self(value.mapv(i16::from))
    }
}

impl SeriesFrames {
    /// 帧数, 行数, 列数.
    #[inline]
    pub fn dim(&self) -> (usize, usize, usize) {
        self.0.dim()
    }

    /// 获得底层数据.
    #[inline]
    pub fn data(&self) -> &Array3<i16> {
        &self.0
    }

    /// 按帧, 行, 列的顺序编码为小端字节流.
    fn to_le_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

/// 生成新的 UUID 派生 UID (`2.25.{十进制 UUID}`).
pub fn new_uid() -> String {
    format!("{UUID_UID_ROOT}.{}", Uuid::new_v4().as_u128())
}

/// 当前日期, 格式为 DICOM DA (`YYYYMMDD`).
///
/// 取 UTC 日期而非本地日期, 因此在本地午夜前后可能与本地日历相差一天.
pub fn dicom_date() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    let (y, m, d) = civil_from_days((secs / 86_400) as i64);
    format!("{y:04}{m:02}{d:02}")
}

/// 自 1970-01-01 起的天数转为公历 `(年, 月, 日)`.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}

/// 把 `frames` 写成 `path` 处的一个多帧 CT DICOM 文件.
///
/// 每次调用都会生成新的 study/series/frame-of-reference/SOP instance UID.
/// `description` 写入 SeriesDescription.
pub fn write_series<P: AsRef<Path>>(
    path: P,
    frames: &SeriesFrames,
    description: &str,
) -> Result<(), PersistenceError> {
    let path = path.as_ref();
    let dicom_err = |e: &dyn std::fmt::Display| PersistenceError::Dicom {
        path: path.to_owned(),
        reason: e.to_string(),
    };

    let (n_frames, rows, cols) = frames.dim();
    let (rows, cols) = match (u16::try_from(rows), u16::try_from(cols)) {
        (Ok(r), Ok(c)) => (r, c),
        _ => return Err(dicom_err(&format!("图像尺寸 {rows}x{cols} 超出 DICOM 上限"))),
    };
    let sop_instance_uid = new_uid();
    let date = dicom_date();

    let mut obj = InMemDicomObject::new_empty();
    let mut put = |tag, vr, value: PrimitiveValue| {
        obj.put(DataElement::new(tag, vr, value));
    };
    put(tags::SOP_CLASS_UID, VR::UI, uids::CT_IMAGE_STORAGE.into());
    put(tags::SOP_INSTANCE_UID, VR::UI, sop_instance_uid.as_str().into());
    put(tags::STUDY_DATE, VR::DA, date.as_str().into());
    put(tags::SERIES_DATE, VR::DA, date.as_str().into());
    put(tags::ACQUISITION_DATE, VR::DA, date.as_str().into());
    put(tags::MODALITY, VR::CS, MODALITY.into());
    put(tags::SERIES_DESCRIPTION, VR::LO, description.into());
    put(tags::PATIENT_NAME, VR::PN, PATIENT_NAME.into());
    put(tags::PATIENT_ID, VR::LO, PATIENT_ID.into());
    put(tags::SLICE_THICKNESS, VR::DS, "1".into());
    put(tags::STUDY_INSTANCE_UID, VR::UI, new_uid().as_str().into());
    put(tags::SERIES_INSTANCE_UID, VR::UI, new_uid().as_str().into());
    put(tags::FRAME_OF_REFERENCE_UID, VR::UI, new_uid().as_str().into());
    put(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16));
    put(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2".into());
    put(tags::NUMBER_OF_FRAMES, VR::IS, n_frames.to_string().as_str().into());
    put(tags::ROWS, VR::US, PrimitiveValue::from(rows));
    put(tags::COLUMNS, VR::US, PrimitiveValue::from(cols));
    put(tags::PIXEL_SPACING, VR::DS, dicom_value!(Strs, ["1", "1"]));
    put(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16_u16));
    put(tags::BITS_STORED, VR::US, PrimitiveValue::from(16_u16));
    put(tags::HIGH_BIT, VR::US, PrimitiveValue::from(15_u16));
    put(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(1_u16));
    put(tags::PIXEL_DATA, VR::OW, PrimitiveValue::from(frames.to_le_bytes()));

    let meta = FileMetaTableBuilder::new()
        .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
        .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
        .media_storage_sop_instance_uid(sop_instance_uid.as_str())
        .build()
        .map_err(|e| dicom_err(&e))?;

    let mut file_obj = FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, meta);
    for elem in obj {
        file_obj.put(elem);
    }
    file_obj.write_to_file(path).map_err(|e| dicom_err(&e))
}
