//! 集成测试共用的合成 DICOM 切片与目录布局.

#![allow(dead_code)]

use bat_berry::Channel;
use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::{tags, uids, StandardDataDictionary};
use dicom::object::{FileDicomObject, FileMetaTableBuilder, InMemDicomObject};
use ndarray::Array2;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// 写入时使用的校准参数.
pub const INTERCEPT: f64 = -1024.0;

/// 初始化日志. 多个测试重复调用时只有第一次生效.
pub fn init_logger() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .env()
        .init();
}

/// 写出一张单帧 CT 切片. 存储值为 `(hu - intercept) / slope` 四舍五入后的 `i16`.
///
/// `slope` 为 `None` 时不写 rescale 元素.
pub fn write_slice(path: &Path, hu: &Array2<f32>, slope: Option<f64>) {
    slice_object(hu, slope).write_to_file(path).unwrap();
}

/// 与 [`write_slice`] 相同, 但文件不带 128 字节前导区, 直接以 `DICM` 开头.
pub fn write_slice_without_preamble(path: &Path, hu: &Array2<f32>, slope: Option<f64>) {
    // dicom-object 0.8 `write_all` always emits the 128-byte preamble,
    // so write magic code, meta group and data set separately.
    use std::io::Write;
    let mut file = std::fs::File::create(path).unwrap();
    let obj = slice_object(hu, slope);
    file.write_all(b"DICM").unwrap();
    obj.write_meta(&mut file).unwrap();
    obj.write_dataset(&mut file).unwrap();
}

fn slice_object(hu: &Array2<f32>, slope: Option<f64>) -> FileDicomObject<InMemDicomObject> {
    let (rows, cols) = hu.dim();
    let s = slope.unwrap_or(1.0);
    let bytes: Vec<u8> = hu
        .iter()
        .flat_map(|&v| ((((v as f64) - INTERCEPT) / s).round() as i16).to_le_bytes())
        .collect();

    let mut obj = InMemDicomObject::new_empty();
    let mut put = |tag, vr, value: PrimitiveValue| {
        obj.put(DataElement::new(tag, vr, value));
    };
    put(tags::SOP_CLASS_UID, VR::UI, uids::CT_IMAGE_STORAGE.into());
    put(tags::SOP_INSTANCE_UID, VR::UI, "2.25.1".into());
    put(tags::MODALITY, VR::CS, "CT".into());
    put(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16));
    put(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2".into());
    put(tags::ROWS, VR::US, PrimitiveValue::from(rows as u16));
    put(tags::COLUMNS, VR::US, PrimitiveValue::from(cols as u16));
    put(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16_u16));
    put(tags::BITS_STORED, VR::US, PrimitiveValue::from(16_u16));
    put(tags::HIGH_BIT, VR::US, PrimitiveValue::from(15_u16));
    put(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(1_u16));
    if let Some(slope) = slope {
        put(tags::RESCALE_SLOPE, VR::DS, slope.to_string().as_str().into());
        put(tags::RESCALE_INTERCEPT, VR::DS, INTERCEPT.to_string().as_str().into());
    }
    put(tags::PIXEL_DATA, VR::OW, PrimitiveValue::from(bytes));

    let meta = FileMetaTableBuilder::new()
        .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
        .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
        .media_storage_sop_instance_uid("2.25.1")
        .build()
        .unwrap();
    let mut file = FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, meta);
    for elem in obj {
        file.put(elem);
    }
    file
}

/// 四个通道的输入目录.
pub struct Fixture {
    pub root: TempDir,
    pub dirs: [PathBuf; 4],
}

impl Fixture {
    /// 创建四个空的通道目录.
    pub fn new() -> Self {
        init_logger();
        let root = tempfile::tempdir().unwrap();
        let dirs = ["80KV_PRE", "80KV_POST", "140KV_PRE", "140KV_POST"].map(|d| {
            let p = root.path().join(d);
            std::fs::create_dir(&p).unwrap();
            p
        });
        Self { root, dirs }
    }

    /// `channel` 通道的目录.
    pub fn dir(&self, channel: Channel) -> &Path {
        &self.dirs[channel.index()]
    }

    /// 第 `k` 张 (0 起始) 切片的文件名, 字典序与 `k` 一致.
    pub fn file(&self, channel: Channel, k: usize) -> PathBuf {
        self.dir(channel).join(format!("SCAN.{:04}.IMA", k + 1))
    }

    /// 在 `channel` 通道写入第 `k` 张切片.
    pub fn put(&self, channel: Channel, k: usize, hu: &Array2<f32>) {
        write_slice(&self.file(channel, k), hu, Some(1.0));
    }

    /// 在 `channel` 通道放 `n` 个空文件. 只用于不需要读取内容的测试.
    pub fn touch(&self, channel: Channel, n: usize) {
        for k in 0..n {
            std::fs::File::create(self.file(channel, k)).unwrap();
        }
    }

    /// 输出目录.
    pub fn out_dir(&self) -> PathBuf {
        self.root.path().join("output")
    }
}

/// 背景值为 `background`, 左上角 `from` 处放一个边长 `side`, 值为 `value` 的方块.
pub fn square(shape: (usize, usize), background: f32, from: (usize, usize), side: usize, value: f32) -> Array2<f32> {
    Array2::from_shape_fn(shape, |(h, w)| {
        if (from.0..from.0 + side).contains(&h) && (from.1..from.1 + side).contains(&w) {
            value
        } else {
            background
        }
    })
}
