//! 通用常量.

/// 组织分类相关的领域标定常量.
///
/// 这些值来自临床标定, 不是推导出来的, 也不应按调用方调整.
pub mod tissue {
    use crate::classify::HuBand;

    /// 棕色脂肪候选的 HU 区间, 对 80KV 和 140KV 均适用.
    pub const BROWN_BAND: HuBand = HuBand::new(-130.0, 0.0);

    /// 棕色脂肪候选需满足 `high - BROWN_MAX_DROP < low`.
    pub const BROWN_MAX_DROP: f32 = 30.0;

    /// 棕色脂肪 mask 的圆盘腐蚀半径.
    pub const BROWN_EROSION_RADIUS: usize = 2;

    /// 棕色脂肪 mask 保留的最小 4-连通域像素数.
    pub const BROWN_MIN_AREA: usize = 64;

    /// 白色脂肪候选的 HU 区间, 对 80KV 和 140KV 均适用.
    pub const WHITE_BAND: HuBand = HuBand::new(-200.0, 0.0);

    /// 白色脂肪 mask 的圆盘腐蚀半径.
    pub const WHITE_EROSION_RADIUS: usize = 5;

    /// 白色脂肪 mask 保留的最小 4-连通域像素数.
    pub const WHITE_MIN_AREA: usize = 32;

    /// 差值图中 "非棕色脂肪" 的哨兵值.
    pub const DIFF_SENTINEL: f32 = -100.0;
}

/// 双边滤波参数.
pub mod bilateral {
    /// 空间域高斯标准差 (像素).
    pub const SIGMA_SPATIAL: f64 = 2.0;

    /// 值域高斯标准差 (HU).
    pub const SIGMA_COLOR: f64 = 5.0;
}

/// 输出 DICOM 序列的固定元信息.
pub mod series {
    /// 占位病人姓名.
    pub const PATIENT_NAME: &str = "Test^Firstname";

    /// 占位病人 ID.
    pub const PATIENT_ID: &str = "123456";

    /// 模态.
    pub const MODALITY: &str = "CT";

    /// UUID 派生 UID 的根 (ISO/IEC 9834-8).
    pub const UUID_UID_ROOT: &str = "2.25";

    /// 棕色脂肪 mask 序列的文件名与描述.
    pub const BROWN_MASK: (&str, &str) = ("BROWN_MASK.DCM", "brown_mask");

    /// 白色脂肪 mask 序列的文件名与描述.
    pub const WHITE_MASK: (&str, &str) = ("WHITE_MASK.DCM", "white_mask");

    /// 差值图序列的文件名与描述.
    pub const DIFF_MAP: (&str, &str) = ("DIFF_MAP.DCM", "diff_map");
}

/// npz 归档中 mask 栈的键名. 四个 HU 通道的键名见 [`crate::Channel::archive_key`].
pub mod archive {
    /// 棕色脂肪 mask 栈.
    pub const BROWN_MASK_KEY: &str = "brown_mask_maps";

    /// 白色脂肪 mask 栈.
    pub const WHITE_MASK_KEY: &str = "white_mask_maps";
}

/// 输入切片文件的扩展名 (大写比较).
pub const SCAN_EXTENSION: &str = ".IMA";
