//! 棕色/白色脂肪分割.

use crate::consts::tissue::*;
use crate::morph::{self, Disk};
use crate::{AttenuationMap, Mask};
use ndarray::Zip;

/// CT HU 闭区间 `[lower, upper]`, 与窗口无关.
#[derive(PartialEq, Copy, Clone, Debug)]
pub struct HuBand {
    lower: f32,
    upper: f32,
}

impl HuBand {
    /// 构建闭区间. 由调用方负责保证 `lower <= upper`.
    #[inline]
    pub const fn new(lower: f32, upper: f32) -> Self {
        Self { lower, upper }
    }

    /// 下界.
    #[inline]
    pub fn lower(&self) -> f32 {
        self.lower
    }

    /// 上界.
    #[inline]
    pub fn upper(&self) -> f32 {
        self.upper
    }

    /// `hu` 是否落在闭区间内. NaN 永远不在区间内.
    #[inline]
    pub fn contains(&self, hu: f32) -> bool {
        (self.lower..=self.upper).contains(&hu)
    }
}

/// 单张切片的分割结果.
#[derive(Clone, Debug)]
pub struct Classified {
    /// 棕色脂肪 mask.
    pub brown: Mask,

    /// 白色脂肪 mask.
    pub white: Mask,

    /// 差值图: 棕色脂肪处为 `low_post - high_post`, 其余为 [`DIFF_SENTINEL`].
    pub difference: AttenuationMap,
}

/// 依据去噪后的 post 切片 (80KV `low_post` 与 140KV `high_post`)
/// 生成棕色脂肪 mask, 白色脂肪 mask 和差值图.
///
/// 算法流程依次为:
///
/// 1. 棕色候选: 两个通道均落在 [`BROWN_BAND`] 内, 且
///   `high - BROWN_MAX_DROP < low`. 以半径 [`BROWN_EROSION_RADIUS`]
///   的圆盘腐蚀, 再去除像素数小于 [`BROWN_MIN_AREA`] 的 4-连通区域.
/// 2. 白色候选: 两个通道均落在 [`WHITE_BAND`] 内, 且 `high > low`.
///   以半径 [`WHITE_EROSION_RADIUS`] 的圆盘腐蚀, 再去除像素数小于
///   [`WHITE_MIN_AREA`] 的 4-连通区域.
/// 3. 差值图: 棕色 mask 为真处取 `low - high`, 否则取 [`DIFF_SENTINEL`].
///
/// 两个 mask 互相独立, 同一像素可以同时为真.
///
/// # 注意
///
/// 两张切片必须形状一致, 否则程序 panic.
pub fn classify(low_post: &AttenuationMap, high_post: &AttenuationMap) -> Classified {
    assert_eq!(
        low_post.shape(),
        high_post.shape(),
        "80KV 与 140KV 切片形状不一致"
    );

    let brown = candidates(low_post, high_post, |low, high| {
        BROWN_BAND.contains(low) && BROWN_BAND.contains(high) && high - BROWN_MAX_DROP < low
    });
    let brown = morph::erode(&brown, &Disk::new(BROWN_EROSION_RADIUS));
    let brown = morph::remove_small_objects(&brown, BROWN_MIN_AREA);

    let white = candidates(low_post, high_post, |low, high| {
        WHITE_BAND.contains(low) && WHITE_BAND.contains(high) && high > low
    });
    let white = morph::erode(&white, &Disk::new(WHITE_EROSION_RADIUS));
    let white = morph::remove_small_objects(&white, WHITE_MIN_AREA);

    let difference = Zip::from(low_post.data())
        .and(high_post.data())
        .and(brown.data())
        .map_collect(|&low, &high, &is_brown| {
            if is_brown {
                low - high
            } else {
                DIFF_SENTINEL
            }
        });

    Classified {
        brown,
        white,
        difference: AttenuationMap::new(difference),
    }
}

/// 收集逐像素满足谓词 `pred(low, high)` 的候选 mask.
#[inline]
fn candidates(
    low: &AttenuationMap,
    high: &AttenuationMap,
    pred: impl Fn(f32, f32) -> bool,
) -> Mask {
    Mask::new(
        Zip::from(low.data())
            .and(high.data())
            .map_collect(|&l, &h| pred(l, h)),
    )
}
