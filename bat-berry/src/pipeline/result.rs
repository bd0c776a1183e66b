use crate::{AttenuationMap, Channel, Classified, Idx3d};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 单张切片的配准情况.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RegistrationStatus {
    /// 批次未开启配准.
    Disabled,

    /// 配准成功, 附带配准得分.
    Aligned {
        /// 配准得分.
        score: f64,
    },

    /// 配准失败, 该切片按未配准处理. 附带失败原因.
    Skipped(String),
}

/// 单张切片的处理报告.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SliceReport {
    /// 在窗口内的位置 (0 起始).
    pub slice: usize,

    /// 配准情况.
    pub registration: RegistrationStatus,

    /// 棕色脂肪像素数.
    pub brown_pixels: usize,

    /// 白色脂肪像素数.
    pub white_pixels: usize,
}

/// 单张切片全部处理完后的产物.
pub(crate) struct SliceOutput {
    pub(crate) maps: [AttenuationMap; 4],
    pub(crate) classified: Classified,
    pub(crate) report: SliceReport,
}

/// 一个批次的全部结果. 所有栈的形状均为 `[切片, 行, 列]`, 按切片序排列.
#[derive(Clone, Debug)]
pub struct BatchResult {
    name: String,
    start_scan: usize,
    display_index: usize,
    maps: [Array3<f32>; 4],
    brown: Array3<bool>,
    white: Array3<bool>,
    difference: Array3<f32>,
    reports: Vec<SliceReport>,
}

impl BatchResult {
    /// 按切片序组装结果.
    ///
    /// # 注意
    ///
    /// `slices` 必须非空, 且所有切片形状一致, 否则程序 panic.
    pub(crate) fn assemble(
        name: String,
        start_scan: usize,
        display_index: usize,
        slices: Vec<SliceOutput>,
    ) -> Self {
        let (height, width) = slices[0].maps[0].shape();
        let shape = (slices.len(), height, width);

        let mut maps = [(); 4].map(|_| Array3::zeros(shape));
        let mut brown = Array3::from_elem(shape, false);
        let mut white = Array3::from_elem(shape, false);
        let mut difference = Array3::zeros(shape);
        let mut reports = Vec::with_capacity(slices.len());

        for (i, out) in slices.into_iter().enumerate() {
            for (stack, map) in maps.iter_mut().zip(out.maps.iter()) {
                stack.index_axis_mut(Axis(0), i).assign(&map.data());
            }
            brown.index_axis_mut(Axis(0), i).assign(&out.classified.brown.data());
            white.index_axis_mut(Axis(0), i).assign(&out.classified.white.data());
            difference
                .index_axis_mut(Axis(0), i)
                .assign(&out.classified.difference.data());
            reports.push(out.report);
        }

        Self {
            name,
            start_scan,
            display_index,
            maps,
            brown,
            white,
            difference,
            reports,
        }
    }

    /// 批次名.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 切片数.
    #[inline]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// 是否没有切片. 成功的批次总是至少有一张切片.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// 栈的形状 `(切片, 行, 列)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.brown.dim()
    }

    /// 某一通道去噪后的 HU 栈 (pre 通道在开启配准时为配准后的结果).
    #[inline]
    pub fn maps(&self, channel: Channel) -> ArrayView3<'_, f32> {
        self.maps[channel.index()].view()
    }

    /// 棕色脂肪 mask 栈.
    #[inline]
    pub fn brown_masks(&self) -> ArrayView3<'_, bool> {
        self.brown.view()
    }

    /// 白色脂肪 mask 栈.
    #[inline]
    pub fn white_masks(&self) -> ArrayView3<'_, bool> {
        self.white.view()
    }

    /// 差值图栈.
    #[inline]
    pub fn differences(&self) -> ArrayView3<'_, f32> {
        self.difference.view()
    }

    /// 每张切片的处理报告.
    #[inline]
    pub fn reports(&self) -> &[SliceReport] {
        &self.reports
    }

    /// 展示用切片在栈中的位置, 即 `display_index - start_scan`.
    /// 窗口被截断导致越界时返回 `None`.
    pub fn display_slice(&self) -> Option<usize> {
        let i = self.display_index.checked_sub(self.start_scan)?;
        (i < self.len()).then_some(i)
    }

    /// 展示用切片的 `(80KV post, 140KV post)`.
    pub fn image_pair(&self) -> Option<(ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        let i = self.display_slice()?;
        Some((
            self.maps(Channel::LowPost).index_axis_move(Axis(0), i),
            self.maps(Channel::HighPost).index_axis_move(Axis(0), i),
        ))
    }

    /// 展示用切片的 `(棕色脂肪 mask, 白色脂肪 mask)`.
    pub fn mask_pair(&self) -> Option<(ArrayView2<'_, bool>, ArrayView2<'_, bool>)> {
        let i = self.display_slice()?;
        Some((
            self.brown.index_axis(Axis(0), i),
            self.white.index_axis(Axis(0), i),
        ))
    }

    /// 某一切片的差值图副本.
    pub fn difference(&self, slice: usize) -> Option<Array2<f32>> {
        (slice < self.len()).then(|| self.difference.index_axis(Axis(0), slice).to_owned())
    }
}

/// 一次成功写出的所有文件.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outputs {
    /// 批次输出目录 `{输出目录}/{批次}`.
    pub dir: PathBuf,

    /// npz 归档.
    pub archive: PathBuf,

    /// 7 个 DICOM 文件, 顺序为四个通道, 棕色 mask, 白色 mask, 差值图.
    pub series: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mask;

    fn slice(v: f32, brown: bool) -> SliceOutput {
        let map = AttenuationMap::filled((2, 3), v);
        SliceOutput {
            maps: [(); 4].map(|_| map.clone()),
            classified: Classified {
                brown: Mask::new(Array2::from_elem((2, 3), brown)),
                white: Mask::empty((2, 3)),
                difference: AttenuationMap::filled((2, 3), v),
            },
            report: SliceReport {
                slice: v as usize,
                registration: RegistrationStatus::Disabled,
                brown_pixels: if brown { 6 } else { 0 },
                white_pixels: 0,
            },
        }
    }

    #[test]
    fn test_assemble_and_pairs() {
        let r = BatchResult::assemble(
            "B".into(),
            3,
            4,
            vec![slice(0.0, false), slice(1.0, true), slice(2.0, false)],
        );
        assert_eq!(r.len(), 3);
        assert_eq!(r.shape(), (3, 2, 3));
        assert_eq!(r.maps(Channel::HighPre)[(2, 1, 1)], 2.0);
        assert_eq!(r.display_slice(), Some(1));

        let (low, high) = r.image_pair().unwrap();
        assert!(low.iter().chain(high.iter()).all(|&v| v == 1.0));
        let (brown, white) = r.mask_pair().unwrap();
        assert!(brown.iter().all(|&b| b));
        assert!(!white.iter().any(|&b| b));

        let slices: Vec<_> = r.reports().iter().map(|s| s.slice).collect();
        assert_eq!(slices, [0, 1, 2]);
        assert_eq!(r.difference(2).unwrap()[(0, 0)], 2.0);
        assert!(r.difference(3).is_none());
    }

    #[test]
    fn test_display_past_truncated_window() {
        let r = BatchResult::assemble("B".into(), 1, 5, vec![slice(0.0, false)]);
        assert_eq!(r.display_slice(), None);
        assert!(r.image_pair().is_none());
        assert!(r.mask_pair().is_none());
    }
}
