//! 矩形裁剪区域.

use crate::Idx2d;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 像素坐标系下的矩形裁剪区域, 左闭右开.
///
/// 保留的行为 `top..bottom`, 保留的列为 `left..right`.
/// 同一切片的四个通道使用同一个裁剪区域, 以保持空间对应关系.
///
/// 该结构是只读的. 若要修改区域, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CropRect {
    left: usize,
    top: usize,
    right: usize,
    bottom: usize,
}

impl CropRect {
    /// 构建裁剪区域.
    ///
    /// 区域必须非空 (`left < right` 且 `top < bottom`), 否则返回 `None`.
    pub fn new(left: usize, top: usize, right: usize, bottom: usize) -> Option<Self> {
        (left < right && top < bottom).then_some(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    /// 按历史 "trim" 参数的顺序构建: `[行起点, 行终点, 列起点, 列终点]`,
    /// 即 `[top, bottom, left, right]`.
    #[inline]
    pub fn from_trim([top, bottom, left, right]: [usize; 4]) -> Option<Self> {
        Self::new(left, top, right, bottom)
    }

    /// 转换回 "trim" 顺序 `[top, bottom, left, right]`.
    #[inline]
    pub fn to_trim(&self) -> [usize; 4] {
        [self.top, self.bottom, self.left, self.right]
    }

    /// 左边界 (包含).
    #[inline]
    pub fn left(&self) -> usize {
        self.left
    }

    /// 上边界 (包含).
    #[inline]
    pub fn top(&self) -> usize {
        self.top
    }

    /// 右边界 (不包含).
    #[inline]
    pub fn right(&self) -> usize {
        self.right
    }

    /// 下边界 (不包含).
    #[inline]
    pub fn bottom(&self) -> usize {
        self.bottom
    }

    /// 裁剪后的形状 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        (self.bottom - self.top, self.right - self.left)
    }

    /// 该区域能否从形状为 `(h, w)` 的图像中裁剪出来.
    #[inline]
    pub fn fits(&self, (h, w): Idx2d) -> bool {
        self.bottom <= h && self.right <= w
    }
}

#[cfg(test)]
mod tests {
    use super::CropRect;

    #[test]
    fn test_crop_rect_invalid_input() {
        assert!(CropRect::new(3, 0, 3, 5).is_none());
        assert!(CropRect::new(0, 5, 3, 4).is_none());
        assert!(CropRect::from_trim([10, 10, 0, 4]).is_none());
    }

    #[test]
    fn test_crop_rect_trim_order() {
        let r = CropRect::from_trim([10, 30, 5, 45]).unwrap();
        assert_eq!((r.top(), r.bottom(), r.left(), r.right()), (10, 30, 5, 45));
        assert_eq!(r.shape(), (20, 40));
        assert_eq!(r.to_trim(), [10, 30, 5, 45]);
    }

    #[test]
    fn test_crop_rect_fits() {
        let r = CropRect::new(0, 0, 4, 3).unwrap();
        assert!(r.fits((3, 4)));
        assert!(!r.fits((2, 4)));
        assert!(!r.fits((3, 3)));
    }
}
