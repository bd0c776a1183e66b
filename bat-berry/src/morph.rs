//! 二维二值形态学操作.

use crate::{Idx2d, Mask};
use ndarray::Array2;

/// 圆盘形结构元素, 以相对中心的偏移 `(dh, dw)` 表示.
///
/// 包含所有满足 `dh² + dw² <= radius²` 的整数偏移.
#[derive(Clone, Debug)]
pub struct Disk {
    radius: usize,
    offsets: Vec<(isize, isize)>,
}

impl Disk {
    /// 构建半径为 `radius` 的圆盘.
    pub fn new(radius: usize) -> Self {
        let r = radius as isize;
        let offsets = (-r..=r)
            .flat_map(|dh| (-r..=r).map(move |dw| (dh, dw)))
            .filter(|&(dh, dw)| dh * dh + dw * dw <= r * r)
            .collect();
        Self { radius, offsets }
    }

    /// 半径.
    #[inline]
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// 结构元素包含的像素个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// 结构元素是否为空. 圆盘至少包含中心, 因此总是返回 `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// 获取 `pos` 平移 `(dh, dw)` 后的位置. 越过左/上边界时返回 `None`.
    #[inline]
    fn shift((h, w): Idx2d, (dh, dw): (isize, isize)) -> Option<Idx2d> {
        Some((h.checked_add_signed(dh)?, w.checked_add_signed(dw)?))
    }
}

/// 以 `footprint` 对 `mask` 进行二值腐蚀.
///
/// 一个像素在结果中为真, 当且仅当以它为中心的结构元素覆盖的所有像素都为真.
/// 图像外的像素视为真, 因此贴着图像边缘的前景不会被边缘腐蚀.
pub fn erode(mask: &Mask, footprint: &Disk) -> Mask {
    let data = mask.data();
    let out = Array2::from_shape_fn(mask.shape(), |pos| {
        data[pos]
            && footprint.offsets.iter().all(|&off| {
                Disk::shift(pos, off)
                    .and_then(|p| data.get(p).copied())
                    .unwrap_or(true)
            })
    });
    Mask::new(out)
}

/// 移除 `mask` 中像素数小于 `min_area` 的 4-连通区域, 返回新的 mask.
pub fn remove_small_objects(mask: &Mask, min_area: usize) -> Mask {
    let mut out = mask.clone();
    for area in mask.areas().into_iter().filter(|a| a.len() < min_area) {
        for pos in area {
            out[pos] = false;
        }
    }
    out
}
