//! 拥有所有权的二维 HU 切片与布尔 mask.

use super::CropRect;
use crate::{Area2d, Areas2d, Idx2d};
use ndarray::iter::Iter;
use ndarray::{s, Array2, ArrayView2, Ix2};
use std::collections::VecDeque;
use std::ops::{Index, IndexMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 拥有所有权的二维 CT HU 切片, 按 `(行, 列)` 访问.
///
/// 由 [`crate::data::load_hu`] 创建后不再修改; 后续阶段 (配准, 去噪)
/// 总是产生新的切片.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AttenuationMap {
    data: Array2<f32>,
}

impl Index<Idx2d> for AttenuationMap {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl From<Array2<f32>> for AttenuationMap {
    #[inline]
    fn from(data: Array2<f32>) -> Self {
        Self { data }
    }
}

impl AttenuationMap {
    /// 直接初始化.
    #[inline]
    pub fn new(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// 由行优先数据创建. 长度与 `shape` 不符时返回 `None`.
    pub fn from_shape_vec(shape: Idx2d, data: Vec<f32>) -> Option<Self> {
        Array2::from_shape_vec(shape, data).ok().map(Self::new)
    }

    /// 创建所有像素均为 `hu` 的切片.
    #[inline]
    pub fn filled(shape: Idx2d, hu: f32) -> Self {
        Self::new(Array2::from_elem(shape, hu))
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 图像的高.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape().0
    }

    /// 图像的宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().1
    }

    /// 获取给定位置 (行, 列) 的 HU 值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&f32> {
        self.data.get(pos)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// 获取可以迭代图像像素的迭代器.
    #[inline]
    pub fn iter(&self) -> Iter<'_, f32, Ix2> {
        self.data.iter()
    }

    /// 以行优先规则, 获取能迭代图像所有 `(索引, CT HU 值)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &f32)> {
        self.data.indexed_iter()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array2<f32> {
        self.data
    }

    /// 按 `rect` 裁剪出新的切片. 区域超出图像范围时返回 `None`.
    pub fn crop(&self, rect: CropRect) -> Option<Self> {
        rect.fits(self.shape()).then(|| {
            Self::new(
                self.data
                    .slice(s![rect.top()..rect.bottom(), rect.left()..rect.right()])
                    .to_owned(),
            )
        })
    }
}

/// 拥有所有权的二维布尔 mask, 与其来源切片形状一致.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mask {
    data: Array2<bool>,
}

impl Index<Idx2d> for Mask {
    type Output = bool;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx2d> for Mask {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl From<Array2<bool>> for Mask {
    #[inline]
    fn from(data: Array2<bool>) -> Self {
        Self { data }
    }
}

impl Mask {
    /// 直接初始化.
    #[inline]
    pub fn new(data: Array2<bool>) -> Self {
        Self { data }
    }

    /// 创建全假的 mask.
    #[inline]
    pub fn empty(shape: Idx2d) -> Self {
        Self::new(Array2::from_elem(shape, false))
    }

    /// mask 的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// mask 的高.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape().0
    }

    /// mask 的宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().1
    }

    /// 获取给定位置的值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<bool> {
        self.data.get(pos).copied()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView2<'_, bool> {
        self.data.view()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array2<bool> {
        self.data
    }

    /// 为真的像素个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|p| **p).count()
    }

    /// 是否全假?
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|p| *p)
    }

    /// 按 `rect` 裁剪出新的 mask. 区域超出范围时返回 `None`.
    pub fn crop(&self, rect: CropRect) -> Option<Self> {
        rect.fits(self.shape()).then(|| {
            Self::new(
                self.data
                    .slice(s![rect.top()..rect.bottom(), rect.left()..rect.right()])
                    .to_owned(),
            )
        })
    }

    /// 按照 4-相邻规则获取所有为真的区域. 两个像素 `p1` 和 `p2` 属于同一个区域,
    /// 当且仅当存在一条从 `p1` 到 `p2` 的 4-相邻路径, 且路径上的所有像素都为真.
    ///
    /// 区域按其行优先序第一个像素排列, 保证每次运行产生同样的结果.
    pub fn areas(&self) -> Areas2d {
        let (height, width) = self.shape();
        let mut ans = Areas2d::new();
        let mut visited = Array2::from_elem((height, width), false);
        let mut bfs_q = VecDeque::with_capacity(16);

        for (pos, &pix) in self.data.indexed_iter() {
            if !pix || visited[pos] {
                continue;
            }
            visited[pos] = true;
            bfs_q.push_back(pos);
            let mut this_area = Area2d::with_capacity(1);
            while let Some(cur_pos) = bfs_q.pop_front() {
                this_area.push(cur_pos);

                // bfs
                let (cur_h, cur_w) = cur_pos;
                let neighbours = [
                    (cur_h.wrapping_sub(1), cur_w),
                    (cur_h.saturating_add(1), cur_w),
                    (cur_h, cur_w.wrapping_sub(1)),
                    (cur_h, cur_w.saturating_add(1)),
                ];
                for next in neighbours {
                    if self.get(next) == Some(true) && !visited[next] {
                        visited[next] = true;
                        bfs_q.push_back(next);
                    }
                }
            }
            ans.push(this_area);
        }
        ans
    }

    /// 转换为 0/1 的 16 位有符号整数图像.
    #[inline]
    pub fn to_i16(&self) -> Array2<i16> {
        self.data.mapv(i16::from)
    }
}
