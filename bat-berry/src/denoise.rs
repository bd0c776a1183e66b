//! 保边去噪.

use crate::consts::bilateral::{SIGMA_COLOR, SIGMA_SPATIAL};
use crate::AttenuationMap;
use ndarray::Array2;

/// 双边滤波器.
///
/// 每个输出像素是其邻域像素的加权平均, 权重为空间高斯 (距离) 与值域高斯
/// (HU 差) 的乘积. 值域权重使跨越组织边界的大幅 HU 跳变几乎不参与平均,
/// 从而在抑制小幅噪声的同时保留边缘.
///
/// 窗口半径为 `max(2, ceil(3 * sigma_spatial))`. 图像外的邻居不参与加权.
/// 该滤波器不持有可变状态, 可在多个线程间共享.
#[derive(Clone, Debug)]
pub struct Bilateral {
    sigma_color: f64,
    radius: usize,

    /// 预先计算的 `(dh, dw, 空间权重)`.
    kernel: Vec<(isize, isize, f64)>,
}

impl Default for Bilateral {
    /// 空间标准差 2 像素, 值域标准差 5 HU.
    #[inline]
    fn default() -> Self {
        Self::new(SIGMA_SPATIAL, SIGMA_COLOR).unwrap()
    }
}

impl Bilateral {
    /// 构建双边滤波器.
    ///
    /// 两个标准差都必须是有限正数, 否则返回 `None`.
    pub fn new(sigma_spatial: f64, sigma_color: f64) -> Option<Self> {
        let valid = |s: f64| s.is_finite() && s > 0.0;
        if !valid(sigma_spatial) || !valid(sigma_color) {
            return None;
        }
        let radius = ((3.0 * sigma_spatial).ceil() as usize).max(2);
        let r = radius as isize;
        let denom = 2.0 * sigma_spatial * sigma_spatial;
        let kernel = (-r..=r)
            .flat_map(|dh| (-r..=r).map(move |dw| (dh, dw)))
            .map(|(dh, dw)| (dh, dw, (-((dh * dh + dw * dw) as f64) / denom).exp()))
            .collect();
        Some(Self {
            sigma_color,
            radius,
            kernel,
        })
    }

    /// 窗口半径 (像素).
    #[inline]
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// 对 `map` 滤波, 返回形状相同的新切片.
    pub fn apply(&self, map: &AttenuationMap) -> AttenuationMap {
        let data = map.data();
        let color_denom = 2.0 * self.sigma_color * self.sigma_color;

        let out = Array2::from_shape_fn(map.shape(), |(h, w)| {
            let center = data[(h, w)] as f64;
            let mut acc = 0.0;
            let mut norm = 0.0;
            for &(dh, dw, spatial) in self.kernel.iter() {
                let (Some(nh), Some(nw)) = (h.checked_add_signed(dh), w.checked_add_signed(dw))
                else {
                    continue;
                };
                let Some(&v) = data.get((nh, nw)) else {
                    continue;
                };
                let v = v as f64;
                let diff = v - center;
                let weight = spatial * (-(diff * diff) / color_denom).exp();
                acc += weight * v;
                norm += weight;
            }
            // 中心像素权重为 1, `norm` 不会为 0.
            (acc / norm) as f32
        });
        AttenuationMap::new(out)
    }
}
