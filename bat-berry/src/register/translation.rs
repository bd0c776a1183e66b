use super::{Alignment, RegistrationError, Registrar};
use crate::AttenuationMap;
use ndarray::{Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 平移变换. 输出像素 `(h, w)` 取源图像 `(h + dy, w + dx)` 处的值.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Translation {
    /// 行方向偏移.
    pub dy: f64,

    /// 列方向偏移.
    pub dx: f64,
}

impl Translation {
    /// 初始化.
    #[inline]
    pub const fn new(dy: f64, dx: f64) -> Self {
        Self { dy, dx }
    }

    /// 把 `source` 重采样到形状为 `shape` 的网格上. 使用双线性插值, 图像外取 `0.0`.
    pub fn warp(&self, source: ArrayView2<'_, f32>, shape: (usize, usize)) -> Array2<f32> {
        Array2::from_shape_fn(shape, |(h, w)| {
            bilinear(source, h as f64 + self.dy, w as f64 + self.dx)
        })
    }
}

/// 基于归一化互相关 (NCC) 的整像素平移配准.
///
/// 在 `[-max_shift, max_shift]²` 内穷举所有平移, 取重叠区域 NCC 最大者.
/// 按 `dy` 再 `dx` 由小到大的固定顺序扫描, 相同得分取先找到的一个.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TranslationRegistrar {
    max_shift: usize,
    min_correlation: f64,
}

impl Default for TranslationRegistrar {
    #[inline]
    fn default() -> Self {
        Self {
            max_shift: 10,
            min_correlation: 0.5,
        }
    }
}

impl TranslationRegistrar {
    /// 以给定的最大平移量与最低可接受 NCC 初始化.
    #[inline]
    pub fn new(max_shift: usize, min_correlation: f64) -> Self {
        Self {
            max_shift,
            min_correlation,
        }
    }

    /// 最大平移量 (像素).
    #[inline]
    pub fn max_shift(&self) -> usize {
        self.max_shift
    }

    /// 最低可接受的 NCC.
    #[inline]
    pub fn min_correlation(&self) -> f64 {
        self.min_correlation
    }
}

impl Registrar for TranslationRegistrar {
    type Transform = Translation;

    fn align(
        &self,
        fixed: &AttenuationMap,
        moving: &AttenuationMap,
    ) -> Result<Alignment<Translation>, RegistrationError> {
        if fixed.shape() != moving.shape() {
            return Err(RegistrationError::ShapeMismatch {
                fixed: fixed.shape(),
                moving: moving.shape(),
            });
        }
        let (height, width) = fixed.shape();
        let max_dy = self.max_shift.min(height.saturating_sub(1)) as isize;
        let max_dx = self.max_shift.min(width.saturating_sub(1)) as isize;

        let mut best: Option<(f64, isize, isize)> = None;
        for dy in -max_dy..=max_dy {
            for dx in -max_dx..=max_dx {
                let Some(score) = ncc(fixed.data(), moving.data(), dy, dx) else {
                    continue;
                };
                if best.map_or(true, |(s, _, _)| score > s) {
                    best = Some((score, dy, dx));
                }
            }
        }

        let Some((score, dy, dx)) = best else {
            return Err(RegistrationError::NotConverged {
                reason: "重叠区域灰度恒定, 相关系数无定义".to_string(),
            });
        };
        if score < self.min_correlation {
            return Err(RegistrationError::NotConverged {
                reason: format!("最佳相关系数 {score:.4} 低于 {}", self.min_correlation),
            });
        }

        let transform = Translation::new(dy as f64, dx as f64);
        let aligned = self.resample(moving, fixed, &transform);
        Ok(Alignment {
            fixed: fixed.clone(),
            moving: aligned,
            transform,
            score,
        })
    }

    #[inline]
    fn resample(
        &self,
        source: &AttenuationMap,
        reference: &AttenuationMap,
        transform: &Translation,
    ) -> AttenuationMap {
        AttenuationMap::new(transform.warp(source.data(), reference.shape()))
    }
}

/// `fixed(h, w)` 与 `moving(h + dy, w + dx)` 在重叠区域上的 NCC.
///
/// 重叠为空, 或任一方在重叠区域上灰度恒定时返回 `None`.
fn ncc(fixed: ArrayView2<'_, f32>, moving: ArrayView2<'_, f32>, dy: isize, dx: isize) -> Option<f64> {
    let (height, width) = fixed.dim();
    let (h0, h1) = overlap(height, dy)?;
    let (w0, w1) = overlap(width, dx)?;
    let pairs = || {
        (h0..h1).flat_map(move |h| {
            (w0..w1).map(move |w| {
                let m = moving[((h as isize + dy) as usize, (w as isize + dx) as usize)];
                (fixed[(h, w)] as f64, m as f64)
            })
        })
    };

    let n = ((h1 - h0) * (w1 - w0)) as f64;
    let (sf, sm) = pairs().fold((0.0, 0.0), |(a, b), (f, m)| (a + f, b + m));
    let (mf, mm) = (sf / n, sm / n);

    let (mut cov, mut vf, mut vm) = (0.0, 0.0, 0.0);
    for (f, m) in pairs() {
        let (f, m) = (f - mf, m - mm);
        cov += f * m;
        vf += f * f;
        vm += m * m;
    }
    let score = cov / (vf * vm).sqrt();
    score.is_finite().then_some(score)
}

/// 长度为 `len` 的轴平移 `d` 后与自身的重叠区间 `[lo, hi)`.
#[inline]
fn overlap(len: usize, d: isize) -> Option<(usize, usize)> {
    let lo = (-d).max(0) as usize;
    let hi = (len as isize - d.max(0)).max(0) as usize;
    (lo < hi).then_some((lo, hi))
}

/// 双线性插值. 图像外的像素取 `0.0`.
fn bilinear(source: ArrayView2<'_, f32>, y: f64, x: f64) -> f32 {
    let y0 = y.floor();
    let x0 = x.floor();
    let fy = (y - y0) as f32;
    let fx = (x - x0) as f32;

    let pixel = |y: f64, x: f64| -> f32 {
        if y < 0.0 || x < 0.0 {
            return 0.0;
        }
        source.get((y as usize, x as usize)).copied().unwrap_or(0.0)
    };

    let p00 = pixel(y0, x0);
    if fx == 0.0 && fy == 0.0 {
        return p00;
    }
    let p01 = pixel(y0, x0 + 1.0);
    let p10 = pixel(y0 + 1.0, x0);
    let p11 = pixel(y0 + 1.0, x0 + 1.0);

    let top = p00 + fx * (p01 - p00);
    let bottom = p10 + fx * (p11 - p10);
    top + fy * (bottom - top)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 两个不对称的高斯团, 在实数坐标上定义.
    fn pattern(y: isize, x: isize) -> f32 {
        let blob = |cy: f64, cx: f64, s: f64, amp: f64| {
            let (dy, dx) = (y as f64 - cy, x as f64 - cx);
            amp * (-(dy * dy + dx * dx) / s).exp()
        };
        (blob(20.0, 25.0, 50.0, 100.0) + blob(35.0, 12.0, 20.0, 30.0) - 80.0) as f32
    }

    fn shifted(shape: (usize, usize), dy: isize, dx: isize) -> AttenuationMap {
        AttenuationMap::new(Array2::from_shape_fn(shape, |(h, w)| {
            pattern(h as isize - dy, w as isize - dx)
        }))
    }

    #[test]
    fn test_overlap() {
        assert_eq!(overlap(10, 0), Some((0, 10)));
        assert_eq!(overlap(10, 3), Some((0, 7)));
        assert_eq!(overlap(10, -3), Some((3, 10)));
        assert_eq!(overlap(3, 3), None);
        assert_eq!(overlap(3, -5), None);
    }

    #[test]
    fn test_recover_translation() {
        let fixed = shifted((48, 48), 0, 0);
        // moving(h, w) = fixed(h - 3, w + 2)
        let moving = shifted((48, 48), 3, -2);

        let reg = TranslationRegistrar::default();
        let out = reg.align(&fixed, &moving).unwrap();
        assert_eq!(out.transform, Translation::new(3.0, -2.0));
        assert!(out.score > 0.999);
        assert_eq!(out.fixed, fixed);

        // 在 moving 覆盖的区域内与 fixed 完全一致, 之外为 0.
        for ((h, w), &v) in out.moving.indexed_iter() {
            if h + 3 < 48 && w >= 2 {
                assert_eq!(v, fixed[(h, w)]);
            } else {
                assert_eq!(v, 0.0);
            }
        }
    }

    #[test]
    fn test_identity_is_deterministic() {
        let fixed = shifted((32, 40), 0, 0);
        let reg = TranslationRegistrar::default();
        let a = reg.align(&fixed, &fixed).unwrap();
        let b = reg.align(&fixed, &fixed).unwrap();
        assert_eq!(a.transform, Translation::default());
        assert_eq!(a.transform, b.transform);
        assert_eq!(a.moving, b.moving);
        assert_eq!(a.moving, fixed);
    }

    #[test]
    fn test_flat_input_not_converged() {
        let flat = AttenuationMap::filled((16, 16), -50.0);
        let reg = TranslationRegistrar::default();
        assert!(matches!(
            reg.align(&flat, &flat),
            Err(RegistrationError::NotConverged { .. })
        ));
    }

    #[test]
    fn test_low_correlation_not_converged() {
        let fixed = shifted((32, 32), 0, 0);
        let inverted = AttenuationMap::new(fixed.data().mapv(|v| -v));
        let reg = TranslationRegistrar::new(2, 0.5);
        assert!(matches!(
            reg.align(&fixed, &inverted),
            Err(RegistrationError::NotConverged { .. })
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let reg = TranslationRegistrar::default();
        let err = reg
            .align(&AttenuationMap::filled((4, 4), 0.0), &AttenuationMap::filled((4, 5), 0.0))
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::ShapeMismatch {
                fixed: (4, 4),
                moving: (4, 5)
            }
        );
    }

    #[test]
    fn test_resample_fill_and_bilinear() {
        let source = AttenuationMap::new(Array2::from_shape_fn((4, 4), |(h, w)| (h * 4 + w) as f32));
        let reference = AttenuationMap::filled((4, 4), 0.0);
        let reg = TranslationRegistrar::default();

        let out = reg.resample(&source, &reference, &Translation::new(0.0, 2.0));
        assert_eq!(out[(1, 1)], 7.0);
        assert_eq!(out[(1, 2)], 0.0);
        assert_eq!(out[(1, 3)], 0.0);

        let half = reg.resample(&source, &reference, &Translation::new(0.5, 0.5));
        assert!((half[(0, 0)] - 2.5).abs() < 1e-6);
    }
}
