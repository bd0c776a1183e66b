//! 将氙气吸入前的切片配准到吸入后的几何空间.
//!
//! 配准引擎只通过 [`Registrar`] 与流水线交互. 本 crate 自带一个确定性的
//! 整像素平移配准 [`TranslationRegistrar`]; 形变配准可由外部实现同一 trait 接入.

mod translation;

pub use translation::{Translation, TranslationRegistrar};

use crate::{AttenuationMap, Idx2d};
use thiserror::Error;

/// 一次配准的结果.
#[derive(Clone, Debug)]
pub struct Alignment<T> {
    /// 参考 (fixed) 切片.
    pub fixed: AttenuationMap,

    /// 已变换到 `fixed` 网格上的 moving 切片.
    pub moving: AttenuationMap,

    /// 求得的变换. 仅在单张切片的处理过程中有效.
    pub transform: T,

    /// 配准质量. 含义由实现决定, 越大越好.
    pub score: f64,
}

/// 配准错误. 流水线会将其降级为 "该切片不配准".
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistrationError {
    /// 优化没有得到可接受的结果.
    #[error("配准未收敛: {reason}")]
    NotConverged {
        /// 原因描述.
        reason: String,
    },

    /// 两张切片形状不一致.
    #[error("配准输入形状不一致: fixed {fixed:?}, moving {moving:?}")]
    ShapeMismatch {
        /// fixed 切片形状.
        fixed: Idx2d,
        /// moving 切片形状.
        moving: Idx2d,
    },
}

/// 配准引擎.
///
/// 实现必须是确定性的: 相同输入总是得到相同输出.
/// 流水线可能在多个线程上同时调用同一个实例, 因此要求 `Sync`.
pub trait Registrar: Sync {
    /// 变换参数.
    type Transform: Send;

    /// 求出把 `moving` 对齐到 `fixed` 的变换, 并返回对齐后的 `moving`.
    fn align(
        &self,
        fixed: &AttenuationMap,
        moving: &AttenuationMap,
    ) -> Result<Alignment<Self::Transform>, RegistrationError>;

    /// 将 `source` 按 `transform` 重采样到 `reference` 的网格上.
    ///
    /// 落在 `source` 范围之外的像素取 `0.0`.
    fn resample(
        &self,
        source: &AttenuationMap,
        reference: &AttenuationMap,
        transform: &Self::Transform,
    ) -> AttenuationMap;
}
