#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 处理双能 (80KV/140KV)、氙气吸入前后 (pre/post) 的 CT 切片序列,
//! 基于 CT HU 阈值分割棕色脂肪 (BAT) 与白色脂肪 (WAT), 并持久化结果.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 处理流程
//!
//! 数据严格单向流动, 后面的阶段不会影响前面的阶段:
//!
//! ```text
//! load_hu ─> (Registrar) ─> Bilateral ─> classify ─> BatchResult ─> npz + DICOM
//! ```
//!
//! 1. [`data::load_hu`] 从单帧 DICOM 文件读取经 rescale 校准的 HU 切片, 可选裁剪.
//! 2. [`register::Registrar`] 将氙气前 (pre) 的切片配准到氙气后 (post) 的几何空间.
//!   高能 (140KV) 一对切片求出的变换会复用于低能 (80KV) 的 pre 切片.
//! 3. [`denoise::Bilateral`] 对四个通道分别做保边去噪.
//! 4. [`classify()`](crate::classify()) 仅依据 post 切片生成棕色脂肪 mask, 白色脂肪 mask 与差值图.
//! 5. [`pipeline::BatchPipeline`] 按切片序组织上述过程, 最终写出 npz 归档和 7 个 DICOM 序列.
//!
//! # 注意
//!
//! 1. 阈值, 腐蚀半径, 小连通域面积均为领域标定常量, 见 [`consts::tissue`].
//!   它们不是可调参数.
//! 2. 棕色与白色 mask 各自独立计算, 同一个像素可能同时属于两者.
//!   目前不做互斥处理.
//! 3. 切片之间没有数据依赖. 开启 `rayon` feature 时切片并行处理,
//!   但输出栈的顺序永远与输入切片顺序一致.
//!
//! # 开发计划
//!
//! ### HU 加载与裁剪 ✅
//!
//! 实现位于 `bat-berry/src/data`.
//!
//! ### 双边滤波 ✅
//!
//! 实现位于 `bat-berry/src/denoise.rs`.
//!
//! ### 二维形态学 (圆盘腐蚀, 小连通域去除) ✅
//!
//! 实现位于 `bat-berry/src/morph.rs`.
//!
//! ### 平移配准 ✅
//!
//! 基于归一化互相关的整像素平移搜索. 形变 (B 样条) 配准留给外部实现,
//! 只需实现 [`register::Registrar`].
//!
//! ### 批处理, 后台 worker, 取消 ✅
//!
//! 实现位于 `bat-berry/src/pipeline`.

/// 二维索引 `(行, 列)`.
pub type Idx2d = (usize, usize);

/// 三维索引 `(切片, 行, 列)`.
pub type Idx3d = (usize, usize, usize);

type Area2d = Vec<Idx2d>;
type Areas2d = Vec<Area2d>;

pub mod consts;
pub mod data;
pub mod dataset;
pub mod denoise;
pub mod morph;
pub mod register;

mod classify;
pub mod pipeline;
pub mod prelude;

pub use classify::{classify, Classified, HuBand};
pub use data::{AttenuationMap, Channel, CropRect, LoadError, Mask};
