use super::ConfigError;
use crate::dataset::PersistenceError;
use crate::{Channel, LoadError};
use thiserror::Error;

/// 批处理错误. 除配准失败外, 任何错误都会中止整个批次.
#[derive(Debug, Error)]
pub enum BatchError {
    /// 配置无效.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 列举某一通道的输入目录失败.
    #[error("列举 {channel} 通道的切片失败: {source}")]
    List {
        /// 出错的通道.
        channel: Channel,
        /// 底层错误.
        source: LoadError,
    },

    /// 加载某一切片失败.
    #[error("加载第 {slice} 张切片 ({channel}) 失败: {source}")]
    Load {
        /// 切片在窗口内的位置 (0 起始).
        slice: usize,
        /// 出错的通道.
        channel: Channel,
        /// 底层错误.
        source: LoadError,
    },

    /// 四个通道窗口截取后的切片数不一致.
    #[error("各通道切片数不一致 (80KV pre/post, 140KV pre/post): {counts:?}")]
    ChannelMismatch {
        /// 按 [`Channel::ALL`] 顺序的切片数.
        counts: [usize; 4],
    },

    /// 写出结果失败.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// 批次被取消.
    #[error("批处理已取消")]
    Cancelled,
}
