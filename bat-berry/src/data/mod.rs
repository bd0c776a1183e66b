//! HU 切片, mask 与通道的基础数据结构.

mod crop;
mod load;
mod slice;

pub use crop::CropRect;
pub use load::{load_hu, LoadError};
pub use slice::{AttenuationMap, Mask};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 一个批次的四个输入通道: 能量 (80KV 低能 / 140KV 高能) × 时相 (氙气吸入前 / 后).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Channel {
    /// 80KV, 氙气吸入前.
    LowPre,

    /// 80KV, 氙气吸入后.
    LowPost,

    /// 140KV, 氙气吸入前.
    HighPre,

    /// 140KV, 氙气吸入后.
    HighPost,
}

impl Channel {
    /// 全部通道, 顺序与归档中的顺序一致.
    pub const ALL: [Channel; 4] = [
        Channel::LowPre,
        Channel::LowPost,
        Channel::HighPre,
        Channel::HighPost,
    ];

    /// 在 [`Channel::ALL`] 中的位置.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 是否为氙气吸入前的通道.
    #[inline]
    pub const fn is_pre(self) -> bool {
        matches!(self, Self::LowPre | Self::HighPre)
    }

    /// 是否为 80KV 低能通道.
    #[inline]
    pub const fn is_low(self) -> bool {
        matches!(self, Self::LowPre | Self::LowPost)
    }

    /// npz 归档中的数组名.
    pub const fn archive_key(self) -> &'static str {
        match self {
            Self::LowPre => "low_pre_maps",
            Self::LowPost => "low_post_maps",
            Self::HighPre => "high_pre_maps",
            Self::HighPost => "high_post_maps",
        }
    }

    /// DICOM 序列描述 (SeriesDescription).
    #[inline]
    pub const fn series_label(self) -> &'static str {
        if self.is_low() {
            "low"
        } else {
            "high"
        }
    }

    /// 输出 DICOM 文件名.
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::LowPre => "PRE_80KV.DCM",
            Self::LowPost => "POST_80KV.DCM",
            Self::HighPre => "PRE_140KV.DCM",
            Self::HighPost => "POST_140KV.DCM",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::LowPre => "80KV pre",
            Self::LowPost => "80KV post",
            Self::HighPre => "140KV pre",
            Self::HighPost => "140KV post",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::Channel;

    #[test]
    fn test_channel_names_are_distinct() {
        let mut keys: Vec<_> = Channel::ALL.iter().map(|c| c.archive_key()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 4);

        let mut files: Vec<_> = Channel::ALL.iter().map(|c| c.file_name()).collect();
        files.sort_unstable();
        files.dedup();
        assert_eq!(files.len(), 4);
    }

    #[test]
    fn test_channel_classes() {
        assert!(Channel::LowPre.is_pre() && Channel::LowPre.is_low());
        assert!(!Channel::HighPost.is_pre() && !Channel::HighPost.is_low());
        assert_eq!(Channel::HighPre.series_label(), "high");
        assert_eq!(Channel::LowPost.series_label(), "low");
        for (i, c) in Channel::ALL.into_iter().enumerate() {
            assert_eq!(c.index(), i);
        }
    }
}
