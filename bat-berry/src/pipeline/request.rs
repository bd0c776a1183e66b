use crate::{Channel, CropRect};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 批次配置错误.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 批次名为空.
    #[error("批次名不能为空")]
    EmptyBatchName,

    /// 批次名不是单个普通路径分量, 例如 `.`, `..`, 绝对路径或含有路径分隔符.
    #[error("批次名 `{0}` 必须是单个普通的目录名")]
    InvalidBatchName(String),

    /// 起始切片序号为 0. 序号从 1 开始.
    #[error("起始切片序号从 1 开始")]
    ZeroStart,

    /// 终止序号小于起始序号.
    #[error("切片窗口 [{start}, {end}] 无效")]
    InvalidRange {
        /// 起始序号.
        start: usize,
        /// 终止序号.
        end: usize,
    },

    /// 展示用切片序号不在窗口内.
    #[error("展示切片序号 {index} 不在窗口 [{start}, {end}] 内")]
    IndexOutOfRange {
        /// 展示切片序号.
        index: usize,
        /// 起始序号.
        start: usize,
        /// 终止序号.
        end: usize,
    },

    /// 裁剪区域为空.
    #[error("裁剪区域 {trim:?} (上, 下, 左, 右) 为空")]
    InvalidCrop {
        /// 以 `[上, 下, 左, 右]` 表示的裁剪区域.
        trim: [usize; 4],
    },

    /// 输入目录不存在.
    #[error("{channel} 通道的输入目录 `{}` 不存在", .path.display())]
    MissingDirectory {
        /// 通道.
        channel: Channel,
        /// 目录.
        path: PathBuf,
    },

    /// 窗口截取后没有任何切片.
    #[error("切片窗口内没有任何切片")]
    EmptyWindow,
}

/// 一个批次的完整配置.
///
/// 只能通过 [`BatchRequest::builder`] 构建, 构建时完成校验.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BatchRequest {
    name: String,
    dirs: [PathBuf; 4],
    start_scan: usize,
    end_scan: usize,
    display_index: usize,
    crop: Option<CropRect>,
    register: bool,
}

impl BatchRequest {
    /// 以批次名 `name` 开始构建配置.
    #[inline]
    pub fn builder<S: Into<String>>(name: S) -> BatchRequestBuilder {
        BatchRequestBuilder::new(name.into())
    }

    /// 批次名.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `channel` 通道的输入目录.
    #[inline]
    pub fn dir(&self, channel: Channel) -> &Path {
        &self.dirs[channel.index()]
    }

    /// 起始切片序号 (1 起始, 含).
    #[inline]
    pub fn start_scan(&self) -> usize {
        self.start_scan
    }

    /// 终止切片序号 (含).
    #[inline]
    pub fn end_scan(&self) -> usize {
        self.end_scan
    }

    /// 展示用切片序号.
    #[inline]
    pub fn display_index(&self) -> usize {
        self.display_index
    }

    /// 裁剪区域.
    #[inline]
    pub fn crop(&self) -> Option<CropRect> {
        self.crop
    }

    /// 是否将 pre 切片配准到 post 切片.
    #[inline]
    pub fn register(&self) -> bool {
        self.register
    }

    /// 检查所有约束. 反序列化得到的配置应先调用它.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyBatchName);
        }
        if !is_plain_name(&self.name) {
            return Err(ConfigError::InvalidBatchName(self.name.clone()));
        }
        if self.start_scan == 0 {
            return Err(ConfigError::ZeroStart);
        }
        if self.end_scan < self.start_scan {
            return Err(ConfigError::InvalidRange {
                start: self.start_scan,
                end: self.end_scan,
            });
        }
        if !(self.start_scan..=self.end_scan).contains(&self.display_index) {
            return Err(ConfigError::IndexOutOfRange {
                index: self.display_index,
                start: self.start_scan,
                end: self.end_scan,
            });
        }
        if let Some(c) = self.crop {
            if CropRect::new(c.left(), c.top(), c.right(), c.bottom()).is_none() {
                return Err(ConfigError::InvalidCrop { trim: c.to_trim() });
            }
        }
        for channel in Channel::ALL {
            let path = self.dir(channel);
            if !path.is_dir() {
                return Err(ConfigError::MissingDirectory {
                    channel,
                    path: path.to_owned(),
                });
            }
        }
        Ok(())
    }
}

/// `name` 作为 `{输出目录}/{name}` 时恰好是输出目录下的一个子目录.
fn is_plain_name(name: &str) -> bool {
    let mut it = Path::new(name).components();
    matches!(
        (it.next(), it.next()),
        (Some(Component::Normal(c)), None) if c == name
    )
}

/// [`BatchRequest`] 构建器.
#[derive(Clone, Debug)]
pub struct BatchRequestBuilder {
    name: String,
    dirs: [Option<PathBuf>; 4],
    start_scan: usize,
    end_scan: usize,
    display_index: Option<usize>,
    crop: Result<Option<CropRect>, [usize; 4]>,
    register: bool,
}

impl BatchRequestBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            dirs: Default::default(),
            start_scan: 1,
            end_scan: 1,
            display_index: None,
            crop: Ok(None),
            register: false,
        }
    }

    /// 设置 `channel` 通道的输入目录.
    pub fn dir<P: Into<PathBuf>>(mut self, channel: Channel, path: P) -> Self {
        self.dirs[channel.index()] = Some(path.into());
        self
    }

    /// 按 [`Channel::ALL`] 的顺序一次设置四个输入目录.
    pub fn dirs<P: Into<PathBuf>>(mut self, dirs: [P; 4]) -> Self {
        for (slot, path) in self.dirs.iter_mut().zip(dirs) {
            *slot = Some(path.into());
        }
        self
    }

    /// 设置切片窗口 `[start_scan, end_scan]` (1 起始, 闭区间).
    pub fn window(mut self, start_scan: usize, end_scan: usize) -> Self {
        self.start_scan = start_scan;
        self.end_scan = end_scan;
        self
    }

    /// 设置展示用切片序号. 未设置时取 `start_scan`.
    pub fn display_index(mut self, index: usize) -> Self {
        self.display_index = Some(index);
        self
    }

    /// 设置裁剪区域.
    pub fn crop(mut self, crop: CropRect) -> Self {
        self.crop = Ok(Some(crop));
        self
    }

    /// 以 `[上, 下, 左, 右]` 设置裁剪区域. 区域为空时 [`build`](Self::build) 返回错误.
    pub fn trim(mut self, trim: [usize; 4]) -> Self {
        self.crop = CropRect::from_trim(trim).map(Some).ok_or(trim);
        self
    }

    /// 是否配准.
    pub fn register(mut self, register: bool) -> Self {
        self.register = register;
        self
    }

    /// 校验并构建.
    pub fn build(self) -> Result<BatchRequest, ConfigError> {
        let crop = self.crop.map_err(|trim| ConfigError::InvalidCrop { trim })?;
        let [low_pre, low_post, high_pre, high_post] = self.dirs;
        let request = BatchRequest {
            name: self.name,
            dirs: [
                low_pre.unwrap_or_default(),
                low_post.unwrap_or_default(),
                high_pre.unwrap_or_default(),
                high_post.unwrap_or_default(),
            ],
            start_scan: self.start_scan,
            end_scan: self.end_scan,
            display_index: self.display_index.unwrap_or(self.start_scan),
            crop,
            register: self.register,
        };
        request.validate()?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dirs() -> (TempDir, [PathBuf; 4]) {
        let root = tempfile::tempdir().unwrap();
        let dirs = ["80KV_PRE", "80KV_POST", "140KV_PRE", "140KV_POST"].map(|d| {
            let p = root.path().join(d);
            std::fs::create_dir(&p).unwrap();
            p
        });
        (root, dirs)
    }

    #[test]
    fn test_build_ok() {
        let (_root, dirs) = dirs();
        let req = BatchRequest::builder("B01")
            .dirs(dirs.clone())
            .window(3, 12)
            .display_index(7)
            .trim([100, 400, 50, 450])
            .register(true)
            .build()
            .unwrap();
        assert_eq!(req.name(), "B01");
        assert_eq!(req.dir(Channel::HighPre), dirs[2]);
        assert_eq!((req.start_scan(), req.end_scan(), req.display_index()), (3, 12, 7));
        assert_eq!(req.crop().unwrap().shape(), (300, 400));
        assert!(req.register());
    }

    #[test]
    fn test_display_index_defaults_to_start() {
        let (_root, dirs) = dirs();
        let req = BatchRequest::builder("B").dirs(dirs).window(4, 9).build().unwrap();
        assert_eq!(req.display_index(), 4);
        assert!(req.crop().is_none());
        assert!(!req.register());
    }

    #[test]
    fn test_validation_errors() {
        let (_root, dirs) = dirs();
        let base = || BatchRequest::builder("B").dirs(dirs.clone());

        assert_eq!(
            BatchRequest::builder("  ").dirs(dirs.clone()).build(),
            Err(ConfigError::EmptyBatchName)
        );
        assert_eq!(base().window(0, 3).build(), Err(ConfigError::ZeroStart));
        assert_eq!(
            base().window(5, 4).build(),
            Err(ConfigError::InvalidRange { start: 5, end: 4 })
        );
        assert_eq!(
            base().window(2, 4).display_index(5).build(),
            Err(ConfigError::IndexOutOfRange { index: 5, start: 2, end: 4 })
        );
        assert_eq!(
            base().trim([10, 10, 0, 5]).build(),
            Err(ConfigError::InvalidCrop { trim: [10, 10, 0, 5] })
        );
        let missing = dirs[0].join("nope");
        assert_eq!(
            base().dir(Channel::LowPost, &missing).build(),
            Err(ConfigError::MissingDirectory {
                channel: Channel::LowPost,
                path: missing,
            })
        );
        assert!(matches!(
            BatchRequest::builder("B").build(),
            Err(ConfigError::MissingDirectory { channel: Channel::LowPre, .. })
        ));
    }

    #[test]
    fn test_batch_name_must_be_plain() {
        let (_root, dirs) = dirs();
        for name in [".", "..", "a/b", "/abs", "B01/", "./B01", "../B01"] {
            assert_eq!(
                BatchRequest::builder(name).dirs(dirs.clone()).build(),
                Err(ConfigError::InvalidBatchName(name.to_string())),
                "{name:?}"
            );
        }
        for name in ["B01", "batch.2024", "病例 3"] {
            assert!(BatchRequest::builder(name).dirs(dirs.clone()).build().is_ok(), "{name:?}");
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_round_trip() {
        let (_root, dirs) = dirs();
        let req = BatchRequest::builder("B")
            .dirs(dirs)
            .window(1, 2)
            .crop(CropRect::new(1, 2, 3, 4).unwrap())
            .build()
            .unwrap();
        let json = serde_json::to_string(&req).unwrap();
        let back: BatchRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
        assert!(back.validate().is_ok());
    }
}
