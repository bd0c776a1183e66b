//! 数据集操作: 输入目录的列举与窗口截取, 输出归档与 DICOM 序列.

use crate::consts::SCAN_EXTENSION;
use crate::LoadError;
use itertools::Itertools;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod npz_archive;
mod series;

pub use npz_archive::{write_archive, BatchArchive, OpenArchiveError};
pub use series::{dicom_date, new_uid, write_series, SeriesFrames};

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.extend(it);
    Some(ans)
}

/// 写出批次结果时的错误.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// 创建, 重命名或删除文件/目录失败.
    #[error("访问 `{}` 失败: {source}", .path.display())]
    Io {
        /// 出错的路径.
        path: PathBuf,
        /// 底层错误.
        source: std::io::Error,
    },

    /// npz 归档写出失败.
    #[error("写出 npz 归档 `{}` 失败: {reason}", .path.display())]
    Npz {
        /// 归档路径.
        path: PathBuf,
        /// 底层错误描述.
        reason: String,
    },

    /// DICOM 序列写出失败.
    #[error("写出 DICOM 文件 `{}` 失败: {reason}", .path.display())]
    Dicom {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误描述.
        reason: String,
    },
}

impl PersistenceError {
    #[inline]
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_owned(),
            source,
        }
    }
}

/// 列出 `dir` 下所有切片文件 (文件名转大写后以 `.IMA` 结尾), 按文件名字典序排列.
pub fn list_scans<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, LoadError> {
    let dir = dir.as_ref();
    let io_err = |source| LoadError::Io {
        path: dir.to_owned(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let is_scan = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.to_uppercase().ends_with(SCAN_EXTENSION));
        if is_scan && entry.file_type().map_err(io_err)?.is_file() {
            files.push(entry.path());
        }
    }
    Ok(files
        .into_iter()
        .sorted_by(|a, b| a.file_name().cmp(&b.file_name()))
        .collect())
}

/// 列出 `dir` 下的切片文件, 并截取 1 起始的闭区间 `[start_scan, end_scan]`.
///
/// 窗口超出列表的部分被直接截断, 与切片语义一致. 例如列表只有 8 个文件时,
/// `[5, 12]` 得到第 5 到第 8 个文件, `[9, 12]` 得到空列表.
///
/// # 注意
///
/// `start_scan` 必须不小于 1, 否则程序 panic.
pub fn scan_window<P: AsRef<Path>>(
    dir: P,
    start_scan: usize,
    end_scan: usize,
) -> Result<Vec<PathBuf>, LoadError> {
    assert!(start_scan >= 1);
    let files = list_scans(dir)?;
    let end = end_scan.min(files.len());
    let start = (start_scan - 1).min(end);
    Ok(files[start..end].to_vec())
}
