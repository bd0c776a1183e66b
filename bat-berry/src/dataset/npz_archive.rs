use super::PersistenceError;
use crate::consts::archive::{BROWN_MASK_KEY, WHITE_MASK_KEY};
use crate::Channel;
use ndarray::{Array3, ArrayView3, Ix3, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter, ReadNpzError};
use std::fs::{File, OpenOptions};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;

/// npz 内部文件名: `{key}.npy`, 与 numpy 的约定一致.
#[inline]
fn entry_name(key: &str) -> String {
    format!("{key}.npy")
}

/// 打开 [`BatchArchive`] 错误.
#[derive(Debug, Error)]
pub enum OpenArchiveError {
    /// workers 太大. 最多支持 64.
    #[error("工作通道过多, 最多支持 {0} 个")]
    TooManyWorkers(u32),

    /// 打开 npz 文件错误.
    #[error("无法解析 npz 文件: {0}")]
    ReadNpzError(#[from] ReadNpzError),

    /// 其他底层 I/O 错误.
    #[error("无法打开 npz 文件: {0}")]
    IoError(#[from] std::io::Error),
}

/// 已写出批次的 npz 归档 (`{输出目录}/{批次}/{批次}.npz`).
///
/// 四个 HU 通道以 `f32` 存储, 两个 mask 以 `bool` 存储, 形状均为 `[切片, 行, 列]`.
pub struct BatchArchive {
    entries: Vec<Mutex<NpzReader<File>>>,
    turn: AtomicUsize,
}

impl BatchArchive {
    /// 初始化.
    ///
    /// `workers` 指定了底层工作通道的个数, 最大为 64. 系统会从路径 `p` 打开文件
    /// `workers` 次, 并为每个打开通道指定一个排他入口点 (以期获得更高的并行度).
    pub fn open<P: AsRef<Path>>(workers: NonZeroUsize, p: P) -> Result<Self, OpenArchiveError> {
        let workers = workers.get();
        if workers > 64 {
            return Err(OpenArchiveError::TooManyWorkers(64));
        }
        let mut v = Vec::with_capacity(workers);
        for _ in 0..workers {
            let file = OpenOptions::new().read(true).open(p.as_ref())?;
            v.push(Mutex::new(NpzReader::new(file)?));
        }
        Ok(Self {
            entries: v,
            turn: AtomicUsize::new(0),
        })
    }

    /// 读取某一通道的 HU 栈.
    pub fn maps(&self, channel: Channel) -> Result<Array3<f32>, ReadNpzError> {
        let slot = self.next_slot();
        let mut file = self.entries[slot].lock().unwrap();
        file.by_name::<OwnedRepr<f32>, Ix3>(&entry_name(channel.archive_key()))
    }

    /// 读取棕色脂肪 mask 栈.
    #[inline]
    pub fn brown_masks(&self) -> Result<Array3<bool>, ReadNpzError> {
        self.masks(BROWN_MASK_KEY)
    }

    /// 读取白色脂肪 mask 栈.
    #[inline]
    pub fn white_masks(&self) -> Result<Array3<bool>, ReadNpzError> {
        self.masks(WHITE_MASK_KEY)
    }

    fn masks(&self, key: &str) -> Result<Array3<bool>, ReadNpzError> {
        let slot = self.next_slot();
        let mut file = self.entries[slot].lock().unwrap();
        file.by_name::<OwnedRepr<bool>, Ix3>(&entry_name(key))
    }

    /// 获取底层 npz 文件包含的所有文件名.
    pub fn names(&self) -> Result<Vec<String>, ReadNpzError> {
        let slot = self.next_slot();
        self.entries[slot].lock().unwrap().names()
    }

    /// 工作通道个数.
    #[inline]
    pub fn worker_len(&self) -> usize {
        self.entries.len()
    }

    fn next_slot(&self) -> usize {
        self.turn.fetch_add(1, Ordering::Relaxed) % self.worker_len()
    }
}

/// 把 HU 栈 `maps` 与 mask 栈 `masks` 写入 `path` 处新建的 npz 归档.
///
/// 每一项为 `(键名, 数据)`, 归档内的文件名为 `{键名}.npy`.
pub fn write_archive<P: AsRef<Path>>(
    path: P,
    maps: &[(&str, ArrayView3<'_, f32>)],
    masks: &[(&str, ArrayView3<'_, bool>)],
) -> Result<(), PersistenceError> {
    let path = path.as_ref();
    let npz_err = |e: ndarray_npy::WriteNpzError| PersistenceError::Npz {
        path: path.to_owned(),
        reason: e.to_string(),
    };

    let file = File::create(path).map_err(|e| PersistenceError::io(path, e))?;
    let mut npz = NpzWriter::new(file);
    for (key, data) in maps {
        npz.add_array(entry_name(key), data).map_err(npz_err)?;
    }
    for (key, data) in masks {
        npz.add_array(entry_name(key), data).map_err(npz_err)?;
    }
    npz.finish().map_err(npz_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_round_trip_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.npz");

        let low_pre = Array3::from_shape_fn((3, 4, 5), |(s, h, w)| {
            (s as f32 * 1000.0 - h as f32 * 0.1 + w as f32 / 3.0) - 1024.0
        });
        let mut odd = low_pre.mapv(|v| v * 1.5);
        odd[(0, 0, 0)] = f32::MIN_POSITIVE / 2.0;
        odd[(1, 2, 3)] = -0.0;
        let brown = Array3::from_shape_fn((3, 4, 5), |(s, h, w)| (s + h * w) % 3 == 0);
        let white = brown.mapv(|b| !b);

        write_archive(
            &path,
            &[
                (Channel::LowPre.archive_key(), low_pre.view()),
                (Channel::HighPost.archive_key(), odd.view()),
            ],
            &[(BROWN_MASK_KEY, brown.view()), (WHITE_MASK_KEY, white.view())],
        )
        .unwrap();

        let archive = BatchArchive::open(NonZeroUsize::new(2).unwrap(), &path).unwrap();
        assert_eq!(archive.worker_len(), 2);
        let back = archive.maps(Channel::LowPre).unwrap();
        assert!(back.iter().zip(low_pre.iter()).all(|(a, b)| a.to_bits() == b.to_bits()));
        let back = archive.maps(Channel::HighPost).unwrap();
        assert!(back.iter().zip(odd.iter()).all(|(a, b)| a.to_bits() == b.to_bits()));
        assert_eq!(archive.brown_masks().unwrap(), brown);
        assert_eq!(archive.white_masks().unwrap(), white);
        assert!(archive.maps(Channel::LowPost).is_err());

        let mut names = archive.names().unwrap();
        names.sort_unstable();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_too_many_workers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.npz");
        write_archive(&path, &[], &[]).unwrap();
        assert!(matches!(
            BatchArchive::open(NonZeroUsize::new(65).unwrap(), &path),
            Err(OpenArchiveError::TooManyWorkers(64))
        ));
    }
}
