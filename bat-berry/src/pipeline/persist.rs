use super::{BatchResult, Outputs};
use crate::consts::archive::{BROWN_MASK_KEY, WHITE_MASK_KEY};
use crate::consts::series::{BROWN_MASK, DIFF_MAP, WHITE_MASK};
use crate::dataset::{write_archive, write_series, PersistenceError, SeriesFrames};
use crate::Channel;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// 把 `result` 写到 `out_dir/{批次名}/` 下.
///
/// 所有文件先写入暂存目录 `out_dir/.{批次名}.partial/`, 全部成功后才整体重命名
/// 为最终目录 (已存在的同名目录会被替换). 任一步失败时删除暂存目录,
/// 磁盘上不会留下不完整的结果.
pub fn persist<P: AsRef<Path>>(result: &BatchResult, out_dir: P) -> Result<Outputs, PersistenceError> {
    let out_dir = out_dir.as_ref();
    let name = result.name();
    let staging = out_dir.join(format!(".{name}.partial"));
    let target = out_dir.join(name);

    fs::create_dir_all(out_dir).map_err(|e| PersistenceError::io(out_dir, e))?;
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| PersistenceError::io(&staging, e))?;
    }
    fs::create_dir(&staging).map_err(|e| PersistenceError::io(&staging, e))?;

    let written = write_all(result, &staging).and_then(|files| {
        let backup = out_dir.join(format!(".{name}.old"));
        replace_dir(&staging, &target, &backup)?;
        Ok(files)
    });

    match written {
        Ok(files) => {
            info!("Batch `{name}` written to {}", target.display());
            let rebase = |p: PathBuf| target.join(p.file_name().unwrap_or_default());
            let mut files = files.into_iter().map(rebase);
            Ok(Outputs {
                dir: target.clone(),
                archive: files.next().unwrap_or_default(),
                series: files.collect(),
            })
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!("Failed to remove staging dir {}: {cleanup}", staging.display());
            }
            Err(e)
        }
    }
}

/// 把 `staging` 重命名为 `target`.
///
/// 已存在的 `target` 先被移到 `backup`, 重命名失败时再移回原处, 成功后删除.
fn replace_dir(staging: &Path, target: &Path, backup: &Path) -> Result<(), PersistenceError> {
    if backup.exists() {
        fs::remove_dir_all(backup).map_err(|e| PersistenceError::io(backup, e))?;
    }
    let had_target = target.exists();
    if had_target {
        fs::rename(target, backup).map_err(|e| PersistenceError::io(target, e))?;
    }

    if let Err(e) = fs::rename(staging, target) {
        if had_target {
            if let Err(restore) = fs::rename(backup, target) {
                warn!(
                    "Failed to restore previous output {}: {restore}",
                    target.display()
                );
            }
        }
        return Err(PersistenceError::io(target, e));
    }

    if had_target {
        if let Err(e) = fs::remove_dir_all(backup) {
            warn!("Failed to remove previous output {}: {e}", backup.display());
        }
    }
    Ok(())
}

/// 在 `dir` 下写出 npz 归档与 7 个 DICOM 文件, 返回按写出顺序排列的路径.
fn write_all(result: &BatchResult, dir: &Path) -> Result<Vec<PathBuf>, PersistenceError> {
    let mut files = Vec::with_capacity(8);

    let archive = dir.join(format!("{}.npz", result.name()));
    let maps = Channel::ALL.map(|c| (c.archive_key(), result.maps(c)));
    let masks = [
        (BROWN_MASK_KEY, result.brown_masks()),
        (WHITE_MASK_KEY, result.white_masks()),
    ];
    write_archive(&archive, &maps, &masks)?;
    debug!("Wrote {}", archive.display());
    files.push(archive);

    let mut series: Vec<(&str, &str, SeriesFrames)> = Channel::ALL
        .iter()
        .map(|c| (c.file_name(), c.series_label(), result.maps(*c).into()))
        .collect();
    series.push((BROWN_MASK.0, BROWN_MASK.1, result.brown_masks().into()));
    series.push((WHITE_MASK.0, WHITE_MASK.1, result.white_masks().into()));
    series.push((DIFF_MAP.0, DIFF_MAP.1, result.differences().into()));

    for (file, label, frames) in series {
        let path = dir.join(file);
        write_series(&path, &frames, label)?;
        debug!("Wrote {}", path.display());
        files.push(path);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::result::SliceOutput;
    use crate::pipeline::{RegistrationStatus, SliceReport};
    use crate::{AttenuationMap, Classified, Mask};

    /// 一张 `(rows, cols)` 的全 0 切片.
    fn slice(rows: usize, cols: usize) -> SliceOutput {
        let map = AttenuationMap::filled((rows, cols), 0.0);
        SliceOutput {
            maps: [(); 4].map(|_| map.clone()),
            classified: Classified {
                brown: Mask::empty((rows, cols)),
                white: Mask::empty((rows, cols)),
                difference: map.clone(),
            },
            report: SliceReport {
                slice: 0,
                registration: RegistrationStatus::Disabled,
                brown_pixels: 0,
                white_pixels: 0,
            },
        }
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let out = tempfile::tempdir().unwrap();
        // 列数超过 DICOM 的 u16 上限: npz 能写出, 第一个 DICOM 文件写出失败.
        let result = BatchResult::assemble("B".into(), 1, 1, vec![slice(1, 70_000)]);

        let err = persist(&result, out.path()).unwrap_err();
        assert!(matches!(err, PersistenceError::Dicom { .. }), "{err}");
        assert!(!out.path().join("B").exists());
        assert!(!out.path().join(".B.partial").exists());
    }

    #[test]
    fn test_failed_write_keeps_previous_output() {
        let out = tempfile::tempdir().unwrap();
        let good = BatchResult::assemble("B".into(), 1, 1, vec![slice(2, 3)]);
        let first = persist(&good, out.path()).unwrap();
        assert_eq!(first.series.len(), 7);

        let bad = BatchResult::assemble("B".into(), 1, 1, vec![slice(1, 70_000)]);
        assert!(persist(&bad, out.path()).is_err());
        assert!(first.archive.is_file());
        assert!(first.series.iter().all(|p| p.is_file()));
        assert!(!out.path().join(".B.partial").exists());
    }

    #[test]
    fn test_replace_dir_restores_target_when_rename_fails() {
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("B");
        let backup = out.path().join(".B.old");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep.npz"), b"old").unwrap();

        // 暂存目录不存在, 重命名必然失败.
        let staging = out.path().join(".B.partial");
        assert!(matches!(
            replace_dir(&staging, &target, &backup),
            Err(PersistenceError::Io { .. })
        ));
        assert_eq!(fs::read(target.join("keep.npz")).unwrap(), b"old");
        assert!(!backup.exists());
    }

    #[test]
    fn test_replace_dir_swaps_and_drops_backup() {
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("B");
        let backup = out.path().join(".B.old");
        let staging = out.path().join(".B.partial");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("a"), b"old").unwrap();
        fs::create_dir(&staging).unwrap();
        fs::write(staging.join("a"), b"new").unwrap();

        replace_dir(&staging, &target, &backup).unwrap();
        assert_eq!(fs::read(target.join("a")).unwrap(), b"new");
        assert!(!staging.exists());
        assert!(!backup.exists());
    }
}
