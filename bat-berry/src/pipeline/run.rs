use super::result::SliceOutput;
use super::{persist, BatchError, BatchRequest, BatchResult, ConfigError, Outputs};
use super::{RegistrationStatus, SliceReport};
use crate::data::load_hu;
use crate::dataset::{scan_window, PersistenceError};
use crate::denoise::Bilateral;
use crate::register::{Registrar, TranslationRegistrar};
use crate::{classify, AttenuationMap, Channel, LoadError};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;
    }
}

/// 批处理流水线.
///
/// 切片之间互相独立. 开启 `rayon` feature 时切片在 rayon 线程池上并行处理,
/// 但结果总是按切片序排列.
pub struct BatchPipeline<R = TranslationRegistrar> {
    request: BatchRequest,
    registrar: R,
    denoiser: Bilateral,
    cancel: Arc<AtomicBool>,
}

impl BatchPipeline {
    /// 以默认的平移配准器创建流水线. 是否配准由 `request` 决定.
    pub fn new(request: BatchRequest) -> Self {
        Self {
            request,
            registrar: TranslationRegistrar::default(),
            denoiser: Bilateral::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl<R: Registrar> BatchPipeline<R> {
    /// 替换配准器.
    pub fn with_registrar<Q: Registrar>(self, registrar: Q) -> BatchPipeline<Q> {
        BatchPipeline {
            request: self.request,
            registrar,
            denoiser: self.denoiser,
            cancel: self.cancel,
        }
    }

    /// 使用外部共享的取消标志. 标志被置位后, 尚未开始的切片不再处理,
    /// [`run`](Self::run) 返回 [`BatchError::Cancelled`].
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// 取消标志.
    #[inline]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// 批次配置.
    #[inline]
    pub fn request(&self) -> &BatchRequest {
        &self.request
    }

    /// 列举四个通道并截取窗口, 按 [`Channel::ALL`] 顺序返回.
    ///
    /// 各通道切片数不一致时返回 [`BatchError::ChannelMismatch`], 不做截断.
    pub fn scan_lists(&self) -> Result<[Vec<PathBuf>; 4], BatchError> {
        let req = &self.request;
        let mut lists: [Vec<PathBuf>; 4] = Default::default();
        for channel in Channel::ALL {
            lists[channel.index()] = scan_window(req.dir(channel), req.start_scan(), req.end_scan())
                .map_err(|source| BatchError::List { channel, source })?;
        }

        let counts: [usize; 4] = std::array::from_fn(|i| lists[i].len());
        if counts.iter().any(|&c| c != counts[0]) {
            return Err(BatchError::ChannelMismatch { counts });
        }
        if counts[0] == 0 {
            return Err(ConfigError::EmptyWindow.into());
        }
        Ok(lists)
    }

    /// 处理整个批次. `progress(done, total)` 在每张切片完成后调用一次,
    /// 并行时可能来自不同线程.
    pub fn run<F>(&self, progress: F) -> Result<BatchResult, BatchError>
    where
        F: Fn(usize, usize) + Sync,
    {
        let req = &self.request;
        req.validate()?;
        let lists = self.scan_lists()?;
        let total = lists[0].len();
        info!(
            "Batch `{}`: {total} slices, scans [{}, {}], register = {}",
            req.name(),
            req.start_scan(),
            req.end_scan(),
            req.register()
        );

        let done = AtomicUsize::new(0);
        let process = |i: usize| -> Result<SliceOutput, BatchError> {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(BatchError::Cancelled);
            }
            let paths: [&Path; 4] = std::array::from_fn(|c| lists[c][i].as_path());
            let out = self.process_slice(i, paths)?;
            progress(done.fetch_add(1, Ordering::Relaxed) + 1, total);
            Ok(out)
        };

        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                let slices: Vec<SliceOutput> =
                    (0..total).into_par_iter().map(process).collect::<Result<_, _>>()?;
            } else {
                let slices: Vec<SliceOutput> = (0..total).map(process).collect::<Result<_, _>>()?;
            }
        }

        // 稠密栈要求所有切片形状一致.
        let expected = slices[0].maps[0].shape();
        for (i, s) in slices.iter().enumerate() {
            let found = s.maps[0].shape();
            if found != expected {
                return Err(BatchError::Load {
                    slice: i,
                    channel: Channel::ALL[0],
                    source: LoadError::ShapeMismatch {
                        path: lists[0][i].clone(),
                        expected,
                        found,
                    },
                });
            }
        }

        let skipped = slices
            .iter()
            .filter(|s| matches!(s.report.registration, RegistrationStatus::Skipped(_)))
            .count();
        if skipped > 0 {
            warn!("Batch `{}`: registration skipped on {skipped} slices", req.name());
        }
        info!("Batch `{}` processed", req.name());

        Ok(BatchResult::assemble(
            req.name().to_owned(),
            req.start_scan(),
            req.display_index(),
            slices,
        ))
    }

    /// 把 `result` 写到 `out_dir/{批次名}/`. 见 [`persist`](super::persist()).
    #[inline]
    pub fn persist<P: AsRef<Path>>(
        &self,
        result: &BatchResult,
        out_dir: P,
    ) -> Result<Outputs, PersistenceError> {
        persist(result, out_dir)
    }

    /// 依次执行 [`run`](Self::run) 与 [`persist`](Self::persist).
    pub fn run_and_persist<F, P>(
        &self,
        progress: F,
        out_dir: P,
    ) -> Result<(BatchResult, Outputs), BatchError>
    where
        F: Fn(usize, usize) + Sync,
        P: AsRef<Path>,
    {
        let result = self.run(progress)?;
        let outputs = self.persist(&result, out_dir)?;
        Ok((result, outputs))
    }

    /// 处理第 `i` 张切片. `paths` 按 [`Channel::ALL`] 顺序排列.
    fn process_slice(&self, i: usize, paths: [&Path; 4]) -> Result<SliceOutput, BatchError> {
        let crop = self.request.crop();
        let load = |channel: Channel| {
            load_hu(paths[channel.index()], crop).map_err(|source| BatchError::Load {
                slice: i,
                channel,
                source,
            })
        };
        let low_pre = load(Channel::LowPre)?;
        let low_post = load(Channel::LowPost)?;
        let high_pre = load(Channel::HighPre)?;
        let high_post = load(Channel::HighPost)?;

        let expected = low_pre.shape();
        for (channel, map) in [
            (Channel::LowPost, &low_post),
            (Channel::HighPre, &high_pre),
            (Channel::HighPost, &high_post),
        ] {
            if map.shape() != expected {
                return Err(BatchError::Load {
                    slice: i,
                    channel,
                    source: LoadError::ShapeMismatch {
                        path: paths[channel.index()].to_owned(),
                        expected,
                        found: map.shape(),
                    },
                });
            }
        }

        let (low_pre, high_pre, registration) = if self.request.register() {
            self.register(i, low_pre, &low_post, high_pre, &high_post)
        } else {
            (low_pre, high_pre, RegistrationStatus::Disabled)
        };

        let maps = [low_pre, low_post, high_pre, high_post].map(|m| self.denoiser.apply(&m));
        let classified = classify(
            &maps[Channel::LowPost.index()],
            &maps[Channel::HighPost.index()],
        );
        let report = SliceReport {
            slice: i,
            registration,
            brown_pixels: classified.brown.count(),
            white_pixels: classified.white.count(),
        };
        debug!(
            "Slice {i}: brown {} px, white {} px, {:?}",
            report.brown_pixels, report.white_pixels, report.registration
        );

        Ok(SliceOutput {
            maps,
            classified,
            report,
        })
    }

    /// 以 140KV 一对切片求出变换, 再复用于 80KV pre 切片.
    /// 配准失败时原样返回两张 pre 切片.
    fn register(
        &self,
        i: usize,
        low_pre: AttenuationMap,
        low_post: &AttenuationMap,
        high_pre: AttenuationMap,
        high_post: &AttenuationMap,
    ) -> (AttenuationMap, AttenuationMap, RegistrationStatus) {
        match self.registrar.align(high_post, &high_pre) {
            Ok(alignment) => {
                let low_pre = self.registrar.resample(&low_pre, low_post, &alignment.transform);
                let status = RegistrationStatus::Aligned {
                    score: alignment.score,
                };
                (low_pre, alignment.moving, status)
            }
            Err(e) => {
                warn!("Slice {i}: registration failed, using unregistered pre scans: {e}");
                (low_pre, high_pre, RegistrationStatus::Skipped(e.to_string()))
            }
        }
    }
}
