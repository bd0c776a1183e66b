use super::{BatchError, BatchPipeline, BatchResult, Outputs};
use crate::register::Registrar;
use log::debug;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

/// 后台批处理线程发出的事件.
#[derive(Debug)]
pub enum BatchEvent {
    /// 已完成 `done` / `total` 张切片.
    Progress {
        /// 已完成的切片数.
        done: usize,
        /// 切片总数.
        total: usize,
    },

    /// 批处理结束. 这总是最后一个事件.
    Finished(Result<(BatchResult, Outputs), BatchError>),
}

/// 后台批处理线程的句柄.
///
/// 句柄被丢弃时会请求取消, 并等待线程退出.
pub struct BatchHandle {
    rx: Receiver<BatchEvent>,
    cancel: Arc<AtomicBool>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

/// 在独立线程上执行 [`BatchPipeline::run_and_persist`], 结果写到 `out_dir`.
pub fn spawn<R>(pipeline: BatchPipeline<R>, out_dir: PathBuf) -> BatchHandle
where
    R: Registrar + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<BatchEvent>();
    let cancel = pipeline.cancel_flag();

    let thread_handle = thread::spawn(move || {
        let progress = |done, total| {
            let _ = tx.send(BatchEvent::Progress { done, total });
        };
        let result = pipeline.run_and_persist(progress, &out_dir);
        debug!("Batch worker finished, ok = {}", result.is_ok());
        let _ = tx.send(BatchEvent::Finished(result));
    });

    BatchHandle {
        rx,
        cancel,
        thread_handle: Some(thread_handle),
    }
}

impl BatchHandle {
    /// 请求取消. 正在处理的切片会完成, 之后的切片不再开始.
    #[inline]
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// 非阻塞地获取下一个事件.
    pub fn try_event(&self) -> Option<BatchEvent> {
        match self.rx.try_recv() {
            Ok(e) => Some(e),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// 阻塞地获取下一个事件. 线程退出且事件耗尽后返回 `None`.
    #[inline]
    pub fn next_event(&self) -> Option<BatchEvent> {
        self.rx.recv().ok()
    }

    /// 等待线程结束并返回最终结果. 尚未读取的进度事件被丢弃.
    ///
    /// 工作线程 panic 时, panic 会在当前线程继续传播.
    pub fn join(mut self) -> Result<(BatchResult, Outputs), BatchError> {
        let mut finished = None;
        for event in self.rx.iter() {
            if let BatchEvent::Finished(result) = event {
                finished = Some(result);
            }
        }
        if let Some(handle) = self.thread_handle.take() {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }
        // 线程正常退出时一定发送过 `Finished`.
        finished.unwrap_or(Err(BatchError::Cancelled))
    }
}

impl Drop for BatchHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            self.cancel();
            let _ = handle.join();
        }
    }
}
