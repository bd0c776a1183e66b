//! 程序运行函数.

use crate::result::BatchSummary;
use bat_berry::dataset::BatchArchive;
use bat_berry::pipeline::{self, BatchEvent, BatchPipeline};
use log::{error, info};
use std::num::NonZeroUsize;
use utils::loader;

/// 实际运行.
pub fn run() -> BatchSummary {
    let request = loader::request_from_env_or_home().expect("Loading batch config error");
    let out_dir = loader::output_dir_from_env_or_home();
    info!(
        "Batch `{}`: scans {}..={}, registration {}",
        request.name(),
        request.start_scan(),
        request.end_scan(),
        if request.register() { "on" } else { "off" },
    );

    let pipeline = BatchPipeline::new(request);
    let handle = pipeline::spawn(pipeline, out_dir);

    let finished = loop {
        match handle.next_event() {
            Some(BatchEvent::Progress { done, total }) => {
                if done == total || done % 10 == 0 {
                    println!("Processed {done}/{total} slices");
                }
            }
            Some(BatchEvent::Finished(r)) => break r,
            None => panic!("Batch worker exited without a result"),
        }
    };
    drop(handle);

    let (result, outputs) = match finished {
        Ok(v) => v,
        Err(e) => {
            error!("{e}");
            panic!("Batch failed");
        }
    };

    // 重新打开归档, 确认写出内容可读.
    let workers = NonZeroUsize::new(utils::cpus().clamp(1, 64)).unwrap();
    let archive = BatchArchive::open(workers, &outputs.archive).expect("Reopening archive error");
    let entries = archive.names().expect("Reading archive error");

    BatchSummary::new(result, outputs, entries)
}
