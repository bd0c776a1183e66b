//! 批处理: 配置, 逐切片处理, 结果组装与写出, 后台 worker.
//!
//! 典型用法:
//!
//! ```no_run
//! use bat_berry::pipeline::{BatchPipeline, BatchRequest};
//!
//! let request = BatchRequest::builder("B01")
//!     .dirs(["80KV_PRE", "80KV_POST", "140KV_PRE", "140KV_POST"])
//!     .window(1, 250)
//!     .display_index(200)
//!     .trim([100, 400, 50, 450])
//!     .register(true)
//!     .build()
//!     .unwrap();
//! let pipeline = BatchPipeline::new(request);
//! let (result, outputs) = pipeline
//!     .run_and_persist(|done, total| println!("{done}/{total}"), "output")
//!     .unwrap();
//! println!("{} slices -> {}", result.len(), outputs.dir.display());
//! ```

mod error;
mod persist;
mod request;
mod result;
mod run;
mod worker;

pub use error::BatchError;
pub use persist::persist;
pub use request::{BatchRequest, BatchRequestBuilder, ConfigError};
pub use result::{BatchResult, Outputs, RegistrationStatus, SliceReport};
pub use run::BatchPipeline;
pub use worker::{spawn, BatchEvent, BatchHandle};
