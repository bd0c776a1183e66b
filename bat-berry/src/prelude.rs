//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::classify::{classify, Classified, HuBand};
pub use crate::data::{load_hu, AttenuationMap, Channel, CropRect, LoadError, Mask};
pub use crate::denoise::Bilateral;
pub use crate::register::{Alignment, Registrar, RegistrationError, Translation, TranslationRegistrar};

pub use crate::dataset::{self, home_dataset_dir_with, BatchArchive, PersistenceError};
pub use crate::pipeline::{
    spawn, BatchError, BatchEvent, BatchHandle, BatchPipeline, BatchRequest, BatchResult,
    ConfigError, Outputs, RegistrationStatus, SliceReport,
};
