//! Data preprocessing module
//!
//! - Standard scaling of numeric columns
//! - Binary encoding of categorical columns
//! - The composed feature pipeline and its post-fit checks
//! - Label encoding

mod checks;
mod encoder;
mod label;
mod pipeline;
mod scaler;

pub use checks::{PipelineValidator, STD_TOLERANCE};
pub use encoder::{BinaryEncoder, ColumnMapping};
pub use label::{diagnosis, encode_label, encode_labels};
pub use pipeline::{FeaturePipeline, FeaturePipelineBuilder, OutputColumn, OutputKind};
pub use scaler::{ScalerParams, StandardScaler};
