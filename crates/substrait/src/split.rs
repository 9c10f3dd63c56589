//! Split metadata handed to the storage connector for file-backed reads.

use serde::{Deserialize, Serialize};

use crate::proto::FileFormat;

/// File format of one split, as understood by the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitFormat {
    Parquet,
    Orc,
    Unknown,
}

impl From<FileFormat> for SplitFormat {
    fn from(f: FileFormat) -> Self {
        match f {
            FileFormat::Parquet => SplitFormat::Parquet,
            FileFormat::Orc => SplitFormat::Orc,
            _ => SplitFormat::Unknown,
        }
    }
}

/// Byte ranges of the files backing one scan node.
///
/// `paths`, `starts` and `lengths` are parallel vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitInfo {
    pub partition_index: u64,
    pub paths: Vec<String>,
    pub starts: Vec<u64>,
    pub lengths: Vec<u64>,
    pub format: SplitFormat,
}
