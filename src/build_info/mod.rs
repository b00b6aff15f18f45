// src/build_info/mod.rs

//! Persistence of builder state between runs.

pub mod codec;
pub mod document;
pub mod store;

pub use codec::{BUILD_INFO_TOOL_VERSION, BuildInfoCodec, BuildInfoInput, DecodedBuildInfo};
pub use document::{BuildInfo, PendingCheckRecord, PendingEmitRecord, UnitRecord};
pub use store::{BuildInfoStore, FileBuildInfoStore, MemoryBuildInfoStore};
