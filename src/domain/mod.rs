//! Domain logic - pure version rules independent of repository access

pub mod describe;
pub mod version;

pub use describe::{clamp_hash_length, DescribeFacts, WorkingDirectoryVersion};
pub use version::{PreReleaseLetter, VersionComponents, VersionTag};
