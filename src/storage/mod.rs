//! Persistent clip storage
//!
//! - `codec`: binary payload ⇄ data URL text
//! - `medium`: pluggable key → text backends (file, memory)
//! - `retention`: age and count caps
//! - `store`: the clip collection itself

pub mod codec;
pub mod medium;
pub mod retention;
pub mod store;

pub use codec::{decode_payload, encode_payload};
pub use medium::{FileMedium, MemoryMedium, StorageMedium};
pub use retention::{apply_retention, RetentionPolicy, SweepReport};
pub use store::{SaveOutcome, StoredClip, VideoStore, STORAGE_KEY};
