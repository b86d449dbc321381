mod error;
mod hash;
mod traits;

pub mod filesystem;

pub use error::StorageError;
pub use hash::{ContentHash, HASH_LEN};
pub use traits::{Blob, BlobStore, BoxReader, SeekRead, StagedBlob};
