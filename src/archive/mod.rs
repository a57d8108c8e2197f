//! Archive primitives shared by every emitter (spec §4.C): a tar writer,
//! an ar writer, compression backends, and counting/digesting adapters.

pub mod ar;
pub mod compress;
pub mod digest;
pub mod tar;

pub use compress::Compression;
pub use tar::{EntryMeta, EntryType, TarFormat, TarWriter};
