//! Storage layer for the telemetry logger firmware.
//!
//! Two filesystems share one block device contract:
//! - [`filesys::fat16::Fat16`], a FAT16 driver for cards formatted elsewhere
//! - [`filesys::flatfs::FlatFs`], a one-file-per-sector format for minimal builds
#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]
extern crate alloc;

pub mod filesys;
pub mod logging;

pub mod prelude {
    pub use crate::filesys::fat16::{Fat16, Fat16File, ShortName};
    pub use crate::filesys::flatfs::{FlatFile, FlatFs, FlatFsConfig, FlatName};
    pub use crate::filesys::{BlockDevice, FsError, OpenFlags, SeekFrom};
}
