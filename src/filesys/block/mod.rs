//! Block device implementations usable by both filesystems

pub mod memory;

pub use memory::MemoryBlockDevice;
