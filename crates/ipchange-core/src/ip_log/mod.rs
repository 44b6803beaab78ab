// # IP Log Implementations
//
// This module provides implementations of the IpLogStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileIpLog;
pub use memory::MemoryIpLog;
