//! Wire protocol and codec — MessagePack records over TCP.

pub mod codec;
pub mod protocol;
