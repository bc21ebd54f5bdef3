//! Raw tile buffers by address string.
//!
//! Requesters form a chain. A request is answered from the first link that holds the
//! buffer, or travels to the root, which asks an [`ExternalSource`]. Released
//! buffers travel the other way: each link decides to keep them or to pass them on.

mod file;
mod memory;
mod requester;

pub use file::*;
pub use memory::*;
pub use requester::*;
