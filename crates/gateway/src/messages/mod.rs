//! Wire records exchanged with fgms peers
//!
//! Both directions use ASCII records terminated by a single NUL byte.

pub mod framing;
pub mod reply;

pub use framing::{RECORD_TERMINATOR, has_record, next_record, partial_len};
pub use reply::Reply;
