//! Types shared by the converter controllers and their hosts.

pub mod domain;
pub mod error;
pub mod format;
