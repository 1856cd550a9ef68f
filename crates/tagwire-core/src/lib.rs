pub mod constants;
pub mod error;
pub mod ident;
pub mod notify;
pub mod tag;

pub use error::{Error, ReaderError, ReaderErrorKind, Result};
pub use notify::ListenerSet;
pub use tag::{Tag, TagBuilder};

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
