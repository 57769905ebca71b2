#![allow(unreachable_pub)]

mod error;
mod state;

pub use error::{BuildError, ErrorKind};
pub use state::State;

/// The result of a single submitted request.
///
/// In a batch, one `Outcome` is returned per input position.
pub type Outcome<T, E> = std::result::Result<T, ErrorKind<E>>;
