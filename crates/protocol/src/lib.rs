//! Activity Check Protocol - Record definitions and validation
//!
//! This crate defines the data exchanged with the `/isgood` endpoint:
//! - `Record`/`KeyValueEntry`: One submitted activity check and its typed payload
//! - `ValidationError`: Why a batch was rejected
//! - `Verdict`/`ErrorBody`: The JSON bodies written back to the caller
//!
//! Validation is a pure function of its input and holds no state between calls.

mod record;
mod response;
mod validation;

pub use record::*;
pub use response::*;
pub use validation::*;
