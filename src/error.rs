//! Error type shared by every layer of the engine.
//!
//! Build-time failures (cfg parsing, class lookup, wiring) are fatal for the
//! affected network and propagate to the caller. Runtime variable-level
//! failures are logged at the failure site and squashed so a bad set/get
//! never halts the audio cycle. `Eof` is the benign end-of-stream signal:
//! a proc returns it to request a halt at the end of the current cycle.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArg(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("operation failed: {0}")]
    OpFail(String),

    #[error("end of stream")]
    Eof,

    #[error("resource not available: {0}")]
    ResourceNotAvailable(String),

    #[error("audio file: {0}")]
    AudioFile(#[from] hound::Error),

    #[error("cfg parse: {0}")]
    CfgParse(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the benign halt signal, false for real failures.
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::Eof)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand constructors. Most call sites build errors from formatted
/// context strings, so these keep the noise down.
macro_rules! err_ctor {
    ($fn_name:ident, $variant:ident) => {
        pub fn $fn_name(msg: impl Into<String>) -> Error {
            Error::$variant(msg.into())
        }
    };
}

impl Error {
    err_ctor!(syntax, Syntax);
    err_ctor!(not_found, NotFound);
    err_ctor!(invalid_arg, InvalidArg);
    err_ctor!(invalid_state, InvalidState);
    err_ctor!(type_mismatch, TypeMismatch);
    err_ctor!(op_fail, OpFail);
    err_ctor!(resource, ResourceNotAvailable);
}
