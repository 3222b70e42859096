use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatastowError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Argument '{name}' has no deterministic representation: {reason}")]
    UnrepresentableArgument { name: String, reason: String },
    #[error("Function '{function}' declares unsupported return type '{declared}' (supported: table, file, blob)")]
    UnsupportedReturnType { function: String, declared: String },
    #[error("Call to '{function}' omits required argument '{name}' (no default declared)")]
    MissingRequiredArgument { function: String, name: String },
    #[error("No stored output for '{function}' with arguments {args}; rebuild the store or check the declared call sites")]
    StoreLookup { function: String, args: String },
    #[error("Function '{function}' failed during build: {message}")]
    Invocation { function: String, message: String },
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
}
