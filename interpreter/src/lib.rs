pub mod error;
pub mod interpreter;
pub mod parser;
pub mod session;

pub(crate) mod ast;
mod callable;
pub(crate) mod env;
mod limits;
mod stack;
mod value;

pub use error::{exit_code, Error, FaultKind, LoskResult};
pub use interpreter::Interpreter;
pub use parser::{Parser, StmtStream};
pub use session::Session;
