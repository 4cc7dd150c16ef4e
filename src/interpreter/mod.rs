mod expr;
mod itpr;
mod module;
mod stmt;

pub use itpr::{Interpreter, MAX_CALL_DEPTH, PANIC_FLAG};
