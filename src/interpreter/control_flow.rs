//! Control Flow
//!
//! `break`, `continue`, `return`, and `exit` unwind an arbitrary number of
//! enclosing constructs. They propagate as the `Err` arm of interpreter
//! results; loop and function frames intercept them, decrement counts, and
//! either stop or rethrow. External observers only ever see the final
//! numeric status - the legacy sentinel exit codes (253/254/255) cannot
//! leak because control flow is typed, not numeric.

/// Non-local control flow unwinding through interpreter frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    /// `break [n]` - unwind n enclosing loops
    Break(u32),
    /// `continue [n]` - skip to the next iteration of the n-th loop
    Continue(u32),
    /// `return [n]` - unwind exactly one function frame with status n
    Return(i32),
    /// `exit [n]` - terminate the shell with status n
    Exit(i32),
}

/// Result type threaded through the interpreter: a numeric exit status or
/// an unwinding control-flow action.
pub type ExecResult = Result<i32, ControlFlow>;
