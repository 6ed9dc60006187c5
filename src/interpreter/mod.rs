//! Script Interpreter
//!
//! Control-structure evaluation over parsed logical units, the tagged
//! control-flow result type, and the arithmetic evaluator.

pub mod arithmetic;
pub mod case_eval;
pub mod conditionals;
pub mod control_flow;
pub mod functions;
pub mod interpreter;
pub mod loops;

pub use interpreter::{
    execute_block, execute_text, execute_unit, run_hooks, run_pending_traps, safe_point,
};
