pub mod console;
pub mod repl;

pub use console::{print_error, Console};
pub use repl::{is_exit, run_repl, ReplSummary, EXIT_COMMAND};
