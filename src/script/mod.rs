//! The parameter script language.
//!
//! Default parameters and configuration files are both small scripts of
//! top-level assignments:
//!
//! ```text
//! # possible values: GFS3, GFS4 or GFS5
//! model = "GFS3"
//! expected_file_size = 10e+7
//! data_dir = join(env("HOME"), "data")
//!
//! if int(now("%H")) % 2 == 0 {
//!   forecast_hour = 4
//! } else {
//!   forecast_hour = 3
//! }
//!
//! when model == "GFS5" {
//!   expected_file_size = 20e+7
//! }
//! ```
//!
//! ## Security
//!
//! Scripts are trusted input, but the language cannot run host code, read
//! files, loop, or define functions. The only outside state a script sees is
//! the [`ScriptEnv`] it is evaluated against.

mod ast;
mod env;
mod error;
mod eval;
mod lexer;
mod parser;

pub use ast::{BinaryOp, Expr, ExprKind, Program, Stmt, Target, UnaryOp};
pub use env::ScriptEnv;
pub use error::{Pos, ScriptError, ScriptErrorKind};
pub use eval::{Evaluation, evaluate};
pub use lexer::{Spanned, Token, tokenize};
pub use parser::parse;

/// Parse and evaluate a script in one step.
pub fn run(source: &str, env: &ScriptEnv) -> Result<Evaluation, ScriptError> {
    let program = parse(source)?;
    evaluate(&program, env)
}
