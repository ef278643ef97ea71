//! Tree-walking evaluator for parameter scripts.
//!
//! There are no loops, user functions, or I/O builtins, so evaluation always
//! terminates and can only observe what the [`ScriptEnv`] exposes.

use super::ast::{BinaryOp, Expr, ExprKind, Program, Stmt, UnaryOp};
use super::env::ScriptEnv;
use super::error::{Pos, ScriptError};
use crate::overrides::OverrideRule;
use crate::value::Value;
use indexmap::IndexMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Largest string a repetition may build, in bytes.
pub const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

/// Everything a script produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Top-level bindings in order of first assignment.
    pub bindings: IndexMap<String, Value>,
    /// Override rules in declaration order.
    pub rules: Vec<OverrideRule>,
}

pub fn evaluate(program: &Program, env: &ScriptEnv) -> Result<Evaluation, ScriptError> {
    let mut interp = Interpreter {
        env,
        out: Evaluation::default(),
    };
    interp.exec_block(&program.stmts)?;
    Ok(interp.out)
}

struct Interpreter<'e> {
    env: &'e ScriptEnv,
    out: Evaluation,
}

impl Interpreter<'_> {
    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<(), ScriptError> {
        for stmt in stmts {
            self.exec(stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<(), ScriptError> {
        match stmt {
            Stmt::Assign { name, value, .. } => {
                let value = self.eval(value)?;
                self.out.bindings.insert(name.clone(), value);
            }
            Stmt::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.is_truthy() {
                        return self.exec_block(body);
                    }
                }
                self.exec_block(otherwise)?;
            }
            Stmt::When {
                trigger,
                value,
                targets,
                ..
            } => {
                let trigger_value = self.eval(value)?;
                for target in targets {
                    let target_value = self.eval(&target.value)?;
                    self.out.rules.push(OverrideRule::new(
                        trigger.clone(),
                        trigger_value.clone(),
                        target.name.clone(),
                        target_value,
                    ));
                }
            }
        }
        Ok(())
    }

    fn eval(&self, expr: &Expr) -> Result<Value, ScriptError> {
        let pos = expr.pos;
        match &expr.kind {
            ExprKind::Literal(v) => Ok(v.clone()),
            ExprKind::Name(name) => self
                .out
                .bindings
                .get(name)
                .cloned()
                .ok_or_else(|| ScriptError::eval(pos, format!("undefined name `{}`", name))),
            ExprKind::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            ExprKind::Unary(op, operand) => {
                let v = self.eval(operand)?;
                unary(*op, v, pos)
            }
            ExprKind::Binary(BinaryOp::And, left, right) => {
                let l = self.eval(left)?;
                if l.is_truthy() { self.eval(right) } else { Ok(l) }
            }
            ExprKind::Binary(BinaryOp::Or, left, right) => {
                let l = self.eval(left)?;
                if l.is_truthy() { Ok(l) } else { self.eval(right) }
            }
            ExprKind::Binary(op, left, right) => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                binary(*op, l, r, pos)
            }
            ExprKind::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(name, args, pos)
            }
        }
    }

    fn call(&self, name: &str, args: Vec<Value>, pos: Pos) -> Result<Value, ScriptError> {
        let call = Call { name, pos };
        match name {
            "env" => {
                call.arity(&args, 1, 2)?;
                let var = call.string(&args[0], 1)?;
                match (self.env.var(var), args.get(1)) {
                    (Some(v), _) => Ok(Value::Str(v.to_string())),
                    (None, Some(default)) => Ok(default.clone()),
                    (None, None) => Err(call.fail(format!(
                        "environment variable `{}` is not set",
                        var
                    ))),
                }
            }
            "home" => {
                call.arity(&args, 0, 0)?;
                self.env
                    .home()
                    .map(|h| Value::Str(h.to_string_lossy().into_owned()))
                    .ok_or_else(|| call.fail("home directory is unknown"))
            }
            "join" => {
                call.arity(&args, 1, usize::MAX)?;
                let mut path = PathBuf::new();
                for (i, part) in args.iter().enumerate() {
                    path.push(call.string(part, i + 1)?);
                }
                Ok(Value::Str(path.to_string_lossy().into_owned()))
            }
            "basename" => {
                call.arity(&args, 1, 1)?;
                let p = Path::new(call.string(&args[0], 1)?);
                Ok(Value::Str(
                    p.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                ))
            }
            "dirname" => {
                call.arity(&args, 1, 1)?;
                let p = Path::new(call.string(&args[0], 1)?);
                Ok(Value::Str(
                    p.parent()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                ))
            }
            "now" => {
                call.arity(&args, 0, 1)?;
                let fmt = match args.first() {
                    Some(v) => call.string(v, 1)?,
                    None => "%Y-%m-%dT%H:%M:%S",
                };
                let mut out = String::new();
                write!(out, "{}", self.env.now().format(fmt))
                    .map_err(|_| call.fail(format!("invalid time format {:?}", fmt)))?;
                Ok(Value::Str(out))
            }
            "int" => {
                call.arity(&args, 1, 1)?;
                to_int(&args[0]).ok_or_else(|| {
                    call.fail(format!("cannot convert {} to int", args[0].to_literal()))
                })
            }
            "float" => {
                call.arity(&args, 1, 1)?;
                to_float(&args[0]).ok_or_else(|| {
                    call.fail(format!("cannot convert {} to float", args[0].to_literal()))
                })
            }
            "str" => {
                call.arity(&args, 1, 1)?;
                Ok(Value::Str(args[0].to_string()))
            }
            "upper" => {
                call.arity(&args, 1, 1)?;
                Ok(Value::Str(call.string(&args[0], 1)?.to_uppercase()))
            }
            "lower" => {
                call.arity(&args, 1, 1)?;
                Ok(Value::Str(call.string(&args[0], 1)?.to_lowercase()))
            }
            "len" => {
                call.arity(&args, 1, 1)?;
                match &args[0] {
                    Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                    Value::List(items) => Ok(Value::Int(items.len() as i64)),
                    other => Err(call.fail(format!("{} has no length", other.kind()))),
                }
            }
            _ => Err(ScriptError::eval(pos, format!("unknown function `{}`", name))),
        }
    }
}

/// Builtin call site, for argument checking and error messages.
struct Call<'a> {
    name: &'a str,
    pos: Pos,
}

impl Call<'_> {
    fn fail(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::eval(self.pos, format!("{}(): {}", self.name, message.into()))
    }

    fn arity(&self, args: &[Value], min: usize, max: usize) -> Result<(), ScriptError> {
        if args.len() < min || args.len() > max {
            let expected = match (min, max) {
                (m, n) if m == n => format!("{}", m),
                (m, usize::MAX) => format!("at least {}", m),
                (m, n) => format!("{} to {}", m, n),
            };
            return Err(self.fail(format!(
                "expected {} argument(s), got {}",
                expected,
                args.len()
            )));
        }
        Ok(())
    }

    fn string<'v>(&self, value: &'v Value, index: usize) -> Result<&'v str, ScriptError> {
        value.as_str().ok_or_else(|| {
            self.fail(format!(
                "argument {} must be a string, found {}",
                index,
                value.kind()
            ))
        })
    }
}

fn to_int(v: &Value) -> Option<Value> {
    match v {
        Value::Int(i) => Some(Value::Int(*i)),
        Value::Bool(b) => Some(Value::Int(i64::from(*b))),
        Value::Float(f) if f.is_finite() && f.trunc().abs() < 9.2e18 => {
            Some(Value::Int(f.trunc() as i64))
        }
        Value::Str(s) => s.trim().parse::<i64>().ok().map(Value::Int),
        _ => None,
    }
}

fn to_float(v: &Value) -> Option<Value> {
    match v {
        Value::Float(f) => Some(Value::Float(*f)),
        Value::Int(i) => Some(Value::Float(*i as f64)),
        Value::Bool(b) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::Str(s) => s.trim().parse::<f64>().ok().map(Value::Float),
        _ => None,
    }
}

fn unary(op: UnaryOp, v: Value, pos: Pos) -> Result<Value, ScriptError> {
    match (op, v) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| ScriptError::eval(pos, "integer overflow")),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, v) => Err(ScriptError::eval(
            pos,
            format!("cannot negate {}", v.kind()),
        )),
    }
}

fn binary(op: BinaryOp, l: Value, r: Value, pos: Pos) -> Result<Value, ScriptError> {
    let overflow = || ScriptError::eval(pos, "integer overflow");
    let mismatch = |l: &Value, r: &Value| {
        ScriptError::eval(
            pos,
            format!(
                "unsupported operand kinds for `{}`: {} and {}",
                op.symbol(),
                l.kind(),
                r.kind()
            ),
        )
    };

    match op {
        BinaryOp::Eq => return Ok(Value::Bool(l.matches(&r))),
        BinaryOp::Ne => return Ok(Value::Bool(!l.matches(&r))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => match (l.as_float(), r.as_float()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => return Err(mismatch(&l, &r)),
                },
            };
            let result = match ordering {
                Some(o) => match op {
                    BinaryOp::Lt => o.is_lt(),
                    BinaryOp::Le => o.is_le(),
                    BinaryOp::Gt => o.is_gt(),
                    _ => o.is_ge(),
                },
                // NaN compares false.
                None => false,
            };
            return Ok(Value::Bool(result));
        }
        _ => {}
    }

    match (op, l, r) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (BinaryOp::Add, Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (BinaryOp::Mul, Value::Str(s), Value::Int(n)) | (BinaryOp::Mul, Value::Int(n), Value::Str(s)) => {
            let n = usize::try_from(n)
                .map_err(|_| ScriptError::eval(pos, "cannot repeat a string a negative number of times"))?;
            match s.len().checked_mul(n) {
                Some(len) if len <= MAX_STRING_LEN => Ok(Value::Str(s.repeat(n))),
                _ => Err(ScriptError::eval(pos, "string too long")),
            }
        }
        (BinaryOp::Add, Value::Int(a), Value::Int(b)) => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
        (BinaryOp::Sub, Value::Int(a), Value::Int(b)) => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
        (BinaryOp::Mul, Value::Int(a), Value::Int(b)) => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
        (BinaryOp::Rem, Value::Int(a), Value::Int(b)) => {
            if b == 0 {
                return Err(ScriptError::eval(pos, "modulo by zero"));
            }
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            // Result takes the sign of the divisor.
            Ok(Value::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
        }
        (op, l @ (Value::Int(_) | Value::Float(_)), r @ (Value::Int(_) | Value::Float(_))) => {
            let (a, b) = match (l.as_float(), r.as_float()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(mismatch(&l, &r)),
            };
            match op {
                BinaryOp::Add => Ok(Value::Float(a + b)),
                BinaryOp::Sub => Ok(Value::Float(a - b)),
                BinaryOp::Mul => Ok(Value::Float(a * b)),
                BinaryOp::Div if b == 0.0 => Err(ScriptError::eval(pos, "division by zero")),
                BinaryOp::Div => Ok(Value::Float(a / b)),
                BinaryOp::Rem if b == 0.0 => Err(ScriptError::eval(pos, "modulo by zero")),
                BinaryOp::Rem => {
                    let r = a % b;
                    Ok(Value::Float(if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }))
                }
                _ => Err(mismatch(&l, &r)),
            }
        }
        (_, l, r) => Err(mismatch(&l, &r)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::run;
    use chrono::NaiveDate;

    fn fixed_env() -> ScriptEnv {
        let now = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        ScriptEnv::empty()
            .with_var("HOME", "/home/forecaster")
            .with_home("/home/forecaster")
            .with_now(now)
    }

    fn eval_one(source: &str, name: &str) -> Value {
        run(source, &fixed_env()).unwrap().bindings[name].clone()
    }

    fn eval_err(source: &str) -> ScriptError {
        run(source, &fixed_env()).unwrap_err()
    }

    #[test]
    fn test_bindings_keep_first_assignment_order() {
        let out = run("b = 1\na = 2\nb = 3\n", &fixed_env()).unwrap();
        let names: Vec<&str> = out.bindings.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(out.bindings["b"], Value::Int(3));
    }

    #[test]
    fn test_string_repeat_is_bounded() {
        assert_eq!(eval_one("x = \"ab\" * 3", "x"), Value::from("ababab"));
        let err = eval_err("x = \"a\" * 9223372036854775807");
        assert_eq!(err.kind, crate::script::ScriptErrorKind::Eval);
        assert!(err.message.contains("string too long"));
        let err = eval_err("x = 4611686018427387904 * \"ab\"");
        assert!(err.message.contains("string too long"));
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(eval_one("x = 7 % 3 + 2 * 4 - 1", "x"), Value::Int(8));
        assert_eq!(eval_one("x = -7 % 3", "x"), Value::Int(2));
        assert_eq!(eval_one("x = 7 / 2", "x"), Value::Float(3.5));
    }

    #[test]
    fn test_mixed_numeric_promotes_to_float() {
        assert_eq!(eval_one("x = 10e+7 * 2", "x"), Value::Float(2e8));
        assert_eq!(eval_one("x = 1 + 0.5", "x"), Value::Float(1.5));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let err = eval_err("x = 9223372036854775807 + 1");
        assert!(err.message.contains("overflow"));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(eval_err("x = 1 / 0").message.contains("division by zero"));
        assert!(eval_err("x = 1 % 0").message.contains("modulo by zero"));
    }

    #[test]
    fn test_string_composition() {
        assert_eq!(eval_one("x = \"ab\" + \"cd\"", "x"), Value::from("abcd"));
        assert_eq!(eval_one("x = \"-\" * 3", "x"), Value::from("---"));
        assert_eq!(eval_one("x = upper(\"gfs\") + str(4)", "x"), Value::from("GFS4"));
    }

    #[test]
    fn test_path_builtins() {
        let source = "data = join(env(\"HOME\"), \"data\")\nout = join(data, \"output\", \"run.out\")\nbase = basename(out)\ndir = dirname(out)\n";
        let out = run(source, &fixed_env()).unwrap();
        assert_eq!(out.bindings["data"], Value::from("/home/forecaster/data"));
        assert_eq!(out.bindings["base"], Value::from("run.out"));
        assert_eq!(out.bindings["dir"], Value::from("/home/forecaster/data/output"));
    }

    #[test]
    fn test_env_default_and_missing() {
        assert_eq!(eval_one("x = env(\"NOPE\", 5)", "x"), Value::Int(5));
        let err = eval_err("x = env(\"NOPE\")");
        assert!(err.message.contains("NOPE"));
    }

    #[test]
    fn test_now_uses_fixed_clock() {
        assert_eq!(eval_one("d = now(\"%Y%m%d\")", "d"), Value::from("20240309"));
        let source = "if int(now(\"%H\")) % 2 == 0 {\n  h = 4\n} else {\n  h = 3\n}";
        assert_eq!(eval_one(source, "h"), Value::Int(4));
    }

    #[test]
    fn test_conditionals_only_bind_taken_branch() {
        let out = run("if false { a = 1 } else { b = 2 }", &fixed_env()).unwrap();
        assert!(!out.bindings.contains_key("a"));
        assert_eq!(out.bindings["b"], Value::Int(2));
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        assert_eq!(eval_one("x = \"\" or \"fallback\"", "x"), Value::from("fallback"));
        // The right side would fail if evaluated.
        assert_eq!(eval_one("x = false and undefined_name", "x"), Value::Bool(false));
        assert_eq!(eval_one("x = not 0", "x"), Value::Bool(true));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval_one("x = 2 == 2.0", "x"), Value::Bool(true));
        assert_eq!(eval_one("x = \"a\" < \"b\"", "x"), Value::Bool(true));
        assert_eq!(eval_one("x = 3 >= 3.5", "x"), Value::Bool(false));
        assert!(eval_err("x = \"a\" < 1").message.contains("unsupported operand"));
    }

    #[test]
    fn test_when_records_rules_in_order() {
        let source = "model = \"GFS3\"\nwhen model == \"GFS5\" {\n  size = 20e+7\n  hours = 48\n}\n";
        let out = run(source, &fixed_env()).unwrap();
        assert_eq!(out.rules.len(), 2);
        assert_eq!(out.rules[0].target, "size");
        assert_eq!(out.rules[0].trigger_value, Value::from("GFS5"));
        assert_eq!(out.rules[1].target_value, Value::Int(48));
        // Rules never create bindings.
        assert!(!out.bindings.contains_key("size"));
    }

    #[test]
    fn test_undefined_name_reports_position() {
        let err = eval_err("a = 1\nb = a + c");
        assert_eq!(err.pos, Pos::new(2, 9));
        assert!(err.message.contains("`c`"));
    }

    #[test]
    fn test_unknown_function() {
        assert!(eval_err("x = open(\"/etc/passwd\")").message.contains("unknown function"));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(eval_one("x = int(\" 42 \")", "x"), Value::Int(42));
        assert_eq!(eval_one("x = int(3.9)", "x"), Value::Int(3));
        assert_eq!(eval_one("x = float(\"inf\")", "x"), Value::Float(f64::INFINITY));
        assert!(eval_err("x = int(\"abc\")").message.contains("cannot convert"));
    }

    #[test]
    fn test_lists_are_values() {
        assert_eq!(
            eval_one("x = [1, \"a\"] + [none]", "x"),
            Value::List(vec![Value::Int(1), Value::from("a"), Value::None])
        );
        assert_eq!(eval_one("x = len([1, 2, 3])", "x"), Value::Int(3));
    }
}
