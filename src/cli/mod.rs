//! Command-line surface derived from the schema.
//!
//! Built with the clap builder API since flags come from the schema at
//! runtime. Every bool parameter gets a `--name` / `--no-name` pair in a
//! mutually exclusive group; int, float and string parameters get a typed
//! `--name <value>` option; opaque parameters get no flag. Only values the
//! user actually typed are reported, so "not given" and "given as false"
//! stay distinct.

use crate::error::Result;
use crate::logging::{LOG_LEVEL_PARAM, LOG_PATH_PARAM, LogLevel};
use crate::schema::{ParameterSpec, Schema};
use crate::value::{ParamKind, Value};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::warn;

// Ids of built-in args use the reserved prefix so no parameter can clash.
const CONFIG_ID: &str = "__config";
const PRINT_PARAMS_ID: &str = "__print_params";
const LOG_LEVEL_ID: &str = "__log_level";
const LOG_PATH_ID: &str = "__log_path";

/// Long names a parameter flag may not take.
const BUILTIN_LONGS: &[&str] = &["config", "print-params", "log-level", "log-path", "help"];

/// Exit status after `--print-params`.
pub const PRINT_PARAMS_EXIT_CODE: i32 = 1;

/// Options controlling which flags are generated.
#[derive(Debug, Clone)]
pub struct CliOptions {
    pub name: String,
    pub about: Option<String>,
    /// Generate one flag (or flag pair) per scalar parameter.
    pub param_flags: bool,
    /// Add `--log-level` and `--log-path`.
    pub logging_flags: bool,
    /// Caller-defined arguments; their matches come back in
    /// [`CliValues::matches`].
    pub extra_args: Vec<Arg>,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            about: None,
            param_flags: true,
            logging_flags: true,
            extra_args: Vec::new(),
        }
    }
}

/// How a schema parameter is read back out of the matches.
#[derive(Debug, Clone)]
enum Binding {
    Toggle { on: String, off: String },
    Typed { id: String, kind: ParamKind },
}

#[derive(Debug, Clone, Default)]
struct FlagPlan {
    bindings: Vec<(String, Binding)>,
    skipped: Vec<String>,
    level_doubles_param: bool,
    path_doubles_param: bool,
}

fn doubles_param(schema: &Schema, options: &CliOptions, name: &str) -> bool {
    options.logging_flags
        && schema
            .get(name)
            .is_some_and(|spec| spec.kind == ParamKind::String)
}

fn plan(schema: &Schema, options: &CliOptions) -> FlagPlan {
    let mut plan = FlagPlan {
        level_doubles_param: doubles_param(schema, options, LOG_LEVEL_PARAM),
        path_doubles_param: doubles_param(schema, options, LOG_PATH_PARAM),
        ..Default::default()
    };
    if !options.param_flags {
        return plan;
    }

    for spec in schema.iter() {
        let name = spec.name.as_str();
        if (plan.level_doubles_param && name == LOG_LEVEL_PARAM)
            || (plan.path_doubles_param && name == LOG_PATH_PARAM)
        {
            continue;
        }
        if !spec.kind.is_scalar() {
            continue;
        }
        if BUILTIN_LONGS.contains(&name) {
            warn!(param = %name, "Parameter flag clashes with a built-in flag, skipping");
            plan.skipped.push(name.to_string());
            continue;
        }
        let binding = match spec.kind {
            ParamKind::Bool => Binding::Toggle {
                on: name.to_string(),
                off: format!("__no_{}", name),
            },
            kind => Binding::Typed {
                id: name.to_string(),
                kind,
            },
        };
        plan.bindings.push((name.to_string(), binding));
    }
    plan
}

fn param_help(spec: &ParameterSpec) -> String {
    format!("{} (default: {})", spec.kind, spec.default.to_literal())
}

fn build(schema: &Schema, options: &CliOptions, plan: &FlagPlan) -> Command {
    let mut cmd = Command::new(options.name.clone())
        .arg(
            Arg::new(CONFIG_ID)
                .short('c')
                .long("config")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Configuration file"),
        )
        .arg(
            Arg::new(PRINT_PARAMS_ID)
                .short('p')
                .long("print-params")
                .action(ArgAction::SetTrue)
                .help("Print the default parameters and exit"),
        );
    if let Some(about) = &options.about {
        cmd = cmd.about(about.clone());
    }

    if options.logging_flags {
        cmd = cmd
            .arg(
                Arg::new(LOG_LEVEL_ID)
                    .short('d')
                    .long("log-level")
                    .value_name("LEVEL")
                    .value_parser(clap::value_parser!(LogLevel))
                    .ignore_case(true)
                    .default_value(LogLevel::default().as_str())
                    .help("Log verbosity"),
            )
            .arg(
                Arg::new(LOG_PATH_ID)
                    .short('l')
                    .long("log-path")
                    .value_name("PATH")
                    .allow_hyphen_values(true)
                    .default_value("-")
                    .help("Log file, or - for stdout"),
            );
    }

    for (name, binding) in &plan.bindings {
        let Some(spec) = schema.get(name) else {
            continue;
        };
        match binding {
            Binding::Toggle { on, off } => {
                cmd = cmd
                    .arg(
                        Arg::new(on.clone())
                            .long(name.clone())
                            .action(ArgAction::SetTrue)
                            .help(param_help(spec)),
                    )
                    .arg(
                        Arg::new(off.clone())
                            .long(format!("no-{}", name))
                            .action(ArgAction::SetTrue)
                            .help(format!("Set {} to false", name)),
                    )
                    .group(
                        ArgGroup::new(format!("__toggle_{}", name))
                            .args([on.clone(), off.clone()])
                            .multiple(false),
                    );
            }
            Binding::Typed { id, kind } => {
                let arg = Arg::new(id.clone())
                    .long(name.clone())
                    .value_name(kind.as_str().to_ascii_uppercase())
                    .help(param_help(spec));
                let arg = match kind {
                    ParamKind::Int => arg
                        .value_parser(clap::value_parser!(i64))
                        .allow_negative_numbers(true),
                    ParamKind::Float => arg
                        .value_parser(clap::value_parser!(f64))
                        .allow_negative_numbers(true),
                    _ => arg.allow_hyphen_values(true),
                };
                cmd = cmd.arg(arg);
            }
        }
    }

    for extra in &options.extra_args {
        cmd = cmd.arg(extra.clone());
    }
    cmd
}

/// Build the clap command for `schema`.
pub fn build_command(schema: &Schema, options: &CliOptions) -> Command {
    build(schema, options, &plan(schema, options))
}

fn given(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

fn collect(plan: &FlagPlan, matches: &ArgMatches) -> IndexMap<String, Value> {
    let mut values = IndexMap::new();
    for (name, binding) in &plan.bindings {
        let value = match binding {
            Binding::Toggle { on, off } => {
                if given(matches, on) {
                    Some(Value::Bool(true))
                } else if given(matches, off) {
                    Some(Value::Bool(false))
                } else {
                    None
                }
            }
            Binding::Typed { id, kind } if given(matches, id) => match kind {
                ParamKind::Int => matches.get_one::<i64>(id).map(|v| Value::Int(*v)),
                ParamKind::Float => matches.get_one::<f64>(id).map(|v| Value::Float(*v)),
                _ => matches.get_one::<String>(id).map(|v| Value::Str(v.clone())),
            },
            Binding::Typed { .. } => None,
        };
        if let Some(value) = value {
            values.insert(name.clone(), value);
        }
    }

    if plan.level_doubles_param && given(matches, LOG_LEVEL_ID) {
        if let Some(level) = matches.get_one::<LogLevel>(LOG_LEVEL_ID) {
            values.insert(LOG_LEVEL_PARAM.to_string(), Value::from(level.as_str()));
        }
    }
    if plan.path_doubles_param && given(matches, LOG_PATH_ID) {
        if let Some(path) = matches.get_one::<String>(LOG_PATH_ID) {
            values.insert(LOG_PATH_PARAM.to_string(), Value::Str(path.clone()));
        }
    }
    values
}

/// Result of parsing the command line.
#[derive(Debug, Clone)]
pub enum CliOutcome {
    Proceed(CliValues),
    /// Print `text` and terminate with `code`.
    PrintAndExit { text: String, code: i32 },
}

/// Parse `args` (including the program name) against `schema`.
///
/// `--print-params` yields [`CliOutcome::PrintAndExit`] carrying
/// `default_text` verbatim. Help and usage failures come back as
/// [`ParamError::Usage`](crate::ParamError::Usage).
pub fn parse_args<I, T>(
    schema: &Schema,
    default_text: &str,
    options: &CliOptions,
    args: I,
) -> Result<CliOutcome>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let plan = plan(schema, options);
    let matches = build(schema, options, &plan).try_get_matches_from(args)?;

    if matches.get_flag(PRINT_PARAMS_ID) {
        return Ok(CliOutcome::PrintAndExit {
            text: default_text.to_string(),
            code: PRINT_PARAMS_EXIT_CODE,
        });
    }

    let mut cli = CliValues::new();
    cli.values = collect(&plan, &matches);
    cli.skipped_flags = plan.skipped;
    cli.config = matches.get_one::<PathBuf>(CONFIG_ID).cloned();
    if options.logging_flags {
        cli.log_level = matches.get_one::<LogLevel>(LOG_LEVEL_ID).copied();
        cli.log_path = matches.get_one::<String>(LOG_PATH_ID).cloned();
    }
    cli.matches = matches;
    Ok(CliOutcome::Proceed(cli))
}

/// Values supplied on the command line.
///
/// `values` only holds parameters the user gave explicitly, in schema
/// order.
#[derive(Debug, Clone, Default)]
pub struct CliValues {
    config: Option<PathBuf>,
    values: IndexMap<String, Value>,
    log_level: Option<LogLevel>,
    log_path: Option<String>,
    skipped_flags: Vec<String>,
    matches: ArgMatches,
}

impl CliValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = Some(path.into());
        self
    }

    /// Record an explicitly set parameter.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn with_log_path(mut self, path: impl Into<String>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config.as_deref()
    }

    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    pub fn log_path(&self) -> Option<&str> {
        self.log_path.as_deref()
    }

    /// Parameters that got no flag because their name clashes with a
    /// built-in flag.
    pub fn skipped_flags(&self) -> &[String] {
        &self.skipped_flags
    }

    /// Matches for everything, including caller-defined arguments.
    pub fn matches(&self) -> &ArgMatches {
        &self.matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParamError;
    use crate::script::ScriptEnv;

    const DEFAULTS: &str = r#"
model = "GFS3"
expected_file_size = 1e8
forecast_hours = 24
debug = false
regions = ["conus", "alaska"]
"#;

    fn schema(defaults: &str) -> Schema {
        crate::schema::infer(defaults, &ScriptEnv::empty()).unwrap().0
    }

    fn parse(args: &[&str]) -> Result<CliOutcome> {
        let mut argv = vec!["prog"];
        argv.extend_from_slice(args);
        parse_args(&schema(DEFAULTS), DEFAULTS, &CliOptions::default(), argv)
    }

    fn proceed(args: &[&str]) -> CliValues {
        match parse(args).unwrap() {
            CliOutcome::Proceed(cli) => cli,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_nothing_given() {
        let cli = proceed(&[]);
        assert!(cli.values().is_empty());
        assert_eq!(cli.config_path(), None);
        assert_eq!(cli.log_level(), Some(LogLevel::Info));
        assert_eq!(cli.log_path(), Some("-"));
    }

    #[test]
    fn test_typed_values() {
        let cli = proceed(&[
            "--model",
            "GFS5",
            "--forecast_hours",
            "-6",
            "--expected_file_size",
            "2e8",
        ]);
        assert_eq!(cli.get("model"), Some(&Value::from("GFS5")));
        assert_eq!(cli.get("forecast_hours"), Some(&Value::Int(-6)));
        assert_eq!(cli.get("expected_file_size"), Some(&Value::Float(2e8)));
        // Schema order, not argument order.
        let keys: Vec<&str> = cli.values().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["model", "expected_file_size", "forecast_hours"]);
    }

    #[test]
    fn test_bad_int_is_usage_error() {
        let err = parse(&["--forecast_hours", "many"]).unwrap_err();
        assert!(matches!(err, ParamError::Usage(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_bool_pair() {
        assert_eq!(proceed(&["--debug"]).get("debug"), Some(&Value::Bool(true)));
        assert_eq!(
            proceed(&["--no-debug"]).get("debug"),
            Some(&Value::Bool(false))
        );
        assert_eq!(proceed(&[]).get("debug"), None);
    }

    #[test]
    fn test_bool_pair_is_mutually_exclusive() {
        let err = parse(&["--debug", "--no-debug"]).unwrap_err();
        match err {
            ParamError::Usage(e) => {
                assert_eq!(e.kind(), clap::error::ErrorKind::ArgumentConflict)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_opaque_has_no_flag() {
        let err = parse(&["--regions", "x"]).unwrap_err();
        assert!(matches!(err, ParamError::Usage(_)));
    }

    #[test]
    fn test_print_params() {
        match parse(&["-p"]).unwrap() {
            CliOutcome::PrintAndExit { text, code } => {
                assert_eq!(text, DEFAULTS);
                assert_eq!(code, 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_config_and_logging_flags() {
        let cli = proceed(&["-c", "site.params", "-d", "debug", "-l", "run.log"]);
        assert_eq!(cli.config_path(), Some(Path::new("site.params")));
        assert_eq!(cli.log_level(), Some(LogLevel::Debug));
        assert_eq!(cli.log_path(), Some("run.log"));
        assert!(cli.values().is_empty());
    }

    #[test]
    fn test_bad_log_level() {
        assert!(matches!(
            parse(&["--log-level", "LOUD"]).unwrap_err(),
            ParamError::Usage(_)
        ));
    }

    #[test]
    fn test_logging_flag_doubles_declared_parameter() {
        let defaults = "log_level = \"INFO\"\nlog_path = \"-\"\n";
        let schema = schema(defaults);
        let outcome = parse_args(
            &schema,
            defaults,
            &CliOptions::default(),
            ["prog", "--log-level", "warning"],
        )
        .unwrap();
        let CliOutcome::Proceed(cli) = outcome else {
            panic!("expected Proceed");
        };
        assert_eq!(cli.get(LOG_LEVEL_PARAM), Some(&Value::from("WARNING")));
        // Defaulted flag is not an explicit value.
        assert_eq!(cli.get(LOG_PATH_PARAM), None);
    }

    #[test]
    fn test_builtin_clash_is_skipped() {
        let defaults = "config = \"x\"\nhours = 1\n";
        let schema = schema(defaults);
        let outcome = parse_args(
            &schema,
            defaults,
            &CliOptions::default(),
            ["prog", "--config", "site.params"],
        )
        .unwrap();
        let CliOutcome::Proceed(cli) = outcome else {
            panic!("expected Proceed");
        };
        assert_eq!(cli.config_path(), Some(Path::new("site.params")));
        assert_eq!(cli.get("config"), None);
        assert_eq!(cli.skipped_flags(), ["config".to_string()]);
    }

    #[test]
    fn test_param_flags_disabled() {
        let options = CliOptions {
            param_flags: false,
            ..Default::default()
        };
        let err = parse_args(&schema(DEFAULTS), DEFAULTS, &options, ["prog", "--debug"])
            .unwrap_err();
        assert!(matches!(err, ParamError::Usage(_)));
    }

    #[test]
    fn test_extra_args_come_back_in_matches() {
        let options = CliOptions {
            extra_args: vec![Arg::new("json").long("json").action(ArgAction::SetTrue)],
            ..Default::default()
        };
        let outcome =
            parse_args(&schema(DEFAULTS), DEFAULTS, &options, ["prog", "--json"]).unwrap();
        let CliOutcome::Proceed(cli) = outcome else {
            panic!("expected Proceed");
        };
        assert!(cli.matches().get_flag("json"));
    }

    #[test]
    fn test_build_command_is_valid() {
        build_command(&schema(DEFAULTS), &CliOptions::default()).debug_assert();
    }
}
