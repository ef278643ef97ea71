//! One-call startup for binaries.
//!
//! ```no_run
//! use paramstack::ParamStack;
//!
//! let params = ParamStack::new("model = \"GFS3\"\nforecast_hours = 24\n")
//!     .about("Forecast downloader")
//!     .init();
//! let hours = params.get_int("forecast_hours");
//! ```

use crate::cli::{self, CliOptions, CliOutcome, CliValues};
use crate::config::UnknownKeyPolicy;
use crate::engine::{Engine, EngineOptions};
use crate::error::{ParamError, Result};
use crate::logging::{LogSettings, init_logging};
use crate::resolved::Resolved;
use crate::script::ScriptEnv;
use clap::Arg;
use std::ffi::OsString;
use tracing::{debug, warn};

/// Startup builder: default source plus engine and CLI options.
#[derive(Debug, Clone)]
pub struct ParamStack {
    defaults: String,
    engine: EngineOptions,
    cli: CliOptions,
}

/// Result of [`ParamStack::parse_from`].
#[derive(Debug)]
pub enum Startup {
    Ready(Ready),
    /// Print `text` to stdout and terminate with `code`.
    Exit { text: String, code: i32 },
}

#[derive(Debug)]
pub struct Ready {
    pub resolved: Resolved,
    pub cli: CliValues,
}

impl ParamStack {
    pub fn new(defaults: impl Into<String>) -> Self {
        Self {
            defaults: defaults.into(),
            engine: EngineOptions::default(),
            cli: CliOptions::default(),
        }
    }

    pub fn policy(mut self, policy: UnknownKeyPolicy) -> Self {
        self.engine.policy = policy;
        self
    }

    /// Shorthand for [`UnknownKeyPolicy::Lenient`] when `allow` is true.
    pub fn allow_extra_parameters(self, allow: bool) -> Self {
        let policy = if allow {
            UnknownKeyPolicy::Lenient
        } else {
            UnknownKeyPolicy::Strict
        };
        self.policy(policy)
    }

    pub fn env(mut self, env: ScriptEnv) -> Self {
        self.engine.env = env;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.cli.name = name.into();
        self
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.cli.about = Some(about.into());
        self
    }

    pub fn param_flags(mut self, enabled: bool) -> Self {
        self.cli.param_flags = enabled;
        self
    }

    pub fn logging_flags(mut self, enabled: bool) -> Self {
        self.cli.logging_flags = enabled;
        self
    }

    /// Add a caller-defined argument.
    pub fn arg(mut self, arg: Arg) -> Self {
        self.cli.extra_args.push(arg);
        self
    }

    pub fn defaults(&self) -> &str {
        &self.defaults
    }

    /// Resolve against `args` (including the program name). Does not
    /// touch logging or the process.
    pub fn parse_from<I, T>(&self, args: I) -> Result<Startup>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let engine = Engine::new(&self.defaults, self.engine.clone())?;
        let cli = match cli::parse_args(engine.schema(), &self.defaults, &self.cli, args)? {
            CliOutcome::Proceed(cli) => cli,
            CliOutcome::PrintAndExit { text, code } => {
                return Ok(Startup::Exit { text, code });
            }
        };
        let resolved = engine.resolve(&cli)?;
        Ok(Startup::Ready(Ready { resolved, cli }))
    }

    /// Like [`init`](Self::init) but also returns the command-line values,
    /// for callers with extra arguments.
    pub fn init_with_cli(&self) -> (Resolved, CliValues) {
        let ready = match self.parse_from(std::env::args_os()) {
            Ok(Startup::Ready(ready)) => ready,
            Ok(Startup::Exit { text, code }) => {
                print!("{}", text);
                std::process::exit(code);
            }
            Err(err) => fail(err),
        };

        let settings = match LogSettings::from_resolved(&ready.resolved, &ready.cli) {
            Ok(settings) => settings,
            Err(err) => fail(err),
        };
        if let Err(err) = init_logging(&settings) {
            eprintln!("\nERROR: cannot initialize logging: {:#}\n", err);
            std::process::exit(1);
        }
        report_deferred(&ready);
        debug!(level = settings.level.as_str(), "Parameters resolved");
        (ready.resolved, ready.cli)
    }

    /// Resolve from the process arguments, install logging and return the
    /// parameters. Prints a diagnostic and exits on any failure.
    pub fn init(&self) -> Resolved {
        self.init_with_cli().0
    }
}

/// Warnings raised while resolving, before a subscriber was installed.
fn report_deferred(ready: &Ready) {
    let path = ready
        .cli
        .config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    for key in ready.resolved.extras() {
        warn!(key = %key, path = %path, "Admitting parameter not declared in defaults");
    }
    for name in ready.cli.skipped_flags() {
        warn!(param = %name, "Parameter flag clashes with a built-in flag, skipping");
    }
}

fn fail(err: ParamError) -> ! {
    match err {
        ParamError::Usage(err) => err.exit(),
        err => {
            eprintln!("\nERROR: {}\n", err);
            std::process::exit(err.exit_code());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(defaults: &str) -> ParamStack {
        ParamStack::new(defaults).env(ScriptEnv::empty())
    }

    fn ready(stack: &ParamStack, args: &[&str]) -> Ready {
        let mut argv = vec!["prog"];
        argv.extend_from_slice(args);
        match stack.parse_from(argv).unwrap() {
            Startup::Ready(ready) => ready,
            Startup::Exit { .. } => panic!("unexpected exit"),
        }
    }

    #[test]
    fn test_parse_from_resolves() {
        let stack = stack("hours = 24\ndebug = false\n");
        let ready = ready(&stack, &["--hours", "6", "--debug"]);
        assert_eq!(ready.resolved.get_int("hours"), Some(6));
        assert_eq!(ready.resolved.get_bool("debug"), Some(true));
    }

    #[test]
    fn test_print_params_exits_with_one() {
        let stack = stack("hours = 24\n");
        match stack.parse_from(["prog", "--print-params"]).unwrap() {
            Startup::Exit { text, code } => {
                assert_eq!(text, "hours = 24\n");
                assert_eq!(code, 1);
            }
            Startup::Ready(_) => panic!("expected exit"),
        }
    }

    #[test]
    fn test_bad_defaults_fail_before_parsing() {
        let err = stack("hours = ").parse_from(["prog"]).unwrap_err();
        assert!(matches!(err, ParamError::SchemaExecution { .. }));
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn captured_warnings(ready: &Ready) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || report_deferred(ready));
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_lenient_extras_are_reported_once_logging_is_up() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("x.params");
        std::fs::write(&path, "foo = \"bar\"\n").unwrap();
        let stack = stack("hours = 24\n").allow_extra_parameters(true);
        let ready = ready(&stack, &["-c", path.to_str().unwrap()]);

        let out = captured_warnings(&ready);
        assert!(out.contains("Admitting parameter not declared in defaults"), "{out}");
        assert!(out.contains("foo"), "{out}");
        assert!(out.contains(path.to_str().unwrap()), "{out}");
    }

    #[test]
    fn test_skipped_flags_are_reported_once_logging_is_up() {
        let stack = stack("help = \"x\"\nhours = 24\n");
        let ready = ready(&stack, &[]);
        let out = captured_warnings(&ready);
        assert!(out.contains("clashes with a built-in flag"), "{out}");
        assert!(out.contains("help"), "{out}");
    }

    #[test]
    fn test_nothing_reported_for_clean_run() {
        let stack = stack("hours = 24\n");
        let ready = ready(&stack, &["--hours", "6"]);
        assert_eq!(captured_warnings(&ready), "");
    }

    #[test]
    fn test_allow_extra_parameters() {
        let stack = stack("hours = 24\n").allow_extra_parameters(true);
        assert_eq!(stack.engine.policy, UnknownKeyPolicy::Lenient);
        let stack = stack.allow_extra_parameters(false);
        assert_eq!(stack.engine.policy, UnknownKeyPolicy::Strict);
    }

    #[test]
    fn test_extra_arg_reaches_caller() {
        let stack = stack("hours = 24\n").arg(
            Arg::new("json")
                .long("json")
                .action(clap::ArgAction::SetTrue),
        );
        let ready = ready(&stack, &["--json"]);
        assert!(ready.cli.matches().get_flag("json"));
    }
}
