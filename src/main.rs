//! Forecast download parameters.
//!
//! Resolves the forecast-model parameters from the built-in defaults, an
//! optional `--config` file and the command line, then prints them.

use anyhow::Result;
use clap::{Arg, ArgAction};
use paramstack::ParamStack;
use tracing::info;

const DEFAULTS: &str = r#"# possible values: GFS3, GFS4 or GFS5
model = "GFS3"
expected_file_size = 10e+7
forecast_hours = 24
debug = false
email = "forecast@example.com"
data_dir = join(env("HOME", "/tmp"), "data")
out_file = join(data_dir, "forecast_" + now("%Y%m%d") + ".grb")

when model == "GFS4" {
    expected_file_size = 15e+7
    forecast_hours = 36
}

when model == "GFS5" {
    expected_file_size = 20e+7
    forecast_hours = 48
}
"#;

fn main() -> Result<()> {
    let (mut params, cli) = ParamStack::new(DEFAULTS)
        .about("Resolve forecast download parameters")
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print parameters as JSON"),
        )
        .init_with_cli();

    for (key, value) in params.iter() {
        info!(param = key, value = %value, "Resolved parameter");
    }

    let data_dir = params.get_str("data_dir").unwrap_or("/tmp").to_string();
    params.insert_derived("_raw_dir", format!("{}/raw", data_dir))?;

    if cli.matches().get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&params.to_json())?);
    } else {
        print!("{}", params.params_string());
    }
    Ok(())
}
