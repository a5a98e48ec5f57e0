use serde_json::json;

use crate::config::Config;
use crate::error::LifelockError;
use crate::output;
use crate::service;

pub fn run(json_output: bool) -> i32 {
    output::finish(run_inner(json_output), json_output)
}

fn run_inner(json_output: bool) -> Result<i32, LifelockError> {
    // File settings only: environment overrides are not persisted.
    let config = Config::read(&Config::resolve_data_dir()?)?;
    let existed = config.is_initialized();
    let path = service::init_storage(&config)?;

    if json_output {
        output::print_json(&output::json::success(json!({
            "path": path.to_string_lossy(),
            "data_dir": config.data_dir.to_string_lossy(),
            "created": !existed
        })));
    } else if existed {
        println!("lifelock already initialized at {}", config.data_dir.display());
    } else {
        println!("Initialized lifelock at {}", config.data_dir.display());
    }
    Ok(0)
}
