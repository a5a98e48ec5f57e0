pub mod json;
pub mod text;

use serde_json::Value;

use crate::error::LifelockError;

pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(_) => println!("{value}"),
    }
}

/// Exit code for a command result, printing the error in the requested format.
pub fn finish(result: Result<i32, LifelockError>, json_output: bool) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            if json_output {
                print_json(&json::error(&e));
            } else {
                eprintln!("Error: {}", e.message);
            }
            1
        }
    }
}
