use serde::Serialize;

use super::CommandError;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CommandError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| CommandError::Output(e.to_string()))?;
    println!("{out}");
    Ok(())
}
