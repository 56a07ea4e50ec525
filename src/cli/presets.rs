use crate::domain::presets::PresetCatalog;

use super::CommandError;
use super::print::print_json;

pub fn handle() -> Result<(), CommandError> {
    let catalog = PresetCatalog::builtin();
    print_json(catalog.presets())
}
