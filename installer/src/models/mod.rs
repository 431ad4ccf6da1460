// Data model shared by the installer engine
//
// - `project`: discovered versions, sub-versions and SQL files
// - `parameters`: per-environment parameter maps
// - `settings`: installer configuration (file + environment)

pub mod parameters;
pub mod project;
pub mod settings;
