// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::Path;

use config::{Config, Environment, File};

mod engine;
mod error;

pub use engine::EngineConfig;
pub use error::ConfigError;

/// Prefix for environment variable overrides, e.g. `CHAMBERLIN_REFERENCE_FREQUENCY=432`.
const ENV_PREFIX: &str = "CHAMBERLIN";

/// Loads the engine configuration from an optional YAML file, applying environment overrides
/// on top. Missing values fall back to their defaults.
pub fn load(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    load_with_environment(path, Environment::with_prefix(ENV_PREFIX))
}

fn load_with_environment(
    path: Option<&Path>,
    environment: Environment,
) -> Result<EngineConfig, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }

    let config: EngineConfig = builder
        .add_source(environment.try_parsing(true))
        .build()?
        .try_deserialize()?;
    config.validate()?;
    Ok(config)
}
