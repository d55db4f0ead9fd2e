// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `model-freeze config` command: print the effective configuration.

use freezer::FreezeConfig;

pub fn execute(config: &FreezeConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
