// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("uareg - OPC UA application and endpoint registry");
    println!();
    println!("Version Information:");
    println!("  uareg-bin:      {}", crate::VERSION);
    println!("  uareg-core:     {}", uareg_core::VERSION);
    println!("  uareg-opcua:    {}", uareg_opcua::VERSION);
    println!("  uareg-registry: {}", uareg_registry::VERSION);
    println!("  uareg-config:   {}", uareg_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("Features:");
    println!(
        "  OPC UA transport: {}",
        if cfg!(feature = "real-transport") { "enabled" } else { "disabled" }
    );
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
