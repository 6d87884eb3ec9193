// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmpix validate` command - Validate configuration file.

use shmpix_core::ConfigLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            let connection = &config.connection;
            println!("✓ Configuration is valid");
            println!();
            println!("Connection Settings:");
            println!("  Max Side:           {} px", connection.max_side);
            println!("  Max Segment Size:   {} bytes", connection.max_segment_bytes);
            println!("  Segment Prefix:     {}", connection.segment_prefix);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
