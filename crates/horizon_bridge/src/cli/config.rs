//! `horizon-bridge config`: show resolved paths.

use anyhow::Result;
use horizon_bridge::BridgePaths;
use std::path::Path;

pub fn run(paths: &BridgePaths, json: bool) -> Result<()> {
    let entries: [(&str, &Path); 7] = [
        ("root", &paths.root),
        ("outbox", &paths.outbox),
        ("claims", &paths.claims),
        ("queue", &paths.queue),
        ("state", &paths.state),
        ("telemetry", &paths.telemetry),
        ("logs", &paths.logs),
    ];

    if json {
        let mut config = serde_json::Map::new();
        for (name, path) in entries {
            config.insert(
                name.to_string(),
                serde_json::json!({
                    "path": path.to_string_lossy(),
                    "exists": path.exists(),
                }),
            );
        }
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!("HORIZON BRIDGE CONFIGURATION");
        println!("============================");
        println!();
        for (name, path) in entries {
            let marker = if path.exists() { "" } else { "  (missing)" };
            println!("{:<10} {}{}", format!("{}:", name), path.display(), marker);
        }
    }

    Ok(())
}
