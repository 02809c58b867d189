use std::process::Command;

use anyhow::{Context, Result};

/// Layered crates, innermost first. Each must compile on its own.
const CRATES: &[&str] = &["callstats-domain", "callstats-core", "callstats-infra"];

/// Check every crate in isolation so a layer never leans on a sibling's
/// dependencies.
pub fn check_crates() -> Result<()> {
    println!("Checking {} callstats crates in isolation...", CRATES.len());

    for (index, name) in CRATES.iter().enumerate() {
        println!("\n[{}/{}] cargo check -p {name} --all-targets", index + 1, CRATES.len());

        let status = Command::new("cargo")
            .args(["check", "-p", name, "--all-targets"])
            .status()
            .with_context(|| format!("Failed to run cargo check for '{name}'"))?;

        if !status.success() {
            anyhow::bail!("Crate '{name}' failed to compile on its own");
        }

        println!("✅ {name} compiled successfully");
    }

    println!("\n✅ All {} crates compile in isolation!", CRATES.len());

    Ok(())
}
