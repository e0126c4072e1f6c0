//! Layering guardrails to keep the resolution core independent of the host.
//!
//! `iovis_core` must stay embeddable in any host runner: no CLI, no configuration formats, no subscriber setup.
//! This test scans its `Cargo.toml` and fails if a host-only crate appears in `[dependencies]`.

const HOST_ONLY: &[&str] = &["clap", "serde", "serde_json", "toml", "tracing-subscriber", "tempfile", "iovis"];

#[test]
fn core_does_not_depend_on_host_crates() {
    let manifest = include_str!("../crates/iovis_core/Cargo.toml");
    let mut in_dependencies = false;

    for raw_line in manifest.lines() {
        let line = raw_line.trim();
        // Track when we enter/exit the `[dependencies]` table.
        if line.starts_with('[') {
            if line == "[dependencies]" {
                in_dependencies = true;
                continue;
            }
            if in_dependencies {
                break;
            }
        }

        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }

        let name = line.split(['=', ' ']).next().unwrap_or("").trim();
        if HOST_ONLY.contains(&name) {
            panic!("`{name}` must not appear in iovis_core's [dependencies]");
        }
    }
}
