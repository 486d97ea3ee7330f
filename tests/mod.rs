
use std::path::PathBuf;
use std::sync::LazyLock;

use assert_cmd::Command;

/// Get a command to run the given workspace binary.
///
/// Automatically builds workspace binaries if needed (once per process).
pub fn tool(name: &str) -> Command {
    // Build workspace binaries (once per process). Cargo is fast when nothing
    // needs rebuilding and handles concurrent invocations gracefully.
    static BUILD_ONCE: LazyLock<()> = LazyLock::new(|| {
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let workspace_root = manifest_dir.parent().expect("tests dir has no parent");

        let status = std::process::Command::new("cargo")
            .args(["build", "--workspace", "--bins"])
            .current_dir(workspace_root)
            .status()
            .expect("Failed to run cargo build");
        assert!(status.success(), "cargo build --workspace --bins failed");
    });
    *BUILD_ONCE; // dereference to trigger the one-time build

    let workspace_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("tests dir has no parent")
        .to_path_buf();

    let target_dir = std::env::var("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| workspace_root.join("target"));

    let path = target_dir.join("debug").join(name);
    Command::new(&path)
}
