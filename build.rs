use std::process::Command;

fn main() {
    // Build timestamp (human readable) and a compact build id
    let now = chrono::Utc::now();
    println!(
        "cargo:rustc-env=USAGE_MONITOR_BUILD_TIME={}",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "cargo:rustc-env=USAGE_MONITOR_BUILD_ID={}",
        now.format("%Y%m%d%H%M%S")
    );

    println!("cargo:rerun-if-changed=.git/HEAD");

    let git_hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=USAGE_MONITOR_GIT_HASH={}", git_hash);
}
