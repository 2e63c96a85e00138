use std::env;
use std::process::Command;

/// Short revision of the source tree. Image builds without a `.git`
/// directory pass it in through `OVNSCOPE_GIT_SHA`.
fn git_sha() -> String {
    if let Ok(sha) = env::var("OVNSCOPE_GIT_SHA")
        && !sha.trim().is_empty()
    {
        return sha.trim().to_string();
    }

    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".into())
}

fn main() {
    println!("cargo:rustc-env=GIT_SHA={}", git_sha());

    println!("cargo:rerun-if-env-changed=OVNSCOPE_GIT_SHA");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/refs/");
}
