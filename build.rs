// Copyright (c) 2025 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::Command;

fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    // the built crate only provides git information with the git2 feature
    write_git_info(git_describe(), git_dirty());

    println!("cargo:rerun-if-changed=.git/HEAD");
}

fn git_describe() -> Option<String> {
    if let Ok(output) = Command::new("git")
        .args(["describe", "--match", "v[0-9]*", "--tags", "HEAD"])
        .output()
        && output.status.success()
        && let Ok(version) = String::from_utf8(output.stdout)
    {
        return Some(version.trim().trim_start_matches('v').to_string());
    }

    // no release tag: short commit hash only
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        && output.status.success()
        && let Ok(commit) = String::from_utf8(output.stdout)
    {
        return Some(commit.trim().to_string());
    }

    None
}

fn git_dirty() -> bool {
    Command::new("git")
        .args(["diff-index", "--name-only", "HEAD", "--"])
        .output()
        .map(|output| output.status.success() && !output.stdout.is_empty())
        .unwrap_or_default()
}

fn write_git_info(git_version: Option<String>, git_dirty: bool) {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let dest_path = Path::new(&out_dir).join("git_built.rs");
    let mut f = File::create(dest_path).expect("Failed to create git_built.rs");

    let version = match git_version {
        Some(v) => format!("Some(\"{v}\")"),
        None => "None".to_string(),
    };
    let dirty = if git_dirty { "Some(true)" } else { "None" };

    writeln!(f, "// Git information generated at build time").unwrap();
    writeln!(f, "pub const GIT_VERSION: Option<&'static str> = {version};").unwrap();
    writeln!(f, "pub const GIT_DIRTY: Option<bool> = {dirty};").unwrap();
}
