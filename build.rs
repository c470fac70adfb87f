use anyhow::*;
use fs_extra::copy_items;
use fs_extra::dir::CopyOptions;
use std::env;
use std::path::PathBuf;

/// Bundles `assets/` into the build directory and points the binary at it.
fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=assets");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    if !manifest_dir.join("assets").exists() {
        return Ok(());
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let mut copy_options = CopyOptions::new();
    copy_options.overwrite = true;
    copy_items(&[manifest_dir.join("assets")], &out_dir, &copy_options)?;

    println!(
        "cargo:rustc-env=SNOW_GLOBE_BUNDLED_ASSETS={}",
        out_dir.join("assets").display()
    );
    Ok(())
}
