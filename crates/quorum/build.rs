//! Generates the bridge contract from the `#[bridge_api]` traits in `src/api`.

use quorum_contract::{ContractError, ContractGenerator};
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    let manifest_dir = PathBuf::from(std::env::var_os("CARGO_MANIFEST_DIR").unwrap_or_default());
    let out_dir = PathBuf::from(std::env::var_os("OUT_DIR").unwrap_or_default());
    let api_dir = manifest_dir.join("src").join("api");

    println!("cargo:rerun-if-changed={}", api_dir.display());

    if let Err(err) = generate(&api_dir, &out_dir.join("bridge_contract.rs")) {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn generate(api_dir: &Path, out: &Path) -> Result<(), ContractError> {
    let mut generator = ContractGenerator::new();
    generator.scan_dir(api_dir)?;
    generator.build()?.write_to(out)?;
    Ok(())
}
