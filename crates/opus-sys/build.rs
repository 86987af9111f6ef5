// SPDX-License-Identifier: MPL-2.0
#[cfg(feature = "static")]
use std::path::{Path, PathBuf};

#[cfg(feature = "static")]
fn get_libopus_dir() -> PathBuf {
	match std::env::var("LIBOPUS_SRC").map(PathBuf::from) {
		Ok(dir) if dir.exists() => return dir,
		Ok(dir) => panic!(
			"given LIBOPUS_SRC directory ({}) does not exist!",
			dir.display()
		),
		_ => {}
	}
	match std::env::var("CARGO_MANIFEST_DIR")
		.map(PathBuf::from)
		.map(|path| path.join("libopus"))
	{
		Ok(dir) if dir.exists() => dir,
		Ok(dir) => panic!(
			"libopus source directory ({}) doesn't exist! set LIBOPUS_SRC or disable the `static` feature",
			dir.display()
		),
		_ => panic!("CARGO_MANIFEST_DIR not set!"),
	}
}

#[cfg(feature = "static")]
fn build_opus_with_cmake(libopus_dir: &Path) -> PathBuf {
	println!(
		"cargo:warning=Building bundled libopus from {} with cmake.",
		libopus_dir.display()
	);
	cmake::Config::new(libopus_dir)
		.define(
			"OPUS_DRED",
			std::env::var("CARGO_FEATURE_DRED")
				.map(|_| "True")
				.unwrap_or("False"),
		)
		.define("OPUS_BUILD_TESTING", "False")
		.define("OPUS_BUILD_PROGRAMS", "False")
		.build()
}

#[cfg(feature = "static")]
fn link_opus(libopus_build_dir: &Path) {
	println!("cargo:rustc-link-lib=static=opus");
	println!(
		"cargo:rustc-link-search=native={}",
		libopus_build_dir.join("lib").display()
	);
	// Some distributions install into lib64.
	println!(
		"cargo:rustc-link-search=native={}",
		libopus_build_dir.join("lib64").display()
	);
}

fn main() {
	println!("cargo:rerun-if-changed=build.rs");
	println!("cargo:rerun-if-env-changed=LIBOPUS_SRC");
	#[cfg(feature = "static")]
	{
		let libopus_dir = get_libopus_dir();
		println!("cargo:rerun-if-changed={}", libopus_dir.join("include").display());
		println!("cargo:rerun-if-changed={}", libopus_dir.join("src").display());
		let build_dir = build_opus_with_cmake(&libopus_dir);
		link_opus(&build_dir);
	}
}
