#![cfg(feature = "cli")]

use assert_cmd::{Command, cargo};
use assert_fs::TempDir;
use predicates::{prelude::PredicateBooleanExt, str};
use rstest::rstest;
use tilemap_core::{MAP_LAYER, MockDesc, TileMapParams};

#[cfg(windows)]
const BINARY_NAME: &str = "tilemap.exe";
#[cfg(not(windows))]
const BINARY_NAME: &str = "tilemap";

fn tilemap_cmd() -> Command {
	Command::new(cargo::cargo_bin!())
}

#[test]
fn command() -> Result<(), Box<dyn std::error::Error>> {
	tilemap_cmd()
		.assert()
		.failure()
		.code(2)
		.stdout(str::is_empty())
		.stderr(str::contains(format!("Usage: {BINARY_NAME} [OPTIONS] <COMMAND>")));
	Ok(())
}

#[rstest]
#[case("params", "[OPTIONS] <COMMAND>")]
#[case("params decode", "[OPTIONS] <ADDRESS>")]
#[case("desc", "[OPTIONS] <FILENAME>")]
#[case("tile", "[OPTIONS] <DESC> <ADDRESS> <FILENAME>")]
#[case("cover", "[OPTIONS] --bbox <BBOX> <DESC>")]
fn subcommand(#[case] sub_command: &str, #[case] usage: &str) -> Result<(), Box<dyn std::error::Error>> {
	tilemap_cmd()
		.args(sub_command.split(' '))
		.assert()
		.failure()
		.code(2)
		.stdout(str::is_empty())
		.stderr(str::contains(format!("Usage: {BINARY_NAME} {sub_command} {usage}")));
	Ok(())
}

#[test]
fn params_round_trip() -> Result<(), Box<dyn std::error::Error>> {
	let address = TileMapParams::new_data(MAP_LAYER, 4, 2, -12, 40).to_string();
	tilemap_cmd()
		.args(["params", "encode", "--layer", "0", "--detail", "4", "--importance", "2", "--lat", "-12", "--lon", "40"])
		.assert()
		.success()
		.stdout(format!("{address}\n"));
	tilemap_cmd()
		.args(["params", "decode", &address])
		.assert()
		.success()
		.stdout(str::contains("lat_idx    -12\n").and(str::contains("lon_idx    40\n")));
	Ok(())
}

#[test]
fn desc_summary() -> Result<(), Box<dyn std::error::Error>> {
	let dir = TempDir::new()?;
	let path = dir.path().join("desc.bin");
	MockDesc::default().build().save()?.save_to_file(&path)?;
	tilemap_cmd()
		.args(["desc", path.to_str().unwrap()])
		.assert()
		.success()
		.stdout(str::starts_with("server prefix: 3\n").and(str::contains("©2010 Mock Maps")));
	Ok(())
}
