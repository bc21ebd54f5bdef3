use super::desc::load_desc;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use std::path::PathBuf;
use tilemap_core::{Blob, FeatureArg, Mc2Coord, TileMap, TileMapParams, TileMapType};

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// format description the tile was encoded with
	#[arg(required = true)]
	desc: PathBuf,

	/// address of the tile; the buffer does not carry it
	#[arg(required = true)]
	address: String,

	/// tile buffer, gzipped or plain
	#[arg(required = true)]
	filename: PathBuf,

	/// also list the coordinates of every feature
	#[arg(long, short)]
	coords: bool,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let desc = load_desc(&arguments.desc)?;
	let params = TileMapParams::from_string(&arguments.address);
	ensure!(params.is_valid(), "{:?} is not a tile address", arguments.address);
	let blob = Blob::load_from_file(&arguments.filename)
		.with_context(|| format!("reading {}", arguments.filename.display()))?;
	let tile = TileMap::load(&blob, &desc, &params)?;
	print!("{}", report(&tile, arguments.coords));
	Ok(())
}

fn format_coord(coord: &Mc2Coord) -> String {
	format!("{},{}", coord.lat, coord.lon)
}

fn format_arg(arg: &FeatureArg, tile: &TileMap, with_coords: bool) -> String {
	match arg {
		FeatureArg::Simple { name, values, .. } => format!("{name}={}", values.iter().join("/")),
		FeatureArg::Text { name, values } => format!("{name}={:?}", values.iter().join("/")),
		FeatureArg::Coord { name, coord } => format!("{name}=({})", format_coord(coord)),
		FeatureArg::Coords { name, range, .. } => {
			let points = &tile.coords()[range.clone()];
			if with_coords {
				format!("{name}=[{}]", points.iter().map(format_coord).join(" "))
			} else {
				format!("{name}=[{} points]", points.len())
			}
		}
	}
}

fn report(tile: &TileMap, with_coords: bool) -> String {
	let params = tile.params();
	let crc = tile.crc().map_or_else(|| String::from("-"), |crc| format!("{crc:08X}"));
	let mut lines = vec![
		format!("tile {params}: layer {} detail {} at {},{}", params.layer(), params.detail_level(), params.lat_idx(), params.lon_idx()),
		format!("crc {crc}, {} bytes unpacked", tile.load_size()),
	];

	match params.map_type() {
		TileMapType::Data => {
			lines.push(format!("{} features:", tile.features().len()));
			lines.extend(tile.features().iter().map(|feature| {
				let args = feature.args.iter().map(|arg| format_arg(arg, tile, with_coords)).join(" ");
				format!("  {:>4} type {:<3} {args}", feature.feature_nbr, feature.feature_type)
			}));
		}
		TileMapType::Strings => {
			lines.push(format!("{} strings for {} features:", tile.strings().len(), tile.features_in_text_order().len()));
			lines.extend(tile.features_in_text_order().iter().map(|&feature_idx| {
				let text = tile.string_for_feature(feature_idx as usize).unwrap_or_default();
				let category = tile
					.category_of(feature_idx)
					.map_or_else(String::new, |id| format!(" category {id}"));
				let extended = tile
					.extended_strings_for(feature_idx)
					.map(|s| format!(" [{}] {:?}", s.string_type, s.text))
					.join("");
				format!("  {feature_idx:>4} {text:?}{category}{extended}")
			}));
		}
	}

	lines.into_iter().map(|line| line + "\n").collect()
}
