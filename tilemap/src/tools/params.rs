use anyhow::{Result, ensure};
use tilemap_core::{MAX_PARAMS_LANGUAGE, PARAMS_INDEX_RANGE, RouteId, TileMapParams, TileMapType};

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	#[command(subcommand)]
	sub_command: ParamsCommands,
}

#[derive(clap::Subcommand, Debug)]
enum ParamsCommands {
	/// Print the fields of a tile address
	Decode(Decode),
	/// Build a tile address from its fields
	Encode(Encode),
}

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true)]
struct Decode {
	/// tile address, e.g. "G<B)"
	#[arg(required = true)]
	address: String,
}

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true)]
struct Encode {
	/// layer id
	#[arg(long)]
	layer: u32,

	/// detail level, 0 is the finest
	#[arg(long)]
	detail: u32,

	#[arg(long, allow_hyphen_values = true)]
	lat: i32,

	#[arg(long, allow_hyphen_values = true)]
	lon: i32,

	#[arg(long, default_value_t = 0)]
	importance: u32,

	/// address the string tile in this language instead of the data tile
	#[arg(long)]
	strings: Option<u32>,

	#[arg(long)]
	no_gzip: bool,

	#[arg(long, default_value_t = 0)]
	prefix: u32,

	/// route id as "<id>_<time>" in hex, required on the route layer
	#[arg(long)]
	route: Option<RouteId>,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let text = match &arguments.sub_command {
		ParamsCommands::Decode(args) => decode(args),
		ParamsCommands::Encode(args) => encode(args)?,
	};
	print!("{text}");
	Ok(())
}

fn decode(args: &Decode) -> String {
	let params = TileMapParams::from_string(&args.address);
	if !params.is_valid() {
		return format!("{:<11}{}\n{:<11}false\n", "address", args.address, "valid");
	}
	let map_type = match params.map_type() {
		TileMapType::Data => "data",
		TileMapType::Strings => "strings",
	};
	let route = params.route_id().map_or_else(|| String::from("-"), |id| id.to_string());
	[
		("address", params.to_string()),
		("valid", String::from("true")),
		("type", map_type.to_string()),
		("layer", params.layer().to_string()),
		("detail", params.detail_level().to_string()),
		("lat_idx", params.lat_idx().to_string()),
		("lon_idx", params.lon_idx().to_string()),
		("importance", params.importance().to_string()),
		("language", params.language().to_string()),
		("gzip", params.use_gzip().to_string()),
		("prefix", params.server_prefix().to_string()),
		("route", route),
	]
	.iter()
	.map(|(name, value)| format!("{name:<11}{value}\n"))
	.collect()
}

fn encode(args: &Encode) -> Result<String> {
	ensure!(args.layer < 16, "layer {} does not fit the address", args.layer);
	ensure!(args.detail < 16, "detail level {} does not fit the address", args.detail);
	ensure!(args.importance < 32, "importance {} does not fit the address", args.importance);
	ensure!(args.prefix < 32, "server prefix {} does not fit the address", args.prefix);
	ensure!(
		PARAMS_INDEX_RANGE.contains(&args.lat) && PARAMS_INDEX_RANGE.contains(&args.lon),
		"tile index {},{} does not fit the address",
		args.lat,
		args.lon
	);
	if let Some(language) = args.strings {
		ensure!(language <= MAX_PARAMS_LANGUAGE, "language {language} does not fit the address");
	}

	let mut params = TileMapParams::new_data(args.layer, args.detail, args.importance, args.lat, args.lon)
		.with_server_prefix(args.prefix)
		.with_gzip(!args.no_gzip);
	if let Some(route) = args.route {
		params = params.with_route_id(route);
	}
	if let Some(language) = args.strings {
		params = params.sibling(TileMapType::Strings, language);
	}
	Ok(format!("{params}\n"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tests::run_command;
	use pretty_assertions::assert_eq;
	use tilemap_core::{MAP_LAYER, ROUTE_LAYER};

	fn encoded(args: &Encode) -> String {
		encode(args).unwrap().trim_end().to_string()
	}

	fn fields(layer: u32) -> Encode {
		Encode {
			layer,
			detail: 2,
			lat: -3,
			lon: 4,
			importance: 1,
			strings: None,
			no_gzip: false,
			prefix: 0,
			route: None,
		}
	}

	#[test]
	fn encode_matches_the_library() {
		let text = encoded(&fields(MAP_LAYER));
		assert_eq!(text, TileMapParams::new_data(MAP_LAYER, 2, 1, -3, 4).to_string());

		let strings = encoded(&Encode {
			strings: Some(7),
			..fields(MAP_LAYER)
		});
		let decoded = TileMapParams::from_string(&strings);
		assert_eq!(decoded.map_type(), TileMapType::Strings);
		assert_eq!(decoded.language(), 7);
	}

	#[test]
	fn index_bounds_follow_the_address_field() {
		let edge = Encode {
			lat: -16_384,
			lon: 16_383,
			..fields(MAP_LAYER)
		};
		let decoded = TileMapParams::from_string(&encoded(&edge));
		assert!(decoded.is_valid());
		assert_eq!((decoded.lat_idx(), decoded.lon_idx()), (-16_384, 16_383));
		assert!(encode(&Encode { lon: 16_384, ..edge }).is_err());
	}

	#[test]
	fn decode_lists_the_fields() {
		let text = encoded(&Encode {
			route: Some(RouteId::new(0x1A, 0x2B)),
			prefix: 5,
			..fields(ROUTE_LAYER)
		});
		let output = decode(&Decode { address: text });
		let lines: Vec<&str> = output.lines().skip(1).collect();
		assert_eq!(
			lines,
			vec![
				"valid      true",
				"type       data",
				"layer      1",
				"detail     2",
				"lat_idx    -3",
				"lon_idx    4",
				"importance 1",
				"language   0",
				"gzip       true",
				"prefix     5",
				"route      1A_2B",
			]
		);
	}

	#[test]
	fn invalid_input() {
		assert!(decode(&Decode { address: "Gxyz?".into() }).ends_with("valid      false\n"));
		assert!(encode(&Encode { detail: 16, ..fields(MAP_LAYER) }).is_err());
	}

	#[test]
	fn command_line() {
		run_command(vec!["tilemap", "params", "encode", "--layer", "0", "--detail", "3", "--lat", "-7", "--lon", "9"]).unwrap();
		run_command(vec!["tilemap", "params", "decode", "G!"]).unwrap();
		assert!(run_command(vec!["tilemap", "params", "encode", "--layer", "0"]).is_err());
	}
}
