use super::desc::load_desc;
use anyhow::Result;
use enumset::EnumSet;
use itertools::Itertools;
use std::path::PathBuf;
use tilemap_core::{Layer, Mc2BBox, ParamsSignature, RouteId, TileMapFormatDesc, TileMapParams, ViewRequest};

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// format description to generate addresses for
	#[arg(required = true)]
	desc: PathBuf,

	/// viewport in degrees: min_lat,min_lon,max_lat,max_lon
	#[arg(long, value_parser = parse_bbox, allow_hyphen_values = true, required = true)]
	bbox: Mc2BBox,

	/// meters per pixel
	#[arg(long, default_value_t = 10)]
	scale: u32,

	/// comma separated layers, e.g. "map,poi"
	#[arg(long, value_delimiter = ',', value_parser = parse_layer, default_value = "map")]
	layers: Vec<Layer>,

	#[arg(long, default_value_t = 0)]
	language: u32,

	/// use this detail level for every layer instead of deriving it from the scale
	#[arg(long)]
	detail: Option<u32>,

	/// route id as "<id>_<time>" in hex, needed for the route layer
	#[arg(long)]
	route: Option<RouteId>,

	/// also list the reserve tiles around the center
	#[arg(long)]
	reserve: bool,
}

fn parse_layer(text: &str) -> Result<Layer, String> {
	EnumSet::<Layer>::all()
		.iter()
		.find(|layer| layer.as_str() == text)
		.ok_or_else(|| format!("unknown layer {text:?}, expected one of {}", EnumSet::<Layer>::all().iter().join(", ")))
}

fn parse_bbox(text: &str) -> Result<Mc2BBox, String> {
	let values = text
		.split(',')
		.map(|part| part.trim().parse::<f64>().map_err(|e| format!("{part:?}: {e}")))
		.collect::<Result<Vec<f64>, String>>()?;
	match values[..] {
		[min_lat, min_lon, max_lat, max_lon] => Ok(Mc2BBox::from_degrees(min_lat, min_lon, max_lat, max_lon)),
		_ => Err(format!("expected four comma separated values, got {}", values.len())),
	}
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let desc = load_desc(&arguments.desc)?;
	let view = view_request(arguments);
	print!("{}", report(&desc, &view, arguments.reserve));
	Ok(())
}

fn view_request(arguments: &Subcommand) -> ViewRequest {
	ViewRequest {
		bbox: arguments.bbox,
		center: arguments.bbox.center(),
		scale: arguments.scale,
		use_gzip: true,
		language: arguments.language,
		layers: arguments.layers.iter().copied().collect(),
		route_id: arguments.route,
		detail_level: arguments.detail,
	}
}

fn report(desc: &TileMapFormatDesc, view: &ViewRequest, with_reserve: bool) -> String {
	let mut signature = ParamsSignature::new();
	let Some(generated) = desc.create_params(&mut signature, view) else {
		return String::from("no tiles\n");
	};

	let mut lines = Vec::new();
	for notice in signature.values() {
		lines.push(format!(
			"layer {} detail {}: lat {}..={} lon {}..={}, {} tiles x {} importances",
			notice.layer_id,
			notice.detail_level,
			notice.start_lat_idx,
			notice.end_lat_idx,
			notice.start_lon_idx,
			notice.end_lon_idx,
			notice.nbr_tiles(),
			notice.nbr_importances,
		));
	}
	lines.push(format!("{} addresses:", generated.params.len()));
	lines.extend(generated.params.iter().map(TileMapParams::to_string));
	if with_reserve {
		lines.push(format!("{} reserve addresses:", generated.reserve.len()));
		lines.extend(generated.reserve.iter().map(TileMapParams::to_string));
	}
	lines.into_iter().map(|line| line + "\n").collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{tests::run_command, tools::test_utils::Fixture};
	use pretty_assertions::assert_eq;
	use tilemap_core::{MockDesc, TileMapType};

	fn view(layers: EnumSet<Layer>) -> ViewRequest {
		let bbox = Mc2BBox::new(10, 10, 200_000, 200_000).unwrap();
		ViewRequest {
			bbox,
			center: bbox.center(),
			scale: 1,
			use_gzip: true,
			language: 5,
			layers,
			route_id: None,
			detail_level: None,
		}
	}

	#[test]
	fn lists_the_generated_addresses() {
		let desc = MockDesc::default().build();
		let view = view(Layer::Map | Layer::Poi);
		let mut signature = ParamsSignature::new();
		let expected = desc.create_params(&mut signature, &view).unwrap();

		let text = report(&desc, &view, true);
		let lines: Vec<&str> = text.lines().collect();
		assert_eq!(lines[0].split(':').next(), Some("layer 0 detail 0"));
		assert_eq!(lines[1].split(':').next(), Some("layer 2 detail 0"));
		assert_eq!(lines[2], format!("{} addresses:", expected.params.len()));

		let listed: Vec<TileMapParams> = lines[3..3 + expected.params.len()]
			.iter()
			.map(|line| TileMapParams::from_string(line))
			.collect();
		assert_eq!(listed, expected.params);
		assert!(listed.iter().any(|p| p.map_type() == TileMapType::Strings && p.language() == 5));
		assert_eq!(text.lines().count(), 4 + expected.params.len() + expected.reserve.len());
	}

	#[test]
	fn route_layer_needs_a_route() {
		let desc = MockDesc::default().build();
		assert_eq!(report(&desc, &view(EnumSet::only(Layer::Route)), false), "no tiles\n");
	}

	#[test]
	fn bbox_in_degrees() {
		let bbox = parse_bbox("1, -2,0.5,3").unwrap();
		assert_eq!(bbox, Mc2BBox::from_degrees(0.5, -2.0, 1.0, 3.0));
		assert!(parse_bbox("1,2,3").unwrap_err().contains("four"));
		assert!(parse_bbox("1,2,x,4").is_err());
	}

	#[test]
	fn layer_names() {
		assert_eq!(parse_layer("poi"), Ok(Layer::Poi));
		assert!(parse_layer("roads").unwrap_err().contains("map, route, poi"));
	}

	#[test]
	fn command_line() -> Result<()> {
		let fixture = Fixture::new()?;
		let desc = fixture.desc_path.to_str().unwrap();
		run_command(vec![
			"tilemap", "cover", desc, "--bbox", "52.5,13.3,52.6,13.5", "--layers", "map,poi", "--reserve",
		])?;
		run_command(vec!["tilemap", "cover", desc, "--bbox", "-1,-1,1,1", "--scale", "200", "--detail", "0"])?;
		assert!(run_command(vec!["tilemap", "cover", desc, "--bbox", "1,2,3,4", "--layers", "roads"]).is_err());
		Ok(())
	}
}
