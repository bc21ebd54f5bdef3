use anyhow::{Context, Result};
use itertools::Itertools;
use std::path::{Path, PathBuf};
use tilemap_core::{Blob, Config, TileMapFormatDesc};

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// format description file, gzipped or plain
	#[arg(required = true)]
	filename: PathBuf,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let desc = load_desc(&arguments.filename)?;
	print!("{}", report(&desc));
	Ok(())
}

/// Loads a description with the default fallbacks.
pub fn load_desc(path: &Path) -> Result<TileMapFormatDesc> {
	let blob = Blob::load_from_file(path).with_context(|| format!("reading {}", path.display()))?;
	let desc = TileMapFormatDesc::load(&blob, None, &Config::default())
		.with_context(|| format!("parsing format description {}", path.display()))?;
	log::debug!("loaded {} with {} layers", path.display(), desc.layers.len());
	Ok(desc)
}

fn report(desc: &TileMapFormatDesc) -> String {
	let mut lines = vec![
		format!("server prefix: {}", desc.server_prefix),
		format!("crc:           {}", desc.crc.map_or_else(|| String::from("-"), |crc| format!("{crc:08X}"))),
		format!("timestamp:     {}", desc.timestamp),
		format!("copyright:     {}", desc.copyright),
		format!("reserve:       detail {} +{} tiles", desc.reserve_detail, desc.reserve_extra_tiles),
		format!("feature types: {}", desc.arg_templates.len()),
		String::from("layers:"),
	];

	for layer in &desc.layers {
		let info = desc.layer_infos.iter().find(|info| info.id == layer.id);
		let flags = info
			.map(|info| {
				[
					(info.visible, "visible"),
					(info.transient, "transient"),
					(info.optional, "optional"),
				]
				.iter()
				.filter(|(set, _)| *set)
				.map(|(_, name)| *name)
				.join(",")
			})
			.unwrap_or_default();
		lines.push(format!(
			"  {:>2} {:<10} {:>2} detail levels, {} importances [{flags}]",
			layer.id,
			layer.name,
			layer.tile_scales.len(),
			layer.importance.len(),
		));
		lines.extend(layer.importance.iter().map(|notice| {
			let threshold = notice.threshold.map_or_else(String::new, |t| format!(" threshold {t} at detail {}", notice.detail_level));
			format!(
				"       type {:<3} up to scale {}{threshold}",
				notice.feature_type, notice.max_scale
			)
		}));
	}

	lines.push(String::from("categories:"));
	lines.extend(desc.categories.iter().map(|category| {
		format!(
			"  {:>3} {} ({}) types {}",
			category.id,
			category.name,
			if category.enabled { "on" } else { "off" },
			category.feature_types.iter().join(",")
		)
	}));

	lines.into_iter().map(|line| line + "\n").collect()
}
