use anyhow::Result;
use assert_fs::TempDir;
use std::path::PathBuf;
use tilemap_core::{
	FeatureArg, MAP_LAYER, MOCK_FEATURE_POI, MOCK_FEATURE_ROAD, Mc2Coord, MockDesc, TileFeature, TileMap,
	TileMapFormatDesc, TileMapParams, TileMapType,
	arg_name::{COORD, COORDS, WIDTH},
};

/// Language of the string tile written by [`Fixture::new`].
pub const LANGUAGE: u32 = 5;

/// A temporary directory holding a mock description and one tile pair.
pub struct Fixture {
	pub dir: TempDir,
	pub desc: TileMapFormatDesc,
	pub desc_path: PathBuf,
	pub data_params: TileMapParams,
	pub data_path: PathBuf,
	pub string_params: TileMapParams,
	pub string_path: PathBuf,
}

impl Fixture {
	pub fn new() -> Result<Fixture> {
		let dir = TempDir::new()?;
		let desc = MockDesc::default().build();
		let desc_path = dir.path().join("desc.bin");
		desc.save()?.save_to_file(&desc_path)?;

		let data_params = TileMapParams::new_data(MAP_LAYER, 0, 0, 1, 2);
		let corner = Mc2Coord::new(128_850, 2 * 128_850);
		let at = |lat: i32, lon: i32| Mc2Coord::new(corner.lat + lat, corner.lon + lon);

		let mut data = TileMap::new(data_params.clone(), &desc)?;
		let road = data.coords_arg(COORDS, &[at(1_000, 1_000), at(5_000, 9_000)])?;
		data.add_feature(TileFeature::new(
			MOCK_FEATURE_ROAD,
			vec![FeatureArg::simple(WIDTH, 4, 3), road],
		));
		let poi = data.coord_arg(COORD, at(12_345, 54_321));
		data.add_feature(TileFeature::new(MOCK_FEATURE_POI, vec![poi]));
		let data_path = dir.path().join("data.bin");
		data.save()?.save_to_file(&data_path)?;

		let string_params = data_params.sibling(TileMapType::Strings, LANGUAGE);
		let mut strings = TileMap::new(string_params.clone(), &desc)?;
		strings.set_feature_string(0, "Main Street");
		strings.set_feature_string(1, "Cafe Blue");
		strings.set_crc(data.data_crc()?);
		let string_path = dir.path().join("strings.bin");
		strings.save()?.save_to_file(&string_path)?;

		Ok(Fixture {
			dir,
			desc,
			desc_path,
			data_params,
			data_path,
			string_params,
			string_path,
		})
	}
}
