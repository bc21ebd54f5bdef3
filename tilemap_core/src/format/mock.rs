//! A small but complete format description for tests.
//!
//! Four layers share one pyramid: 600 m tiles at 200 pixels, doubling over 14 detail
//! levels. The finest level has more columns than an address can carry, so its tiles
//! end about 3° short of the antimeridian. Feature types:
//!
//! | type | meaning | arguments           | primitives                  |
//! |------|---------|---------------------|-----------------------------|
//! | 0    | POI     | coordinate          |                             |
//! | 1    | road    | width, coordinates  | casing line, fill line      |
//! | 2    | area    | color, coordinates  | polygon                     |
//! | 3    | parking | coordinate, level   |                             |
//!
//! The map layer has three importances below scale 1000 and two above it: roads, one
//! area-thresholded importance per detail level, and areas.
//!
//! ```rust
//! use tilemap_core::*;
//!
//! let desc = MockDesc::default().build();
//! assert_eq!(desc.detail_level_for_scale(MAP_LAYER, 5), Some(0));
//! ```

use super::{ArgTransfer, LayerDesc, LayerInfo, PrimitiveDefault, TileCategory, TileGeometry, TileMapFormatDesc};
use crate::{
	Config, FeatureArg, ImportanceNotice, ImportanceTable, MAP_LAYER, Mc2Coord, POI_LAYER, PRIMITIVE_LINE,
	PRIMITIVE_POLYGON, ROUTE_LAYER, TRAFFIC_LAYER,
	arg_name::{COLOR, COORD, COORDS, LEVEL, WIDTH},
};
use std::collections::BTreeMap;

pub const MOCK_FEATURE_POI: i16 = 0;
pub const MOCK_FEATURE_ROAD: i16 = 1;
pub const MOCK_FEATURE_AREA: i16 = 2;
pub const MOCK_FEATURE_PARKING: i16 = 3;

/// Builder for the mock description.
#[derive(Clone, Debug)]
pub struct MockDesc {
	pub server_prefix: u32,
	pub crc: Option<u32>,
	pub reserve_detail: u32,
	pub reserve_extra_tiles: u32,
}

impl Default for MockDesc {
	fn default() -> Self {
		MockDesc {
			server_prefix: 3,
			crc: Some(0x1234_5678),
			reserve_detail: 6,
			reserve_extra_tiles: 1,
		}
	}
}

impl MockDesc {
	pub fn geometry() -> TileGeometry {
		TileGeometry {
			meters: 600,
			pixels: 200,
			dpi: 72,
			zoom_factor_milli: 2000,
			exchange_factor_milli: 500,
			detail_levels: 14,
		}
	}

	fn map_importance() -> ImportanceTable {
		let mut notices = vec![ImportanceNotice::new(0, u16::MAX, MOCK_FEATURE_ROAD as u16, None)];
		for detail in 0..14 {
			notices.push(ImportanceNotice::new(detail, u16::MAX, MOCK_FEATURE_AREA as u16, Some(10)));
		}
		notices.push(ImportanceNotice::new(0, 1000, MOCK_FEATURE_AREA as u16, None));
		ImportanceTable::from_notices(notices)
	}

	fn single_importance(feature_type: i16) -> ImportanceTable {
		ImportanceTable::from_notices([ImportanceNotice::new(0, u16::MAX, feature_type as u16, None)])
	}

	pub fn build(&self) -> TileMapFormatDesc {
		let mut desc = TileMapFormatDesc::new(self.server_prefix, &Config::default());
		desc.layers = vec![
			LayerDesc::new(MAP_LAYER, "Map", Self::geometry(), Self::map_importance()),
			LayerDesc::new(ROUTE_LAYER, "Route", Self::geometry(), Self::single_importance(MOCK_FEATURE_ROAD)),
			LayerDesc::new(POI_LAYER, "POI", Self::geometry(), Self::single_importance(MOCK_FEATURE_POI)),
			LayerDesc::new(TRAFFIC_LAYER, "Traffic", Self::geometry(), Self::single_importance(MOCK_FEATURE_ROAD)),
		];

		desc.arg_templates = vec![
			vec![FeatureArg::coord(COORD, Mc2Coord::default())],
			vec![FeatureArg::simple(WIDTH, 4, 0), FeatureArg::coords(COORDS)],
			vec![FeatureArg::simple(COLOR, 24, 0), FeatureArg::coords(COORDS)],
			vec![FeatureArg::coord(COORD, Mc2Coord::default()), FeatureArg::simple(LEVEL, 4, 0)],
		];
		desc.scale_levels = vec![1, 2, 3];

		let casing_width = desc.default_args.add_arg(FeatureArg::simple(WIDTH, 4, 5)) as u16;
		let black = desc.default_args.add_arg(FeatureArg::simple(COLOR, 24, 0)) as u16;
		let white = desc.default_args.add_arg(FeatureArg::simple(COLOR, 24, 0x00FF_FFFF)) as u16;
		let level = desc.default_args.add_arg(FeatureArg::simple(LEVEL, 4, 13)) as u16;
		let green = desc.default_args.add_arg(FeatureArg::simple(COLOR, 24, 0x00A0_D0A0)) as u16;
		desc.primitive_defaults = BTreeMap::from([
			(
				MOCK_FEATURE_ROAD,
				vec![
					PrimitiveDefault {
						feature_type: PRIMITIVE_LINE,
						arg_indices: vec![casing_width, black, level],
					},
					PrimitiveDefault {
						feature_type: PRIMITIVE_LINE,
						arg_indices: vec![casing_width, white, level],
					},
				],
			),
			(
				MOCK_FEATURE_AREA,
				vec![PrimitiveDefault {
					feature_type: PRIMITIVE_POLYGON,
					arg_indices: vec![green, level],
				}],
			),
		]);
		desc.arg_transfers = vec![
			Vec::new(),
			vec![ArgTransfer {
				from: WIDTH,
				primitive: 1,
				to: WIDTH,
			}],
			vec![ArgTransfer {
				from: COLOR,
				primitive: 0,
				to: COLOR,
			}],
			Vec::new(),
		];

		desc.background_color = 0x00F0_F0E0;
		desc.reserve_detail = self.reserve_detail;
		desc.reserve_extra_tiles = self.reserve_extra_tiles;
		desc.language = Some(0);
		desc.categories = vec![
			TileCategory::new("Restaurants", 1, true, vec![MOCK_FEATURE_POI]),
			TileCategory::new("Parking", 2, true, vec![MOCK_FEATURE_PARKING]),
		];
		desc.crc = self.crc;
		desc.timestamp = 1_700_000_000;
		desc.copyright = String::from("©2010 Mock Maps");
		desc.layer_infos = vec![
			LayerInfo::basic(MAP_LAYER, "Map"),
			LayerInfo {
				transient: true,
				..LayerInfo::basic(ROUTE_LAYER, "Route")
			},
			LayerInfo {
				optional: true,
				..LayerInfo::basic(POI_LAYER, "POI")
			},
			LayerInfo {
				visible: false,
				transient: true,
				optional: true,
				update_period_minutes: 5,
				..LayerInfo::basic(TRAFFIC_LAYER, "Traffic")
			},
		];
		desc
	}
}
