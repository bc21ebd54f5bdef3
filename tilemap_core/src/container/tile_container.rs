use super::{FULL_COVERAGE, MapStorage, PutOutcome, Tier, TierKey, select_best_tier};
use crate::{
	Blob, Mc2BBox, ParamsSignature, TileMap, TileMapFormatDesc, TileMapGarbage, TileMapParams, TileMapType, ViewParams,
	ViewRequest,
};
use anyhow::{Result, ensure};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A tile to draw, with the string tile of the same address if that has arrived.
#[derive(Clone, Copy, Debug)]
pub struct DrawTile<'a> {
	pub params: &'a TileMapParams,
	pub map: Option<&'a TileMap>,
	pub strings: Option<&'a TileMap>,
}

/// What [`TileMapContainer::add_map`] did with a buffer.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AddOutcome {
	/// The tier the tile went to, `None` if nobody wanted it.
	pub stored_in: Option<Tier>,
	/// Whether the tile is part of what is drawn now.
	pub visible: bool,
	/// Addresses whose buffers must be dropped from the buffer caches.
	pub remove_from_cache: Vec<TileMapParams>,
}

/// The tile cache of a map view.
///
/// Tiles live in three storages: the ones the current view requested, stale ones from
/// earlier views and coarse reserve tiles around the center. For every layer and
/// importance exactly one of them is drawn, the one covering most of the view. A fourth
/// tier, the tiles requested by the previous view, exists while the view changes.
#[derive(Debug)]
pub struct TileMapContainer {
	desc: Arc<TileMapFormatDesc>,
	requested: MapStorage,
	stale: MapStorage,
	reserve: MapStorage,
	draw_sources: BTreeMap<TierKey, Tier>,
	signature: ParamsSignature,
	view: Option<Mc2BBox>,
	garbage: TileMapGarbage<TileMap>,
}

impl TileMapContainer {
	pub fn new(desc: Arc<TileMapFormatDesc>, garbage: TileMapGarbage<TileMap>) -> TileMapContainer {
		TileMapContainer {
			desc,
			requested: MapStorage::new(),
			stale: MapStorage::new(),
			reserve: MapStorage::new(),
			draw_sources: BTreeMap::new(),
			signature: ParamsSignature::new(),
			view: None,
			garbage,
		}
	}

	pub fn desc(&self) -> &Arc<TileMapFormatDesc> {
		&self.desc
	}

	/// Switches to a new description. Every tile is discarded.
	pub fn set_desc(&mut self, desc: Arc<TileMapFormatDesc>) {
		self.clear();
		self.desc = desc;
	}

	pub fn garbage(&self) -> &TileMapGarbage<TileMap> {
		&self.garbage
	}

	/// The collector, for the host to deliver idle ticks to.
	pub fn garbage_mut(&mut self) -> &mut TileMapGarbage<TileMap> {
		&mut self.garbage
	}

	pub fn storage(&self, tier: Tier) -> Option<&MapStorage> {
		match tier {
			Tier::Requested => Some(&self.requested),
			Tier::Stale => Some(&self.stale),
			Tier::Reserve => Some(&self.reserve),
			Tier::JustSuperseded => None,
		}
	}

	/// The tier drawn for `key`.
	pub fn draw_source(&self, key: TierKey) -> Option<Tier> {
		self.draw_sources.get(&key).copied()
	}

	/// Generates the tiles for `view` and rearranges the cache if they changed.
	///
	/// Returns `false` when the view needs the same tiles as before.
	pub fn update_params(&mut self, view: &ViewRequest) -> bool {
		let desc = Arc::clone(&self.desc);
		match desc.create_params(&mut self.signature, view) {
			Some(params) => {
				self.params_updated(view.bbox, params);
				true
			}
			None => false,
		}
	}

	/// Installs a new tile set for the view `bbox` and picks the draw source of every
	/// layer and importance.
	pub fn params_updated(&mut self, bbox: Mc2BBox, params: ViewParams) {
		let desc = Arc::clone(&self.desc);
		self.view = Some(bbox);
		self.draw_sources.clear();

		let mut superseded = std::mem::replace(&mut self.requested, MapStorage::with_params(&params.params));
		self.requested.migrate_from(&mut superseded, &desc);
		superseded.drop_strings(&mut self.garbage);

		let mut previous_reserve = std::mem::replace(&mut self.reserve, MapStorage::with_params(&params.reserve));
		self.reserve.migrate_from(&mut previous_reserve, &desc);
		self.reserve.update_ranges(&desc);
		previous_reserve.clear(&mut self.garbage);

		self.requested.migrate_from(&mut self.stale, &desc);
		self.requested.update_ranges(&desc);

		let keys: Vec<TierKey> = self.requested.keys().collect();
		for key in keys {
			let tier = self.best_tier(key, &superseded, &desc);
			log::trace!("drawing {key:?} from {tier}");
			match tier {
				Tier::Requested | Tier::Reserve => {
					self.stale.clear_key(key, &mut self.garbage);
					self.set_draw_source(key, tier);
				}
				Tier::Stale => self.set_draw_source(key, Tier::Stale),
				Tier::JustSuperseded => {
					self.stale.take_key(&mut superseded, key, &mut self.garbage);
					self.set_draw_source(key, Tier::Stale);
				}
			}
		}

		superseded.clear(&mut self.garbage);
		self.stale.clean_up();
		log::debug!(
			"tile set updated: {} requested, {} stale, {} reserve slots",
			self.requested.len(),
			self.stale.len(),
			self.reserve.len()
		);
	}

	fn coverage_of(&self, storage: &MapStorage, key: TierKey, desc: &TileMapFormatDesc) -> Option<u16> {
		let view = self.view?;
		storage.coverage(key, self.signature.get(&key.layer_nbr), &view, desc)
	}

	fn best_tier(&self, key: TierKey, superseded: &MapStorage, desc: &TileMapFormatDesc) -> Tier {
		select_best_tier([
			self.coverage_of(&self.requested, key, desc),
			self.coverage_of(superseded, key, desc),
			self.coverage_of(&self.stale, key, desc),
			self.coverage_of(&self.reserve, key, desc),
		])
	}

	fn set_draw_source(&mut self, key: TierKey, tier: Tier) {
		if self.storage(tier).is_some_and(|storage| storage.has_key(key)) {
			self.draw_sources.insert(key, tier);
		} else {
			self.draw_sources.remove(&key);
		}
	}

	/// Decodes an arrived buffer and stores it where it is wanted: in the reserve if it
	/// has an empty slot there, otherwise among the requested tiles.
	///
	/// A requested data tile can make its importance complete. If the importance was drawn
	/// from another tier, the requested tier takes over.
	///
	/// # Errors
	/// Returns an error if `key` is no valid tile address or the buffer does not decode.
	pub fn add_map(&mut self, key: &str, buffer: &Blob) -> Result<AddOutcome> {
		let params = TileMapParams::from_string(key);
		ensure!(params.is_valid(), "invalid tile address {key:?}");
		let desc = Arc::clone(&self.desc);
		let mut outcome = AddOutcome::default();

		let target = if self.reserve.wants(&params, &desc) {
			Tier::Reserve
		} else if self.requested.find(&params, &desc).is_some() {
			Tier::Requested
		} else {
			log::debug!("refused to add {params}");
			return Ok(outcome);
		};

		let tile = TileMap::load(buffer, &desc, &params)?;
		let storage = match target {
			Tier::Reserve => &mut self.reserve,
			_ => &mut self.requested,
		};
		let Some(index) = storage.find(&params, &desc) else {
			return Ok(outcome);
		};
		match storage.put(index, tile, &mut self.garbage) {
			PutOutcome::Stored => outcome.stored_in = Some(target),
			PutOutcome::Refused => {
				log::debug!("no slot for {params}");
				return Ok(outcome);
			}
			PutOutcome::CrcMismatch(evict) => {
				outcome.remove_from_cache = evict;
				return Ok(outcome);
			}
		}

		let Some(tier_key) = TierKey::of(&params, &desc) else {
			return Ok(outcome);
		};
		if target == Tier::Requested && params.map_type() == TileMapType::Data {
			self.promote(tier_key, &desc);
		}
		outcome.visible = self.draw_source(tier_key) == Some(target);
		Ok(outcome)
	}

	/// Makes the requested tier the draw source of `key` once it fully covers the view.
	fn promote(&mut self, key: TierKey, desc: &TileMapFormatDesc) {
		match self.draw_source(key) {
			Some(Tier::Requested) => {}
			None => self.set_draw_source(key, Tier::Requested),
			Some(current) => {
				if self.coverage_of(&self.requested, key, desc) == Some(FULL_COVERAGE) {
					log::trace!("{key:?} complete, replacing {current}");
					self.set_draw_source(key, Tier::Requested);
					if current == Tier::Stale {
						self.stale.clear_key(key, &mut self.garbage);
						self.stale.clean_up();
					}
				}
			}
		}
	}

	/// The tiles to draw, importance by importance.
	pub fn maps_to_draw(&self) -> impl Iterator<Item = DrawTile<'_>> + '_ {
		self.draw_sources.iter().flat_map(move |(key, tier)| {
			let slots = self.storage(*tier).map_or(&[][..], |storage| storage.slots(*key));
			slots.iter().map(move |slot| DrawTile {
				params: &slot.params,
				map: slot.tile.as_ref(),
				strings: match &slot.strings {
					Some(strings) => strings.tile.as_ref(),
					None => self.string_map_for(&slot.params),
				},
			})
		})
	}

	/// Addresses of every wanted tile that has not arrived: reserve first, then the data
	/// and string tiles of the view.
	pub fn params_to_request(&self) -> Vec<TileMapParams> {
		let reserve = self.reserve.all_slots().iter().filter(|slot| slot.tile.is_none());
		let data = self.requested.all_slots().iter().filter(|slot| slot.tile.is_none());
		let strings = self
			.requested
			.all_slots()
			.iter()
			.filter_map(|slot| slot.strings.as_ref())
			.filter(|strings| strings.tile.is_none())
			.map(|strings| strings.params.clone());
		reserve
			.chain(data)
			.map(|slot| slot.params.clone())
			.chain(strings)
			.collect()
	}

	/// The string tile of the current view for the address of `params`.
	pub fn string_map_for(&self, params: &TileMapParams) -> Option<&TileMap> {
		let index = self.requested.find(params, &self.desc)?;
		self.requested.all_slots()[index].strings.as_ref()?.tile.as_ref()
	}

	/// The requested tile at `params`, data or strings.
	pub fn map(&self, params: &TileMapParams) -> Option<&TileMap> {
		self.requested.tile(params, &self.desc)
	}

	/// Whether the tile at `params` is part of the current tile set.
	pub fn contains_params(&self, params: &TileMapParams) -> bool {
		let in_requested = self.requested.find(params, &self.desc).is_some_and(|index| {
			params.map_type() == TileMapType::Data || self.requested.all_slots()[index].strings.is_some()
		});
		in_requested || (params.map_type() == TileMapType::Data && self.reserve.find(params, &self.desc).is_some())
	}

	/// Discards every tile and forgets the view.
	pub fn clear(&mut self) {
		self.requested.clear(&mut self.garbage);
		self.stale.clear(&mut self.garbage);
		self.reserve.clear(&mut self.garbage);
		self.requested = MapStorage::new();
		self.stale = MapStorage::new();
		self.reserve = MapStorage::new();
		self.draw_sources.clear();
		self.signature.clear();
		self.view = None;
	}
}

impl Drop for TileMapContainer {
	fn drop(&mut self) {
		self.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		IdleId, IdleScheduler, Layer, MAP_LAYER, MOCK_FEATURE_POI, Mc2Coord, MockDesc, TileFeature,
		arg_name::COORD,
	};
	use enumset::EnumSet;
	use pretty_assertions::assert_eq;

	struct NoIdle;

	impl IdleScheduler for NoIdle {
		fn request_idle(&mut self) -> IdleId {
			0
		}

		fn cancel_idle(&mut self, _id: IdleId) {}
	}

	fn container() -> TileMapContainer {
		let desc = Arc::new(MockDesc::default().build());
		TileMapContainer::new(desc, TileMapGarbage::new(Box::new(NoIdle)))
	}

	/// Two by two tiles at detail 0, one tile at detail 1.
	fn view(detail_level: u32) -> ViewRequest {
		ViewRequest {
			bbox: Mc2BBox {
				min_lat: 10,
				min_lon: 10,
				max_lat: 200_000,
				max_lon: 200_000,
			},
			center: Mc2Coord::new(100_000, 100_000),
			scale: 1,
			use_gzip: true,
			language: 5,
			layers: EnumSet::only(Layer::Map),
			route_id: None,
			detail_level: Some(detail_level),
		}
	}

	fn data(detail: u32, importance: u32, lat: i32, lon: i32) -> TileMapParams {
		TileMapParams::new_data(MAP_LAYER, detail, importance, lat, lon).with_server_prefix(3)
	}

	fn road_key(container: &TileMapContainer) -> TierKey {
		TierKey::of(&data(0, 0, 0, 0), container.desc()).expect("road importance")
	}

	fn add_empty(container: &mut TileMapContainer, params: &TileMapParams) -> Result<AddOutcome> {
		let blob = TileMap::new(params.clone(), container.desc())?.save()?;
		container.add_map(&params.to_string(), &blob)
	}

	#[test]
	fn complete_reserve_beats_incomplete_view() -> Result<()> {
		let mut container = container();
		let key = road_key(&container);
		assert!(container.update_params(&view(0)));
		assert_eq!(container.draw_source(key), Some(Tier::Requested));

		let outcome = add_empty(&mut container, &data(6, 0, 0, 0))?;
		assert_eq!(outcome.stored_in, Some(Tier::Reserve));
		assert!(!outcome.visible);

		for (lat, lon) in [(0, 0), (0, 1), (1, 0)] {
			let outcome = add_empty(&mut container, &data(0, 0, lat, lon))?;
			assert_eq!(outcome.stored_in, Some(Tier::Requested));
			assert!(outcome.visible);
		}

		// same tiles again: 3 of 4 requested against the one reserve tile under the view
		let desc = Arc::clone(container.desc());
		let params = desc
			.create_params(&mut ParamsSignature::new(), &view(0))
			.expect("fresh signature");
		container.params_updated(view(0).bbox, params);
		assert_eq!(container.draw_source(key), Some(Tier::Reserve));
		assert_eq!(container.maps_to_draw().filter(|tile| tile.map.is_some()).count(), 1);
		assert!(container.map(&data(0, 0, 1, 0)).is_some());

		// the last tile completes the view
		let outcome = add_empty(&mut container, &data(0, 0, 1, 1))?;
		assert!(outcome.visible);
		assert_eq!(container.draw_source(key), Some(Tier::Requested));
		Ok(())
	}

	#[test]
	fn superseded_tiles_are_kept_as_stale_until_replaced() -> Result<()> {
		let mut container = container();
		let key = road_key(&container);
		container.update_params(&view(0));
		for (lat, lon) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
			add_empty(&mut container, &data(0, 0, lat, lon))?;
		}

		// zooming out: the detail 0 tiles still cover the whole view
		assert!(container.update_params(&view(1)));
		assert_eq!(container.draw_source(key), Some(Tier::Stale));
		assert_eq!(container.storage(Tier::Stale).map(MapStorage::nbr_tiles), Some(4));
		let drawn: Vec<_> = container
			.maps_to_draw()
			.filter(|tile| tile.map.is_some())
			.map(|tile| tile.params.detail_level())
			.collect();
		assert_eq!(drawn, vec![0, 0, 0, 0]);
		assert_eq!(container.garbage().pending(), 0);

		let outcome = add_empty(&mut container, &data(1, 0, 0, 0))?;
		assert!(outcome.visible);
		assert_eq!(container.draw_source(key), Some(Tier::Requested));
		assert_eq!(container.storage(Tier::Stale).map(MapStorage::len), Some(0));
		assert_eq!(container.garbage().pending(), 4);
		Ok(())
	}

	#[test]
	fn paired_tiles_with_different_crc_are_evicted() -> Result<()> {
		let mut container = container();
		container.update_params(&view(0));
		let desc = Arc::clone(container.desc());

		let params = data(0, 0, 0, 0);
		let mut tile = TileMap::new(params.clone(), &desc)?;
		let poi = tile.coord_arg(COORD, Mc2Coord::new(1_000, 1_000));
		tile.add_feature(TileFeature::new(MOCK_FEATURE_POI, vec![poi]));
		container.add_map(&params.to_string(), &tile.save()?)?;
		assert!(container.map(&params).is_some());

		let string_params = params.sibling(TileMapType::Strings, 5);
		let mut strings = TileMap::new(string_params.clone(), &desc)?;
		strings.set_feature_string(0, "Cafe");
		strings.set_crc(Some(1));
		let outcome = container.add_map(&string_params.to_string(), &strings.save()?)?;
		assert_eq!(outcome.stored_in, None);
		assert_eq!(outcome.remove_from_cache, vec![string_params.clone(), params.clone()]);
		assert!(container.map(&params).is_none());
		assert!(container.string_map_for(&params).is_none());
		Ok(())
	}

	#[test]
	fn matching_string_tiles_are_drawn_with_their_data() -> Result<()> {
		let mut container = container();
		container.update_params(&view(0));
		let desc = Arc::clone(container.desc());

		let params = data(0, 0, 0, 0);
		let mut tile = TileMap::new(params.clone(), &desc)?;
		let poi = tile.coord_arg(COORD, Mc2Coord::new(1_000, 1_000));
		tile.add_feature(TileFeature::new(MOCK_FEATURE_POI, vec![poi]));
		let crc = tile.data_crc()?;
		container.add_map(&params.to_string(), &tile.save()?)?;

		let string_params = params.sibling(TileMapType::Strings, 5);
		let mut strings = TileMap::new(string_params.clone(), &desc)?;
		strings.set_feature_string(0, "Cafe");
		strings.set_crc(crc);
		let outcome = container.add_map(&string_params.to_string(), &strings.save()?)?;
		assert_eq!(outcome.stored_in, Some(Tier::Requested));
		assert!(outcome.remove_from_cache.is_empty());

		let drawn = container
			.maps_to_draw()
			.find(|tile| tile.map.is_some())
			.expect("one data tile");
		assert_eq!(drawn.params, &params);
		assert_eq!(drawn.strings.and_then(|s| s.string_for_feature(0)), Some("Cafe"));
		assert!(matches!(drawn.map.map(TileMap::features), Some([feature]) if feature.feature_type == MOCK_FEATURE_POI));
		Ok(())
	}

	#[test]
	fn requests_and_membership() -> Result<()> {
		let mut container = container();
		assert!(container.params_to_request().is_empty());
		assert!(container.update_params(&view(0)));
		assert!(!container.update_params(&view(0)));

		// 27 reserve, 12 data and 12 string tiles
		let wanted = container.params_to_request();
		assert_eq!(wanted.len(), 51);
		assert_eq!(wanted[0].detail_level(), 6);
		assert_eq!(wanted[50].map_type(), TileMapType::Strings);

		let reserve = wanted[0].clone();
		add_empty(&mut container, &reserve)?;
		assert_eq!(container.params_to_request().len(), 50);
		assert!(!container.params_to_request().contains(&reserve));

		assert!(container.contains_params(&reserve));
		assert!(container.contains_params(&data(0, 2, 1, 1).sibling(TileMapType::Strings, 5)));
		assert!(!container.contains_params(&data(0, 0, 5, 5)));
		assert!(!container.contains_params(&reserve.sibling(TileMapType::Strings, 5)));
		assert_eq!(add_empty(&mut container, &data(0, 0, 5, 5))?, AddOutcome::default());
		assert!(container.add_map("G?", &Blob::from(vec![0u8])).is_err());

		container.set_desc(Arc::new(MockDesc::default().build()));
		assert!(container.params_to_request().is_empty());
		assert_eq!(container.garbage().pending(), 1);
		assert!(container.update_params(&view(0)));
		Ok(())
	}
}
