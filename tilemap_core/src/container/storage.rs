use super::coverage_fraction;
use crate::{Mc2BBox, ParamsNotice, RouteId, TileMap, TileMapFormatDesc, TileMapGarbage, TileMapParams, TileMapType};
use std::collections::BTreeMap;
use std::ops::Range;

/// Groups the tiles of a storage: the layer's position in the description and the
/// signature of the importance notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TierKey {
	pub layer_nbr: usize,
	pub signature: u32,
}

impl TierKey {
	/// The key of the tile at `params`, `None` if the description does not know its
	/// layer or importance.
	pub fn of(params: &TileMapParams, desc: &TileMapFormatDesc) -> Option<TierKey> {
		Some(TierKey {
			layer_nbr: desc.layer_nbr(params.layer())?,
			signature: desc.importance_for(params)?.signature(),
		})
	}
}

/// A string tile slot, paired with the data tile of the same address.
#[derive(Debug)]
pub struct StringSlot {
	pub params: TileMapParams,
	pub tile: Option<TileMap>,
}

/// One tile address and the tile, once it has arrived.
#[derive(Debug)]
pub struct Slot {
	pub params: TileMapParams,
	pub tile: Option<TileMap>,
	pub strings: Option<StringSlot>,
}

impl Slot {
	fn new(params: TileMapParams) -> Slot {
		Slot {
			params,
			tile: None,
			strings: None,
		}
	}

	fn tile_mut(&mut self, map_type: TileMapType) -> Option<&mut Option<TileMap>> {
		match map_type {
			TileMapType::Data => Some(&mut self.tile),
			TileMapType::Strings => self.strings.as_mut().map(|strings| &mut strings.tile),
		}
	}

	fn discard(&mut self, garbage: &mut TileMapGarbage<TileMap>) {
		garbage.add_all(self.tile.take());
		if let Some(strings) = self.strings.as_mut() {
			garbage.add_all(strings.tile.take());
		}
	}
}

/// Result of [`MapStorage::put`].
#[derive(Debug, PartialEq, Eq)]
pub enum PutOutcome {
	Stored,
	/// The storage has no slot of that type there.
	Refused,
	/// The tile and its pair disagree; both were discarded.
	CrcMismatch(Vec<TileMapParams>),
}

/// Identity of a tile regardless of its type and language.
fn same_tile(a: &TileMapParams, b: &TileMapParams) -> bool {
	a.layer() == b.layer()
		&& a.detail_level() == b.detail_level()
		&& a.lat_idx() == b.lat_idx()
		&& a.lon_idx() == b.lon_idx()
		&& a.importance() == b.importance()
		&& a.route_id().filter(RouteId::is_valid) == b.route_id().filter(RouteId::is_valid)
}

/// One tier of the tile cache.
///
/// Slots are partitioned into contiguous ranges, one per [`TierKey`]. A tile is owned by
/// exactly one slot; moving it to another storage leaves the slot empty.
#[derive(Debug, Default)]
pub struct MapStorage {
	slots: Vec<Slot>,
	ranges: BTreeMap<TierKey, Range<usize>>,
}

impl MapStorage {
	pub fn new() -> MapStorage {
		MapStorage::default()
	}

	/// Empty slots for `params`, in order.
	///
	/// String tile addresses are paired with the data tile of the same address. String
	/// tiles without a data tile among `params` are dropped.
	pub fn with_params(params: &[TileMapParams]) -> MapStorage {
		let mut slots: Vec<Slot> = params
			.iter()
			.filter(|p| p.map_type() == TileMapType::Data)
			.map(|p| Slot::new(p.clone()))
			.collect();
		let mut next = 0;
		for string_params in params.iter().filter(|p| p.map_type() == TileMapType::Strings) {
			// strings follow the data order, so the search resumes where the last one ended
			let found = (next..slots.len())
				.chain(0..next)
				.find(|i| same_tile(&slots[*i].params, string_params));
			match found {
				Some(i) => {
					slots[i].strings = Some(StringSlot {
						params: string_params.clone(),
						tile: None,
					});
					next = i + 1;
				}
				None => log::trace!("string tile {string_params} has no data tile"),
			}
		}
		MapStorage {
			slots,
			ranges: BTreeMap::new(),
		}
	}

	pub fn len(&self) -> usize {
		self.slots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	pub fn keys(&self) -> impl Iterator<Item = TierKey> + '_ {
		self.ranges.keys().copied()
	}

	/// Slots of `key`; empty if the storage does not know it.
	pub fn slots(&self, key: TierKey) -> &[Slot] {
		self.ranges.get(&key).map_or(&[], |range| &self.slots[range.clone()])
	}

	pub fn all_slots(&self) -> &[Slot] {
		&self.slots
	}

	/// Whether `key` has at least one slot.
	pub fn has_key(&self, key: TierKey) -> bool {
		!self.slots(key).is_empty()
	}

	/// Number of tiles held, data and strings.
	pub fn nbr_tiles(&self) -> usize {
		self
			.slots
			.iter()
			.map(|slot| usize::from(slot.tile.is_some()) + usize::from(slot.strings.as_ref().is_some_and(|s| s.tile.is_some())))
			.sum()
	}

	/// Recomputes the key ranges from the slot order.
	pub fn update_ranges(&mut self, desc: &TileMapFormatDesc) {
		self.ranges.clear();
		let keys: Vec<Option<TierKey>> = self.slots.iter().map(|slot| TierKey::of(&slot.params, desc)).collect();
		let mut current: Option<(TierKey, usize)> = None;
		for (i, key) in keys.into_iter().enumerate() {
			if current.map(|(k, _)| k) == key {
				continue;
			}
			if let Some((k, start)) = current.take() {
				self.insert_range(k, start..i);
			}
			current = key.map(|k| (k, i));
		}
		if let Some((k, start)) = current {
			self.insert_range(k, start..self.slots.len());
		}
	}

	fn insert_range(&mut self, key: TierKey, range: Range<usize>) {
		if self.ranges.contains_key(&key) {
			log::warn!("tiles of {key:?} are not contiguous, ignoring {range:?}");
		} else {
			self.ranges.insert(key, range);
		}
	}

	/// Index of the slot for the tile at `params`, ignoring tile type and language.
	///
	/// Only slots inside the key ranges are searched.
	pub fn find(&self, params: &TileMapParams, desc: &TileMapFormatDesc) -> Option<usize> {
		let range = self.ranges.get(&TierKey::of(params, desc)?)?;
		range.clone().find(|i| same_tile(&self.slots[*i].params, params))
	}

	/// The tile of `map_type` at `params`, if it is here.
	pub fn tile(&self, params: &TileMapParams, desc: &TileMapFormatDesc) -> Option<&TileMap> {
		let slot = &self.slots[self.find(params, desc)?];
		match params.map_type() {
			TileMapType::Data => slot.tile.as_ref(),
			TileMapType::Strings => slot.strings.as_ref()?.tile.as_ref(),
		}
	}

	/// Whether the slot for `params` exists and is still empty. String tiles only have a
	/// slot in storages built with string addresses.
	pub fn wants(&self, params: &TileMapParams, desc: &TileMapFormatDesc) -> bool {
		self
			.find(params, desc)
			.and_then(|i| self.slot_tile(i, params.map_type()))
			.is_some_and(Option::is_none)
	}

	fn slot_tile(&self, index: usize, map_type: TileMapType) -> Option<&Option<TileMap>> {
		let slot = self.slots.get(index)?;
		match map_type {
			TileMapType::Data => Some(&slot.tile),
			TileMapType::Strings => slot.strings.as_ref().map(|strings| &strings.tile),
		}
	}

	/// Stores `tile` in the slot at `index`, replacing a tile already there.
	///
	/// If the paired tile of the other type is present and carries a different CRC, both are
	/// discarded and their addresses returned for eviction from the buffer caches.
	pub fn put(&mut self, index: usize, tile: TileMap, garbage: &mut TileMapGarbage<TileMap>) -> PutOutcome {
		let map_type = tile.params().map_type();
		let other_type = match map_type {
			TileMapType::Data => TileMapType::Strings,
			TileMapType::Strings => TileMapType::Data,
		};
		let other_crc = self
			.slot_tile(index, other_type)
			.and_then(Option::as_ref)
			.and_then(TileMap::crc);
		let Some(slot) = self.slots.get_mut(index) else {
			garbage.add(tile);
			return PutOutcome::Refused;
		};

		if let (Some(crc), Some(other_crc)) = (tile.crc(), other_crc) {
			if crc != other_crc {
				log::warn!("CRC differs for {}: {crc:08x} - {other_crc:08x}", tile.params());
				let mut evict = vec![tile.params().clone()];
				if let Some(strings) = slot.strings.as_ref() {
					evict.push(match map_type {
						TileMapType::Data => strings.params.clone(),
						TileMapType::Strings => slot.params.clone(),
					});
				}
				slot.discard(garbage);
				garbage.add(tile);
				return PutOutcome::CrcMismatch(evict);
			}
		}

		match slot.tile_mut(map_type) {
			Some(target) => {
				garbage.add_all(target.replace(tile));
				PutOutcome::Stored
			}
			None => {
				garbage.add(tile);
				PutOutcome::Refused
			}
		}
	}

	/// Moves tiles for the empty slots here out of `other`.
	pub fn migrate_from(&mut self, other: &mut MapStorage, desc: &TileMapFormatDesc) {
		let mut moved = 0;
		for slot in &mut self.slots {
			let Some(index) = other.find(&slot.params, desc) else {
				continue;
			};
			let source = &mut other.slots[index];
			if slot.tile.is_none() && source.tile.is_some() {
				slot.tile = source.tile.take();
				moved += 1;
			}
			if let (Some(strings), Some(source_strings)) = (slot.strings.as_mut(), source.strings.as_mut()) {
				if strings.tile.is_none() && source_strings.params.language() == strings.params.language() {
					if let Some(tile) = source_strings.tile.take() {
						strings.tile = Some(tile);
						moved += 1;
					}
				}
			}
		}
		if moved > 0 {
			log::trace!("reused {moved} tiles");
		}
	}

	/// Takes over the slots of `key` from `other`, replacing the ones held here.
	///
	/// The new slots go where the old ones were if they fit, otherwise to the end.
	pub fn take_key(&mut self, other: &mut MapStorage, key: TierKey, garbage: &mut TileMapGarbage<TileMap>) {
		let Some(source) = other.ranges.get(&key).cloned() else {
			return;
		};
		let old = self.ranges.get(&key).cloned();
		self.clear_key(key, garbage);

		let count = source.len();
		let start = match old {
			Some(old) if count <= old.len() => old.start,
			_ => {
				let start = self.slots.len();
				self.slots.extend(source.clone().map(|i| Slot::new(other.slots[i].params.clone())));
				start
			}
		};
		for (offset, i) in source.enumerate() {
			let from = &mut other.slots[i];
			let to = &mut self.slots[start + offset];
			to.params = from.params.clone();
			to.tile = from.tile.take();
			to.strings = None;
			if let Some(strings) = from.strings.as_mut() {
				garbage.add_all(strings.tile.take());
			}
		}
		self.ranges.insert(key, start..start + count);
	}

	/// Discards the tiles of `key` and forgets its range.
	pub fn clear_key(&mut self, key: TierKey, garbage: &mut TileMapGarbage<TileMap>) {
		if let Some(range) = self.ranges.remove(&key) {
			for slot in &mut self.slots[range] {
				slot.discard(garbage);
			}
		}
	}

	/// Discards every tile and forgets all ranges. The slots stay.
	pub fn clear(&mut self, garbage: &mut TileMapGarbage<TileMap>) {
		for slot in &mut self.slots {
			slot.discard(garbage);
		}
		self.ranges.clear();
	}

	/// Discards all string tiles and the string slots.
	pub fn drop_strings(&mut self, garbage: &mut TileMapGarbage<TileMap>) {
		for slot in &mut self.slots {
			if let Some(strings) = slot.strings.take() {
				garbage.add_all(strings.tile);
			}
		}
	}

	/// Releases the slot memory once no key is left.
	pub fn clean_up(&mut self) {
		if self.ranges.is_empty() {
			self.slots.clear();
		}
	}

	/// How much of the view the tiles of `key` cover, `None` if the key is not here.
	///
	/// `notice` is the rectangle requested for the key's layer. Tiles at another detail
	/// level are measured against the rectangle `view` spans at their level.
	pub fn coverage(
		&self,
		key: TierKey,
		notice: Option<&ParamsNotice>,
		view: &Mc2BBox,
		desc: &TileMapFormatDesc,
	) -> Option<u16> {
		let slots = self.slots(key);
		if !self.ranges.contains_key(&key) {
			return None;
		}
		let Some(first) = slots.first() else {
			return Some(0);
		};
		let rect = match notice {
			Some(notice) if notice.detail_level == first.params.detail_level() => *notice,
			_ => desc.tile_rect(first.params.layer(), first.params.detail_level(), view)?,
		};
		let found = slots
			.iter()
			.filter(|slot| slot.tile.is_some() && rect.contains(slot.params.lat_idx(), slot.params.lon_idx()))
			.count();
		Some(coverage_fraction(found, rect.nbr_tiles()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{FULL_COVERAGE, IdleId, IdleScheduler, MAP_LAYER, MockDesc, POI_LAYER};
	use anyhow::Result;
	use pretty_assertions::assert_eq;

	struct NoIdle;

	impl IdleScheduler for NoIdle {
		fn request_idle(&mut self) -> IdleId {
			0
		}

		fn cancel_idle(&mut self, _id: IdleId) {}
	}

	fn garbage() -> TileMapGarbage<TileMap> {
		TileMapGarbage::new(Box::new(NoIdle))
	}

	fn data(layer: u32, detail: u32, importance: u32, lat: i32, lon: i32) -> TileMapParams {
		TileMapParams::new_data(layer, detail, importance, lat, lon).with_server_prefix(3)
	}

	fn grid(layer: u32, detail: u32, importance: u32) -> Vec<TileMapParams> {
		let mut params = Vec::new();
		for lat in 0..2 {
			for lon in 0..2 {
				params.push(data(layer, detail, importance, lat, lon));
			}
		}
		params
	}

	fn with_strings(data: Vec<TileMapParams>) -> Vec<TileMapParams> {
		let strings: Vec<_> = data.iter().map(|p| p.sibling(TileMapType::Strings, 5)).collect();
		data.into_iter().chain(strings).collect()
	}

	fn fill(storage: &mut MapStorage, params: &TileMapParams, desc: &TileMapFormatDesc) -> Result<()> {
		let index = storage.find(params, desc).expect("slot");
		let tile = TileMap::new(params.clone(), desc)?;
		assert_eq!(storage.put(index, tile, &mut garbage()), PutOutcome::Stored);
		Ok(())
	}

	fn key(desc: &TileMapFormatDesc, params: &TileMapParams) -> TierKey {
		TierKey::of(params, desc).expect("known importance")
	}

	#[test]
	fn ranges_follow_the_importances() {
		let desc = MockDesc::default().build();
		let mut params = grid(MAP_LAYER, 0, 0);
		params.extend(grid(MAP_LAYER, 0, 2));
		params.extend(grid(POI_LAYER, 0, 0));
		let mut storage = MapStorage::with_params(&with_strings(params.clone()));
		storage.update_ranges(&desc);

		assert_eq!(storage.len(), 12);
		assert_eq!(storage.keys().count(), 3);
		assert_eq!(storage.slots(key(&desc, &params[4]))[0].params, params[4]);
		assert!(storage.all_slots().iter().all(|slot| slot.strings.is_some()));

		let strings = params[9].sibling(TileMapType::Strings, 5);
		assert_eq!(storage.find(&strings, &desc), Some(9));
		assert!(storage.wants(&strings, &desc));
		assert_eq!(storage.find(&data(MAP_LAYER, 0, 0, 7, 7), &desc), None);
	}

	#[test]
	fn coverage_counts_tiles_inside_the_rectangle() -> Result<()> {
		let desc = MockDesc::default().build();
		let params = grid(POI_LAYER, 0, 0);
		let mut storage = MapStorage::with_params(&params);
		storage.update_ranges(&desc);
		let key = key(&desc, &params[0]);
		let notice = ParamsNotice {
			layer_id: POI_LAYER,
			detail_level: 0,
			start_lat_idx: 0,
			end_lat_idx: 1,
			start_lon_idx: 0,
			end_lon_idx: 1,
			nbr_importances: 1,
		};
		let view = Mc2BBox::new(10, 10, 200_000, 200_000)?;

		assert_eq!(storage.coverage(key, Some(&notice), &view, &desc), Some(0));
		for p in &params[..3] {
			fill(&mut storage, p, &desc)?;
		}
		assert_eq!(storage.coverage(key, Some(&notice), &view, &desc), Some(24_575));
		fill(&mut storage, &params[3], &desc)?;
		assert_eq!(storage.coverage(key, Some(&notice), &view, &desc), Some(FULL_COVERAGE));

		// tiles at detail 1: the 2x2 notice applies, or the view measured at that level
		let coarse = ParamsNotice { detail_level: 1, ..notice };
		let outside = data(POI_LAYER, 1, 0, 3, 3);
		let coarse_key = self::key(&desc, &outside);
		let mut other = MapStorage::with_params(&[outside]);
		other.update_ranges(&desc);
		assert_eq!(other.coverage(key, Some(&coarse), &view, &desc), None);
		assert_eq!(other.coverage(coarse_key, Some(&coarse), &view, &desc), Some(0));
		assert_eq!(other.coverage(coarse_key, Some(&notice), &view, &desc), Some(0));
		assert_eq!(MapStorage::new().coverage(key, Some(&notice), &view, &desc), None);
		Ok(())
	}

	#[test]
	fn migration_moves_tiles_and_leaves_empty_slots() -> Result<()> {
		let desc = MockDesc::default().build();
		let params = with_strings(grid(POI_LAYER, 0, 0));
		let mut old = MapStorage::with_params(&params);
		old.update_ranges(&desc);
		fill(&mut old, &params[0], &desc)?;
		fill(&mut old, &params[4], &desc)?;
		assert_eq!(old.nbr_tiles(), 2);

		let mut new = MapStorage::with_params(&params[..2].iter().chain(&params[4..6]).cloned().collect::<Vec<_>>());
		new.migrate_from(&mut old, &desc);
		assert_eq!(new.nbr_tiles(), 2);
		assert_eq!(old.nbr_tiles(), 0);
		assert!(new.all_slots()[0].tile.is_some());
		assert!(new.all_slots()[0].strings.as_ref().is_some_and(|s| s.tile.is_some()));
		Ok(())
	}

	#[test]
	fn taking_a_key_reuses_or_appends_space() -> Result<()> {
		let desc = MockDesc::default().build();
		let mut gc = garbage();
		let params = grid(POI_LAYER, 0, 0);
		let key = key(&desc, &params[0]);

		let mut source = MapStorage::with_params(&params);
		source.update_ranges(&desc);
		fill(&mut source, &params[1], &desc)?;

		let mut target = MapStorage::new();
		target.take_key(&mut source, key, &mut gc);
		assert_eq!(target.slots(key).len(), 4);
		assert!(target.slots(key)[1].tile.is_some());
		assert_eq!(source.nbr_tiles(), 0);

		let mut smaller = MapStorage::with_params(&params[..2]);
		smaller.update_ranges(&desc);
		target.take_key(&mut smaller, key, &mut gc);
		assert_eq!(target.len(), 4);
		assert_eq!(target.slots(key).len(), 2);
		assert_eq!(gc.pending(), 1);

		target.clear_key(key, &mut gc);
		assert!(!target.has_key(key));
		target.clean_up();
		assert!(target.is_empty());
		Ok(())
	}

	#[test]
	fn paired_crc_mismatch_discards_both() -> Result<()> {
		let desc = MockDesc::default().build();
		let mut gc = garbage();
		let params = with_strings(grid(POI_LAYER, 0, 0));
		let mut storage = MapStorage::with_params(&params);
		storage.update_ranges(&desc);

		let mut data_tile = TileMap::new(params[0].clone(), &desc)?;
		data_tile.set_crc(Some(1));
		let mut string_tile = TileMap::new(params[4].clone(), &desc)?;
		string_tile.set_crc(Some(2));

		assert_eq!(storage.put(0, data_tile, &mut gc), PutOutcome::Stored);
		assert_eq!(
			storage.put(0, string_tile, &mut gc),
			PutOutcome::CrcMismatch(vec![params[4].clone(), params[0].clone()])
		);
		assert_eq!(storage.nbr_tiles(), 0);
		assert_eq!(gc.pending(), 2);
		Ok(())
	}
}
