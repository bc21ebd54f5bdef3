//! Parameter generation: which tiles cover a viewport.
//!
//! For every selected layer the viewport box is turned into a rectangle of tile indices at
//! the layer's detail level, and every importance available at the scale is requested for
//! every tile of it, first as data tiles and then as string tiles. String tiles skip the
//! rows outside the drawable latitude band. A reserve sweep adds the coarse map tiles
//! around the center.

use super::TileMapFormatDesc;
use crate::{
	Layer, MAP_LAYER, METER_TO_MC2SCALE, Mc2BBox, Mc2Coord, ROUTE_LAYER, RouteId, TileMapParams, TileMapType,
};
use enumset::EnumSet;
use std::collections::{BTreeMap, BTreeSet};

/// Boxes larger than this are split into quarters before sweeping all scales.
const MAX_SWEEP_AREA: i128 = (704_074 * 16) * (704_074 * 16);

/// The tile rectangle and importance count requested for one layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamsNotice {
	pub layer_id: u32,
	pub detail_level: u32,
	pub start_lat_idx: i32,
	pub end_lat_idx: i32,
	pub start_lon_idx: i32,
	pub end_lon_idx: i32,
	pub nbr_importances: u32,
}

impl ParamsNotice {
	pub fn nbr_tiles(&self) -> usize {
		let rows = i64::from(self.end_lat_idx) - i64::from(self.start_lat_idx) + 1;
		let cols = i64::from(self.end_lon_idx) - i64::from(self.start_lon_idx) + 1;
		(rows.max(0) * cols.max(0)) as usize
	}

	pub fn contains(&self, lat_idx: i32, lon_idx: i32) -> bool {
		(self.start_lat_idx..=self.end_lat_idx).contains(&lat_idx) && (self.start_lon_idx..=self.end_lon_idx).contains(&lon_idx)
	}
}

/// Notices of the last generation, keyed by the layer's position in the description.
pub type ParamsSignature = BTreeMap<usize, ParamsNotice>;

/// What the viewer shows.
#[derive(Clone, Debug)]
pub struct ViewRequest {
	/// Projected viewport. `min_lon > max_lon` means the box crosses the antimeridian.
	pub bbox: Mc2BBox,
	pub center: Mc2Coord,
	/// Meters per pixel.
	pub scale: u32,
	pub use_gzip: bool,
	pub language: u32,
	pub layers: EnumSet<Layer>,
	pub route_id: Option<RouteId>,
	/// Fixed detail level, or `None` to derive it from the scale per layer.
	pub detail_level: Option<u32>,
}

/// Output of [`TileMapFormatDesc::create_params`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewParams {
	/// Data tiles of every layer, then string tiles of every layer.
	pub params: Vec<TileMapParams>,
	pub reserve: Vec<TileMapParams>,
}

impl TileMapFormatDesc {
	/// Computes the tiles for `view`.
	///
	/// Returns `None` when the per-layer notices equal `previous`, i.e. the viewer already
	/// has the right tile set. Otherwise `previous` is replaced by the new notices.
	pub fn create_params(&self, previous: &mut ParamsSignature, view: &ViewRequest) -> Option<ViewParams> {
		let params = self.params_for(previous, view)?;
		let reserve = self.reserve_params(view.center, clamp_scale(view.scale), view.use_gzip);
		Some(ViewParams { params, reserve })
	}

	fn params_for(&self, previous: &mut ParamsSignature, view: &ViewRequest) -> Option<Vec<TileMapParams>> {
		let notices = self.params_notices(view);
		if *previous == notices {
			log::trace!("tile set unchanged for scale {}", view.scale);
			return None;
		}
		*previous = notices;

		let route_id = view.route_id.filter(RouteId::is_valid);
		let total: usize = previous
			.values()
			.map(|n| n.nbr_tiles() * n.nbr_importances as usize * 2)
			.sum();
		let mut params = Vec::with_capacity(total);

		for notice in previous.values() {
			self.push_sweep(&mut params, notice, notice.start_lat_idx, notice.end_lat_idx, view.use_gzip, route_id, None);
		}
		for notice in previous.values() {
			let (start_lat, end_lat) =
				self.cap_lat_idx(notice.layer_id, notice.detail_level, notice.start_lat_idx, notice.end_lat_idx);
			self.push_sweep(&mut params, notice, start_lat, end_lat, view.use_gzip, route_id, Some(view.language));
		}
		log::debug!("generated {} tile addresses for {} layers", params.len(), previous.len());
		Some(params)
	}

	fn params_notices(&self, view: &ViewRequest) -> ParamsSignature {
		let scale = clamp_scale(view.scale);
		let mut notices = ParamsSignature::new();
		for layer in view.layers {
			let layer_id = layer.id();
			if layer_id == ROUTE_LAYER && !view.route_id.is_some_and(|id| id.is_valid()) {
				continue;
			}
			let Some(layer_nbr) = self.layer_nbr(layer_id) else {
				log::trace!("layer {layer} is not part of the description");
				continue;
			};
			let detail_level = match view.detail_level {
				Some(detail) => detail,
				None => detail_level_or_zero(self, layer_id, scale),
			};
			let Some(mut notice) = self.tile_rect(layer_id, detail_level, &view.bbox) else {
				continue;
			};
			notice.nbr_importances = self.layers[layer_nbr].importance.nbr_importances(scale, detail_level) as u32;
			notices.insert(layer_nbr, notice);
		}
		notices
	}

	/// The tiles of a layer that `bbox` touches at `detail_level`, without importances.
	///
	/// A box crossing the antimeridian gets an end column beyond the eastern edge.
	pub fn tile_rect(&self, layer_id: u32, detail_level: u32, bbox: &Mc2BBox) -> Option<ParamsNotice> {
		let start = self.tile_index(layer_id, detail_level, Mc2Coord::new(bbox.min_lat, bbox.min_lon))?;
		let end = self.tile_index(layer_id, detail_level, Mc2Coord::new(bbox.max_lat, bbox.max_lon))?;
		let mut end_lon = end.1;
		if start.1 > end_lon {
			if let Some((_, west)) = self.tile_index(layer_id, detail_level, Mc2Coord::new(0, i32::MIN)) {
				end_lon = end_lon.saturating_sub(west.saturating_mul(2));
			}
		}
		Some(ParamsNotice {
			layer_id,
			detail_level,
			start_lat_idx: start.0,
			end_lat_idx: end.0,
			start_lon_idx: start.1,
			end_lon_idx: end_lon,
			nbr_importances: 0,
		})
	}

	#[allow(clippy::too_many_arguments)]
	fn push_sweep(
		&self,
		out: &mut Vec<TileMapParams>,
		notice: &ParamsNotice,
		start_lat: i32,
		end_lat: i32,
		use_gzip: bool,
		route_id: Option<RouteId>,
		language: Option<u32>,
	) {
		for importance in 0..notice.nbr_importances {
			for lat_idx in start_lat..=end_lat {
				for lon_idx in notice.start_lon_idx..=notice.end_lon_idx {
					let mut params =
						TileMapParams::new_data(notice.layer_id, notice.detail_level, importance, lat_idx, lon_idx)
							.with_server_prefix(self.server_prefix)
							.with_gzip(use_gzip);
					if let Some(route_id) = route_id {
						params = params.with_route_id(route_id);
					}
					if let Some(language) = language {
						params = params.sibling(TileMapType::Strings, language);
					}
					if params.is_valid() {
						out.push(params);
					}
				}
			}
		}
	}

	/// Coarse map tiles around `center` that the viewer keeps as a fallback.
	pub fn reserve_params(&self, center: Mc2Coord, scale: u16, use_gzip: bool) -> Vec<TileMapParams> {
		let detail = self.reserve_detail;
		let Some((lat_idx, lon_idx)) = self.tile_index(MAP_LAYER, detail, center) else {
			return Vec::new();
		};
		let Some(layer) = self.layer(MAP_LAYER) else {
			return Vec::new();
		};
		let extra = i32::try_from(self.reserve_extra_tiles).unwrap_or(i32::MAX);
		let (start_lat, end_lat) =
			self.cap_lat_idx(MAP_LAYER, detail, lat_idx.saturating_sub(extra), lat_idx.saturating_add(extra));
		let notice = ParamsNotice {
			layer_id: MAP_LAYER,
			detail_level: detail,
			start_lat_idx: start_lat,
			end_lat_idx: end_lat,
			start_lon_idx: lon_idx.saturating_sub(extra),
			end_lon_idx: lon_idx.saturating_add(extra),
			nbr_importances: layer.importance.nbr_importances(scale, detail) as u32,
		};
		let mut params = Vec::with_capacity(notice.nbr_tiles() * notice.nbr_importances as usize);
		self.push_sweep(&mut params, &notice, start_lat, end_lat, use_gzip, None, None);
		params
	}

	/// Every tile needed to view `bbox` at any scale from `min_scale` upwards, including the
	/// reserve tiles and their string tiles. Used to prepare offline caches.
	pub fn all_params_for_bbox(
		&self,
		bbox: &Mc2BBox,
		layers: EnumSet<Layer>,
		use_gzip: bool,
		language: u32,
		min_scale: u32,
	) -> BTreeSet<TileMapParams> {
		let mut all = BTreeSet::new();
		self.collect_params_for_bbox(&mut all, bbox, layers, use_gzip, language, min_scale);
		all
	}

	fn collect_params_for_bbox(
		&self,
		all: &mut BTreeSet<TileMapParams>,
		bbox: &Mc2BBox,
		layers: EnumSet<Layer>,
		use_gzip: bool,
		language: u32,
		min_scale: u32,
	) {
		if bbox.area() > MAX_SWEEP_AREA {
			log::debug!("splitting {bbox:?} into quarters");
			for quarter in bbox.quarters() {
				self.collect_params_for_bbox(all, &quarter, layers, use_gzip, language, min_scale);
			}
			return;
		}

		for layer in layers {
			for scale in self.interesting_scales(layer.id(), min_scale, None) {
				let view = ViewRequest {
					bbox: *bbox,
					center: bbox.center(),
					scale,
					use_gzip,
					language,
					layers: EnumSet::only(layer),
					route_id: None,
					detail_level: None,
				};
				let Some(generated) = self.create_params(&mut ParamsSignature::new(), &view) else {
					continue;
				};
				for params in generated.reserve {
					all.insert(params.sibling(TileMapType::Strings, language));
					all.insert(params);
				}
				all.extend(generated.params);
			}
		}
	}

	/// Every tile within `extra_pixels` of any of `coords` at scales from `min_scale` to
	/// `max_scale`. Used to prefetch the tiles along a route.
	#[allow(clippy::too_many_arguments)]
	pub fn all_params_along(
		&self,
		coords: &[Mc2Coord],
		extra_pixels: u32,
		layers: EnumSet<Layer>,
		use_gzip: bool,
		language: u32,
		min_scale: u32,
		max_scale: u32,
		route_id: Option<RouteId>,
	) -> BTreeSet<TileMapParams> {
		let mut all = BTreeSet::new();
		for layer in layers {
			let scales = self.interesting_scales(layer.id(), min_scale, Some(max_scale));
			let last = scales.last().copied().unwrap_or(max_scale);
			for (index, scale) in scales.iter().enumerate() {
				let next_scale = scales.get(index + 1).copied().unwrap_or(last);
				let margin = (f64::from(next_scale) * f64::from(extra_pixels) * METER_TO_MC2SCALE) as i32;
				for center in coords {
					let view = ViewRequest {
						bbox: Mc2BBox::from_coord(*center).grown(margin),
						center: *center,
						scale: *scale,
						use_gzip,
						language,
						layers: EnumSet::only(layer),
						route_id,
						detail_level: None,
					};
					if let Some(params) = self.params_for(&mut ParamsSignature::new(), &view) {
						all.extend(params);
					}
				}
			}
		}
		all
	}

	/// `min_scale` followed by the entry scale of every detail level above it, optionally
	/// bounded by `max_scale`.
	fn interesting_scales(&self, layer_id: u32, min_scale: u32, max_scale: Option<u32>) -> Vec<u32> {
		let mut scales = vec![min_scale];
		let Some(layer) = self.layer(layer_id) else {
			return scales;
		};
		let mut prev = 0u32;
		for entry in &layer.tile_scales {
			if prev > min_scale && max_scale.is_none_or(|max| prev <= max) {
				scales.push(prev);
			}
			prev = u32::from(entry.max_scale) + 1;
		}
		scales
	}
}

fn clamp_scale(scale: u32) -> u16 {
	u16::try_from(scale).unwrap_or(u16::MAX)
}

fn detail_level_or_zero(desc: &TileMapFormatDesc, layer_id: u32, scale: u16) -> u32 {
	desc.detail_level_for_scale(layer_id, scale).unwrap_or(0)
}
