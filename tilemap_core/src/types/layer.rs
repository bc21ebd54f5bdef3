use super::{ACP_LAYER, EVENT_LAYER, MAP_LAYER, POI_LAYER, ROUTE_LAYER, TRAFFIC_LAYER};
use enumset::{EnumSet, EnumSetType};
use std::fmt::Display;

/// The layers a viewer can switch on and off.
///
/// A set of them is the layer selection handed to parameter generation.
#[derive(Debug, EnumSetType, PartialOrd, Ord, Hash)]
pub enum Layer {
	Map,
	Route,
	Poi,
	Traffic,
	Acp,
	Event,
}

impl Layer {
	/// Layer id as used in addresses and format descriptions.
	pub fn id(self) -> u32 {
		match self {
			Layer::Map => MAP_LAYER,
			Layer::Route => ROUTE_LAYER,
			Layer::Poi => POI_LAYER,
			Layer::Traffic => TRAFFIC_LAYER,
			Layer::Acp => ACP_LAYER,
			Layer::Event => EVENT_LAYER,
		}
	}

	pub fn from_id(id: u32) -> Option<Layer> {
		EnumSet::<Layer>::all().iter().find(|layer| layer.id() == id)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Layer::Map => "map",
			Layer::Route => "route",
			Layer::Poi => "poi",
			Layer::Traffic => "traffic",
			Layer::Acp => "acp",
			Layer::Event => "event",
		}
	}
}

impl Display for Layer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ids_round_trip() {
		for layer in EnumSet::<Layer>::all() {
			assert_eq!(Layer::from_id(layer.id()), Some(layer));
		}
		assert_eq!(Layer::from_id(9), None);
	}

	#[test]
	fn set_iterates_in_id_order() {
		let layers = Layer::Poi | Layer::Map | Layer::Event;
		let ids: Vec<u32> = layers.iter().map(Layer::id).collect();
		assert_eq!(ids, vec![MAP_LAYER, POI_LAYER, EVENT_LAYER]);
	}
}
