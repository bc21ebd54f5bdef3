use anyhow::{Context, Result, bail};
use std::fmt::{Debug, Display};
use std::str::FromStr;

/// Identifies a calculated route. Only addresses on the route layer carry one.
///
/// The wire form is two 32-bit fields, id first. The text form is `"<id>_<time>"` in
/// uppercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId {
	pub id: u32,
	pub create_time: u32,
}

impl RouteId {
	#[must_use]
	pub const fn new(id: u32, create_time: u32) -> RouteId {
		RouteId { id, create_time }
	}

	/// The placeholder value used before a route has been calculated.
	#[must_use]
	pub const fn invalid() -> RouteId {
		RouteId {
			id: u32::MAX,
			create_time: u32::MAX,
		}
	}

	pub fn is_valid(&self) -> bool {
		*self != RouteId::invalid()
	}
}

impl Display for RouteId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:X}_{:X}", self.id, self.create_time)
	}
}

impl Debug for RouteId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "RouteId({self})")
	}
}

impl FromStr for RouteId {
	type Err = anyhow::Error;

	fn from_str(text: &str) -> Result<Self> {
		let Some((id, time)) = text.split_once('_') else {
			bail!("route id {text:?} must look like <id>_<time>");
		};
		Ok(RouteId {
			id: u32::from_str_radix(id, 16).with_context(|| format!("bad route id part {id:?}"))?,
			create_time: u32::from_str_radix(time, 16).with_context(|| format!("bad route time part {time:?}"))?,
		})
	}
}
