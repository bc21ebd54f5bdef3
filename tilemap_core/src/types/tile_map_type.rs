use std::fmt::Display;

/// The two kinds of tile that share one address: geometry and the strings for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TileMapType {
	Data,
	Strings,
}

impl TileMapType {
	/// Leading character of the address string.
	pub fn tag(&self) -> char {
		match self {
			TileMapType::Data => 'G',
			TileMapType::Strings => 'T',
		}
	}

	pub fn from_tag(tag: char) -> Option<TileMapType> {
		match tag {
			'G' => Some(TileMapType::Data),
			'T' => Some(TileMapType::Strings),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &str {
		match self {
			TileMapType::Data => "data",
			TileMapType::Strings => "strings",
		}
	}
}

impl Display for TileMapType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
