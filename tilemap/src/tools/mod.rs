pub mod cover;
pub mod desc;
pub mod params;
pub mod tile;

#[cfg(test)]
pub mod test_utils;
