//! Quadkey tiling
//!
//! Bing-scheme map tiles: a (lat, lon, zoom) triple maps to a base-4 string
//! of length `zoom`, one digit per zoom level.

/// Latitude bounds of the Web Mercator projection
const MIN_LATITUDE: f64 = -85.05112878;
const MAX_LATITUDE: f64 = 85.05112878;
const MIN_LONGITUDE: f64 = -180.0;
const MAX_LONGITUDE: f64 = 180.0;

/// Quadkey of the tile containing (lat, lon) at the given zoom level.
pub fn quadkey(latitude: f64, longitude: f64, zoom: u8) -> String {
    let (tile_x, tile_y) = tile_xy(latitude, longitude, zoom);

    let mut key = String::with_capacity(zoom as usize);
    for i in (1..=zoom).rev() {
        let mask = 1u32 << (i - 1);
        let mut digit = 0u8;
        if tile_x & mask != 0 {
            digit += 1;
        }
        if tile_y & mask != 0 {
            digit += 2;
        }
        key.push((b'0' + digit) as char);
    }
    key
}

/// Tile coordinates at the given zoom level.
fn tile_xy(latitude: f64, longitude: f64, zoom: u8) -> (u32, u32) {
    let lat = latitude.clamp(MIN_LATITUDE, MAX_LATITUDE);
    let lon = longitude.clamp(MIN_LONGITUDE, MAX_LONGITUDE);

    let x = (lon + 180.0) / 360.0;
    let sin_lat = (lat * std::f64::consts::PI / 180.0).sin();
    let y = 0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * std::f64::consts::PI);

    let map_size = (1u32 << zoom) as f64;
    let max_tile = (1u32 << zoom) - 1;
    let tile_x = ((x * map_size) as u32).min(max_tile);
    let tile_y = ((y * map_size) as u32).min(max_tile);
    (tile_x, tile_y)
}
