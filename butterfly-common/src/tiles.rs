//! Tile addressing - Web-Mercator slippy-map grid at a fixed zoom level
//!
//! The tile index `y * 2^zoom + x` doubles as the tile id stored in every
//! `VertexId` and `EdgeId`. Only coordinate → tile lookups need the
//! projection; id lookups never do.

use std::f64::consts::PI;

/// Zoom level used when none is configured
pub const DEFAULT_ZOOM: u8 = 14;

/// Highest supported zoom; keeps `y * 2^zoom + x` inside a `u32`
pub const MAX_ZOOM: u8 = 16;

/// Latitude limit of the Web-Mercator projection
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Geographic bounds of a tile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl TileBounds {
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon < self.max_lon && lat > self.min_lat && lat <= self.max_lat
    }
}

/// Tile coordinates at a given zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileId {
    /// Tile containing the given location
    ///
    /// Longitudes are wrapped to the grid, latitudes clamped to the
    /// projection's range, so every input maps to a tile inside the grid.
    pub fn from_location(lon: f64, lat: f64, zoom: u8) -> Self {
        debug_assert!(zoom <= MAX_ZOOM, "zoom {zoom} exceeds {MAX_ZOOM}");
        let n = 1u64 << zoom;
        let max_index = (n - 1) as f64;

        // 180 and beyond wrap around to the western edge of the grid
        let wrapped = (lon + 180.0).rem_euclid(360.0);
        let x = (wrapped / 360.0 * n as f64).floor().clamp(0.0, max_index);

        let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n as f64)
            .floor()
            .clamp(0.0, max_index);

        Self {
            x: x as u32,
            y: y as u32,
            zoom,
        }
    }

    /// Tile for a previously computed tile id
    pub fn from_id(id: u32, zoom: u8) -> Self {
        let n = 1u32 << zoom;
        Self {
            x: id % n,
            y: id / n,
            zoom,
        }
    }

    /// Tile index used as `tile_id`
    pub fn id(&self) -> u32 {
        self.y * (1u32 << self.zoom) + self.x
    }

    /// Geographic bounds (north-west corner is the tile origin)
    pub fn bounds(&self) -> TileBounds {
        let (min_lon, max_lat) = tile_corner(self.x, self.y, self.zoom);
        let (max_lon, min_lat) = tile_corner(self.x + 1, self.y + 1, self.zoom);
        TileBounds {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }
}

fn tile_corner(x: u32, y: u32, zoom: u8) -> (f64, f64) {
    let n = (1u64 << zoom) as f64;
    let lon = x as f64 / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan().to_degrees();
    (lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_locations_map_to_known_tiles() {
        // Leuven
        let tile = TileId::from_location(4.7868, 50.8546, 14);
        assert_eq!((tile.x, tile.y), (8409, 5495));
        assert_eq!(tile.id(), 90_038_489);

        // Brussels, same row, different column
        let brussels = TileId::from_location(4.3517, 50.8503, 14);
        assert_eq!(brussels.id(), 90_038_470);

        // Antwerp
        let antwerp = TileId::from_location(4.4025, 51.2194, 14);
        assert_eq!(antwerp.id(), 89_612_488);

        let origin = TileId::from_location(0.0, 0.0, 14);
        assert_eq!((origin.x, origin.y), (8192, 8192));
    }

    #[test]
    fn id_round_trips() {
        let tile = TileId::from_location(4.7868, 50.8546, 14);
        assert_eq!(TileId::from_id(tile.id(), 14), tile);
    }

    #[test]
    fn out_of_range_input_stays_inside_grid() {
        let north = TileId::from_location(179.999, 89.9, 14);
        assert_eq!(north.x, (1 << 14) - 1);
        assert_eq!(north.y, 0);

        let south = TileId::from_location(-180.0, -89.9, 14);
        assert_eq!(south.x, 0);
        assert_eq!(south.y, (1 << 14) - 1);
    }

    #[test]
    fn longitudes_wrap_around_the_antimeridian() {
        let east = TileId::from_location(190.0, 10.0, 14);
        assert_eq!(east, TileId::from_location(-170.0, 10.0, 14));
        assert_eq!(TileId::from_location(180.0, 10.0, 14).x, 0);
        assert_eq!(
            TileId::from_location(-364.7868, 50.8546, 14),
            TileId::from_location(-4.7868, 50.8546, 14)
        );
    }

    #[test]
    fn bounds_contain_the_location() {
        let (lon, lat) = (4.7868, 50.8546);
        let tile = TileId::from_location(lon, lat, 14);
        let bounds = tile.bounds();

        assert!(bounds.min_lon < bounds.max_lon);
        assert!(bounds.min_lat < bounds.max_lat);
        assert!(bounds.contains(lon, lat));
        assert!(!bounds.contains(lon + 1.0, lat));
    }

    #[test]
    fn zoom_zero_is_a_single_tile() {
        assert_eq!(TileId::from_location(120.0, -40.0, 0).id(), 0);
    }
}
