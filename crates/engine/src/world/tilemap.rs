use thiserror::Error;

use super::Vec2;

/// Row-major terrain grid; tile `(x, y)` covers the unit square at `origin + (x, y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tilemap {
    width: u32,
    height: u32,
    origin: Vec2,
    tiles: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TilemapError {
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error("tilemap must be at least 1x1, got {width}x{height}")]
    Empty { width: u32, height: u32 },
}

impl Tilemap {
    pub fn new(
        width: u32,
        height: u32,
        origin: Vec2,
        tiles: Vec<u16>,
    ) -> Result<Self, TilemapError> {
        if width == 0 || height == 0 {
            return Err(TilemapError::Empty { width, height });
        }
        let expected = width as usize * height as usize;
        let actual = tiles.len();
        if expected != actual {
            return Err(TilemapError::TileCountMismatch { expected, actual });
        }
        Ok(Self {
            width,
            height,
            origin,
            tiles,
        })
    }

    pub fn filled(width: u32, height: u32, origin: Vec2, tile_id: u16) -> Result<Self, TilemapError> {
        Self::new(
            width,
            height,
            origin,
            vec![tile_id; width as usize * height as usize],
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile_at(&self, x: u32, y: u32) -> Option<u16> {
        self.index_of(x, y)
            .and_then(|index| self.tiles.get(index).copied())
    }

    pub fn set_tile(&mut self, x: u32, y: u32, tile_id: u16) -> bool {
        match self.index_of(x, y) {
            Some(index) => {
                self.tiles[index] = tile_id;
                true
            }
            None => false,
        }
    }
}
