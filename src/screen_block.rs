use std::cmp;
use std::iter::FusedIterator;
use std::num::NonZeroU32;

use nalgebra::{Point2, Vector2};

use crate::geometry::{ScreenBlock, ScreenPoint, ScreenSize};

pub trait ScreenBlockExt {
    /// Block covering the whole image of the given size, starting at the origin.
    fn from_size(size: ScreenSize) -> Self;

    /// Number of pixels inside the block, zero for empty or inverted blocks.
    fn area(&self) -> u32;

    fn contains_point(&self, point: &ScreenPoint) -> bool;

    fn internal_points(&self) -> InternalPoints;

    fn spiral_tiles(&self, tile_size: NonZeroU32) -> SpiralTiles;

    /// Tiles of the block in the order they should be rendered, center first.
    fn tile_ordering(&self, tile_size: NonZeroU32) -> Vec<ScreenBlock> {
        self.spiral_tiles(tile_size).collect()
    }
}

impl ScreenBlockExt for ScreenBlock {
    fn from_size(size: ScreenSize) -> Self {
        ScreenBlock::with_size(ScreenPoint::origin(), &size)
    }

    fn area(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.width() * self.height()
        }
    }

    fn contains_point(&self, point: &ScreenPoint) -> bool {
        (self.min.x..self.max.x).contains(&point.x) && (self.min.y..self.max.y).contains(&point.y)
    }

    /// Create an iterator over coordinates (x, y) pairs inside the block,
    /// in C order (x changes first, then y)
    fn internal_points(&self) -> InternalPoints {
        if self.is_empty() {
            InternalPoints::empty()
        } else {
            InternalPoints {
                min_x: self.min.x,
                max: self.max,
                cursor: self.min,
            }
        }
    }

    /// Create an iterator over tiles in (roughly) spiral order, starting in the middle of the block.
    /// Tiles are tile_size * tile_size large, except on the bottom and right side of the
    /// block, where they are clipped if tile size doesn't evenly divide block size.
    fn spiral_tiles(&self, tile_size: NonZeroU32) -> SpiralTiles {
        if self.is_empty() {
            return SpiralTiles::empty();
        }

        let tile_size = tile_size.get();
        let size = Vector2::new(
            self.width().div_ceil(tile_size) as i32,
            self.height().div_ceil(tile_size) as i32,
        );
        let cursor = Point2::new(size.x / 2, size.y / 2);

        let dx = 2 * cursor.y - size.y;
        debug_assert!(dx == 0 || dx == -1);

        SpiralTiles {
            block: *self,
            tile_size,
            size,
            cursor,
            direction: Vector2::new(dx, -1 - dx),
            segment: 2,
            segment_remaining: 1,
            remaining: (size.x * size.y) as u32,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct InternalPoints {
    min_x: u32,
    max: ScreenPoint,
    cursor: ScreenPoint,
}

impl InternalPoints {
    fn empty() -> Self {
        InternalPoints {
            min_x: 1,
            max: ScreenPoint::origin(),
            cursor: ScreenPoint::origin(),
        }
    }
}

impl Iterator for InternalPoints {
    type Item = ScreenPoint;

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.len();
        (len, Some(len))
    }

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.y >= self.max.y {
            return None;
        }

        let ret = self.cursor;

        debug_assert!(self.cursor.x < self.max.x);
        self.cursor.x += 1;
        if self.cursor.x >= self.max.x {
            self.cursor.x = self.min_x;
            self.cursor.y += 1;
        }

        Some(ret)
    }
}

impl ExactSizeIterator for InternalPoints {
    fn len(&self) -> usize {
        if self.cursor.y >= self.max.y {
            0
        } else {
            let whole_rows = (self.max.y - self.cursor.y - 1) * (self.max.x - self.min_x);
            let current_row = self.max.x - self.cursor.x;
            (whole_rows + current_row) as usize
        }
    }
}

impl FusedIterator for InternalPoints {}

/// Iterator over (mostly) square tiles of a block in spiral order.
/// Positions inside the tile grid are in units of whole tiles.
#[derive(Copy, Clone, Debug)]
pub struct SpiralTiles {
    block: ScreenBlock,
    tile_size: u32,

    size: Vector2<i32>,
    cursor: Point2<i32>,
    direction: Vector2<i32>,

    segment: u32,
    segment_remaining: i32,
    remaining: u32,
}

impl SpiralTiles {
    fn empty() -> SpiralTiles {
        SpiralTiles {
            block: ScreenBlock::new(ScreenPoint::origin(), ScreenPoint::origin()),
            tile_size: 0,
            size: Vector2::zeros(),
            cursor: Point2::origin(),
            direction: Vector2::new(1, 0),
            segment: 0,
            segment_remaining: 0,
            remaining: 0,
        }
    }

    /// Turns 90 degrees and starts a new segment, segments get longer every second turn.
    fn next_segment(&mut self) {
        self.direction = Vector2::new(self.direction.y, -self.direction.x);
        self.segment += 1;
        self.segment_remaining = (self.segment / 2) as i32;
    }

    fn in_grid(&self, position: &Point2<i32>) -> bool {
        (0..self.size.x).contains(&position.x) && (0..self.size.y).contains(&position.y)
    }

    fn current_tile(&self) -> ScreenBlock {
        let min = self.block.min + self.cursor.coords.map(|c| c as u32) * self.tile_size;
        let max = ScreenPoint::new(
            cmp::min(self.block.max.x, min.x + self.tile_size),
            cmp::min(self.block.max.y, min.y + self.tile_size),
        );
        let tile = ScreenBlock::new(min, max);
        debug_assert!(!tile.is_empty());
        tile
    }
}

impl Iterator for SpiralTiles {
    type Item = ScreenBlock;

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let ret = self.current_tile();

        if self.segment_remaining == 0 {
            self.next_segment();
        }

        let new_cursor = self.cursor + self.direction;
        self.segment_remaining -= 1;

        if self.in_grid(&new_cursor) {
            self.cursor = new_cursor;
        } else {
            // Stepped outside the grid. The rest of this segment and the whole next one
            // are outside too, so skip over the next segment and turn again.
            self.next_segment();
            self.cursor += self.direction * self.segment_remaining;
            // segment_remaining of the new segment is too large now, but the next time it
            // runs out we end up in this branch again.
            self.next_segment();
        }

        self.remaining -= 1;

        Some(ret)
    }
}

impl ExactSizeIterator for SpiralTiles {
    fn len(&self) -> usize {
        self.remaining as usize
    }
}

impl FusedIterator for SpiralTiles {}
