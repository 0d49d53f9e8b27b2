use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::{Tilemap, Vec2};

pub const NAV_BLOCKED_TILE_ID: u16 = 2;

/// Path query used by the target resolver. An empty path means unreachable.
pub trait Pathfinder {
    fn find_path(&self, from: Vec2, to: Vec2) -> Vec<Vec2>;
}

/// Open terrain: every target is one straight segment away.
#[derive(Debug, Clone, Copy, Default)]
pub struct StraightLinePathfinder;

impl Pathfinder for StraightLinePathfinder {
    fn find_path(&self, _from: Vec2, to: Vec2) -> Vec<Vec2> {
        vec![to]
    }
}

/// 4-neighbour A* over a tilemap snapshot. Tiles are addressed by their
/// row-major index; ties on cost resolve by row, column, then discovery order
/// so identical queries always produce identical paths.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPathfinder {
    width: u32,
    height: u32,
    origin: Vec2,
    walkable: Vec<bool>,
}

impl GridPathfinder {
    pub fn from_tilemap(tilemap: &Tilemap) -> Self {
        let (width, height) = (tilemap.width(), tilemap.height());
        let walkable = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| tilemap.tile_at(x, y) != Some(NAV_BLOCKED_TILE_ID))
            .collect();
        Self {
            width,
            height,
            origin: tilemap.origin(),
            walkable,
        }
    }

    fn cell_at(&self, position: Vec2) -> Option<usize> {
        let col = (position.x - self.origin.x).floor();
        let row = (position.y - self.origin.y).floor();
        let inside = (0.0..self.width as f32).contains(&col) && (0.0..self.height as f32).contains(&row);
        if !inside {
            return None;
        }
        Some(row as usize * self.width as usize + col as usize)
    }

    fn column_row(&self, cell: usize) -> (u32, u32) {
        let width = self.width as usize;
        ((cell % width) as u32, (cell / width) as u32)
    }

    fn cell_centre(&self, cell: usize) -> Vec2 {
        let (col, row) = self.column_row(cell);
        Vec2 {
            x: self.origin.x + col as f32 + 0.5,
            y: self.origin.y + row as f32 + 0.5,
        }
    }

    fn is_open(&self, cell: usize) -> bool {
        self.walkable.get(cell).copied().unwrap_or(false)
    }

    fn estimate(&self, from: usize, to: usize) -> u32 {
        let (ax, ay) = self.column_row(from);
        let (bx, by) = self.column_row(to);
        ax.abs_diff(bx).saturating_add(ay.abs_diff(by))
    }

    fn adjacent(&self, cell: usize) -> impl Iterator<Item = usize> + '_ {
        let (col, row) = self.column_row(cell);
        let width = self.width as usize;
        [
            (row + 1 < self.height).then(|| cell + width),
            (col + 1 < self.width).then(|| cell + 1),
            (row > 0).then(|| cell - width),
            (col > 0).then(|| cell - 1),
        ]
        .into_iter()
        .flatten()
        .filter(|next| self.is_open(*next))
    }

    fn search(&self, start: usize, goal: usize) -> Option<Vec<usize>> {
        if !self.is_open(start) || !self.is_open(goal) {
            return None;
        }
        if start == goal {
            return Some(vec![start]);
        }

        let mut cost_so_far = vec![u32::MAX; self.walkable.len()];
        let mut came_from = vec![None::<usize>; self.walkable.len()];
        let mut settled = vec![false; self.walkable.len()];
        let mut frontier = BinaryHeap::new();
        let mut discovered = 0u64;

        cost_so_far[start] = 0;
        frontier.push(Reverse(self.frontier_key(start, goal, 0, discovered)));

        while let Some(Reverse(key)) = frontier.pop() {
            let cell = key.cell;
            if std::mem::replace(&mut settled[cell], true) {
                continue;
            }
            if cell == goal {
                return Some(walk_back(&came_from, start, goal));
            }

            let step_cost = cost_so_far[cell].saturating_add(1);
            for next in self.adjacent(cell) {
                if settled[next] || step_cost >= cost_so_far[next] {
                    continue;
                }
                cost_so_far[next] = step_cost;
                came_from[next] = Some(cell);
                discovered += 1;
                frontier.push(Reverse(self.frontier_key(next, goal, step_cost, discovered)));
            }
        }
        None
    }

    fn frontier_key(&self, cell: usize, goal: usize, cost: u32, discovered: u64) -> FrontierKey {
        let remaining = self.estimate(cell, goal);
        let (col, row) = self.column_row(cell);
        FrontierKey {
            total: cost.saturating_add(remaining),
            remaining,
            row,
            col,
            discovered,
            cell,
        }
    }
}

impl Pathfinder for GridPathfinder {
    /// Waypoints are the centres of every tile after the start, with the exact
    /// goal position replacing the last centre.
    fn find_path(&self, from: Vec2, to: Vec2) -> Vec<Vec2> {
        let Some(cells) = self
            .cell_at(from)
            .zip(self.cell_at(to))
            .and_then(|(start, goal)| self.search(start, goal))
        else {
            return Vec::new();
        };

        let mut waypoints = cells
            .into_iter()
            .skip(1)
            .map(|cell| self.cell_centre(cell))
            .collect::<Vec<_>>();
        match waypoints.last_mut() {
            Some(last) => *last = to,
            None => waypoints.push(to),
        }
        waypoints
    }
}

// Field order is the comparison order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct FrontierKey {
    total: u32,
    remaining: u32,
    row: u32,
    col: u32,
    discovered: u64,
    cell: usize,
}

fn walk_back(came_from: &[Option<usize>], start: usize, goal: usize) -> Vec<usize> {
    let mut cells = vec![goal];
    let mut cursor = goal;
    while cursor != start {
        match came_from[cursor] {
            Some(previous) => {
                cells.push(previous);
                cursor = previous;
            }
            None => break,
        }
    }
    cells.reverse();
    cells
}
