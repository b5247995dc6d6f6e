use crate::error::{AppError, Result};

/// Canonical analysis canvas and the cell size it is partitioned into.
///
/// Cells are enumerated column-major: the outer loop walks the column origins
/// left to right, the inner loop walks the row origins top to bottom. Cell `k`
/// therefore sits in column `k / rows()` and row `k % rows()`. Feature vectors
/// are laid out in this order, so it must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    canvas_width: u32,
    canvas_height: u32,
    cell_width: u32,
    cell_height: u32,
}

/// Top-left corner of one grid cell on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellOrigin {
    pub x: u32,
    pub y: u32,
}

impl GridLayout {
    /// 480x840 canvas, 40x40 cells: 12 columns, 21 rows, 252 cells.
    pub const CANONICAL: GridLayout = GridLayout {
        canvas_width: 480,
        canvas_height: 840,
        cell_width: 40,
        cell_height: 40,
    };

    /// Rejects empty sizes and canvases that are not exact multiples of the
    /// cell size.
    pub fn new(canvas_width: u32, canvas_height: u32, cell_width: u32, cell_height: u32) -> Result<Self> {
        if canvas_width == 0 || canvas_height == 0 || cell_width == 0 || cell_height == 0 {
            return Err(AppError::Configuration(format!(
                "grid dimensions must be non-zero: canvas {canvas_width}x{canvas_height}, cell {cell_width}x{cell_height}"
            )));
        }
        if canvas_width % cell_width != 0 || canvas_height % cell_height != 0 {
            return Err(AppError::Configuration(format!(
                "canvas {canvas_width}x{canvas_height} is not divisible into {cell_width}x{cell_height} cells"
            )));
        }
        Ok(Self {
            canvas_width,
            canvas_height,
            cell_width,
            cell_height,
        })
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.canvas_width, self.canvas_height)
    }

    pub fn cell_size(&self) -> (u32, u32) {
        (self.cell_width, self.cell_height)
    }

    pub fn columns(&self) -> u32 {
        self.canvas_width / self.cell_width
    }

    pub fn rows(&self) -> u32 {
        self.canvas_height / self.cell_height
    }

    pub fn cell_count(&self) -> usize {
        self.columns() as usize * self.rows() as usize
    }

    /// Two counts per cell: pathway, then player.
    pub fn feature_len(&self) -> usize {
        2 * self.cell_count()
    }

    pub fn cell_area(&self) -> u32 {
        self.cell_width * self.cell_height
    }

    /// Cell origins in feature-vector order (column-major).
    pub fn cells(&self) -> impl Iterator<Item = CellOrigin> + '_ {
        let (cw, ch) = (self.cell_width, self.cell_height);
        (0..self.columns()).flat_map(move |col| {
            (0..self.rows()).map(move |row| CellOrigin {
                x: col * cw,
                y: row * ch,
            })
        })
    }

    /// Position of the cell at (`column`, `row`) within one half of the vector.
    pub fn cell_index(&self, column: u32, row: u32) -> usize {
        column as usize * self.rows() as usize + row as usize
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        Self::CANONICAL
    }
}
