//! Derived views over the entry collection.
//!
//! Nothing here is persisted. A [`SheetLayout`] is rebuilt from whatever
//! entry list was last fetched, and rearranging it never touches the store.

use std::fmt::Write as _;

use crate::entry::Entry;
use crate::error::{Error, Result};

/// Longest link shown in the table before truncation.
const LINK_PREVIEW_CHARS: usize = 50;

/// Entries that should be shown and printed, in collection order.
#[must_use]
pub fn display_entries(entries: &[Entry]) -> Vec<Entry> {
    entries.iter().filter(|e| e.is_display()).cloned().collect()
}

/// A cell address on a printed sheet. All fields are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellPosition {
    /// Page index.
    pub page: usize,
    /// Row on the page.
    pub row: usize,
    /// Column in the row.
    pub column: usize,
}

impl CellPosition {
    /// Build a position.
    #[must_use]
    pub fn new(page: usize, row: usize, column: usize) -> Self {
        Self { page, row, column }
    }
}

/// One entry placed in one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement<'a> {
    /// Where the label goes.
    pub position: CellPosition,
    /// What goes there.
    pub entry: &'a Entry,
}

/// Assignment of display entries to sheet cells.
///
/// Cells fill row by row, then page by page. After a move a cell can be
/// empty; empty cells are skipped when printing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    columns: usize,
    rows: usize,
    slots: Vec<Option<Entry>>,
}

impl SheetLayout {
    /// Lay out the display entries of `entries` on a `columns` by `rows` grid.
    ///
    /// # Errors
    ///
    /// Returns a validation error if either dimension is zero.
    pub fn new(entries: &[Entry], columns: usize, rows: usize) -> Result<Self> {
        if columns == 0 || rows == 0 {
            return Err(Error::validation("sheet needs at least one row and column"));
        }
        Ok(Self {
            columns,
            rows,
            slots: display_entries(entries).into_iter().map(Some).collect(),
        })
    }

    /// Labels per row.
    #[must_use]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Rows per page.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Cells on one page.
    #[must_use]
    pub fn per_page(&self) -> usize {
        self.columns * self.rows
    }

    /// Number of pages needed. An empty layout has no pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.slots.len().div_ceil(self.per_page())
    }

    /// Number of placed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Whether nothing is placed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn position_of(&self, slot: usize) -> CellPosition {
        let per_page = self.per_page();
        let within = slot % per_page;
        CellPosition {
            page: slot / per_page,
            row: within / self.columns,
            column: within % self.columns,
        }
    }

    /// Cells may sit at most one page past the current last page.
    fn slot_of(&self, position: CellPosition) -> Result<usize> {
        if position.row >= self.rows || position.column >= self.columns {
            return Err(Error::validation(format!(
                "cell ({}, {}) is outside a {}x{} grid",
                position.row, position.column, self.rows, self.columns
            )));
        }
        if position.page > self.page_count() {
            return Err(Error::validation(format!(
                "page {} is past the end of a {}-page sheet",
                position.page + 1,
                self.page_count()
            )));
        }
        position
            .page
            .checked_mul(self.per_page())
            .and_then(|base| base.checked_add(position.row * self.columns + position.column))
            .ok_or_else(|| Error::validation("cell position overflows the sheet"))
    }

    /// The entry at `position`, if any.
    #[must_use]
    pub fn get(&self, position: CellPosition) -> Option<&Entry> {
        let slot = self.slot_of(position).ok()?;
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Every placed entry with its cell, in print order.
    #[must_use]
    pub fn placements(&self) -> Vec<Placement<'_>> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| {
                entry.as_ref().map(|entry| Placement {
                    position: self.position_of(slot),
                    entry,
                })
            })
            .collect()
    }

    /// Placements grouped by page. Every page up to the last is present,
    /// even if a move left it empty.
    #[must_use]
    pub fn pages(&self) -> Vec<Vec<Placement<'_>>> {
        let mut pages: Vec<Vec<Placement<'_>>> = vec![Vec::new(); self.page_count()];
        for placement in self.placements() {
            pages[placement.position.page].push(placement);
        }
        pages
    }

    /// Exchange the contents of two cells. Either may be empty.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a position is outside the grid.
    pub fn swap(&mut self, a: CellPosition, b: CellPosition) -> Result<()> {
        let (a, b) = (self.slot_of(a)?, self.slot_of(b)?);
        self.grow_to(a.max(b));
        self.slots.swap(a, b);
        self.trim();
        Ok(())
    }

    /// Move the entry at `from` to `to`, shifting the cells in between by one
    /// so order is otherwise preserved.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a position is outside the grid or `from`
    /// is empty.
    pub fn move_cell(&mut self, from: CellPosition, to: CellPosition) -> Result<()> {
        let (from, to) = (self.slot_of(from)?, self.slot_of(to)?);
        let Some(entry) = self.slots.get_mut(from).and_then(Option::take) else {
            return Err(Error::validation("cannot move an empty cell"));
        };
        self.slots.remove(from);
        self.grow_to(to.saturating_sub(1));
        self.slots.insert(to.min(self.slots.len()), Some(entry));
        self.trim();
        Ok(())
    }

    fn grow_to(&mut self, slot: usize) {
        if self.slots.len() <= slot {
            self.slots.resize(slot + 1, None);
        }
    }

    fn trim(&mut self) {
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
    }
}

fn truncate_link(link: &str) -> String {
    if link.chars().count() > LINK_PREVIEW_CHARS {
        let head: String = link.chars().take(LINK_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        link.to_string()
    }
}

/// Render display entries as a plain-text table.
#[must_use]
pub fn render_table(entries: &[Entry]) -> String {
    let shown = display_entries(entries);
    if shown.is_empty() {
        return "No entries yet.\n".to_string();
    }

    let rows: Vec<[String; 5]> = shown
        .iter()
        .map(|e| {
            [
                e.egg_id.clone(),
                e.name.clone(),
                e.cage.clone(),
                e.created_at.format("%Y-%m-%d %H:%M").to_string(),
                truncate_link(&e.link),
            ]
        })
        .collect();
    let header = ["EGG ID", "NAME", "CAGE", "CREATED", "LINK"];

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_row = |cells: &[&str]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
    };
    push_row(&header);
    for row in &rows {
        push_row(&row.each_ref().map(String::as_str));
    }
    let _ = writeln!(out, "\n{} entries", shown.len());
    out
}

/// Render a layout as text, one block per page, one cell per label.
#[must_use]
pub fn render_grid(layout: &SheetLayout) -> String {
    if layout.is_empty() {
        return "No entries yet.\n".to_string();
    }

    let cell_width = layout
        .placements()
        .iter()
        .map(|p| p.entry.egg_id.chars().count().max(p.entry.title().chars().count()))
        .max()
        .unwrap_or(0)
        .max(4);

    let mut out = String::new();
    for page in 0..layout.page_count() {
        let _ = writeln!(out, "Page {}", page + 1);
        for row in 0..layout.rows() {
            let cells: Vec<Option<&Entry>> = (0..layout.columns())
                .map(|column| layout.get(CellPosition::new(page, row, column)))
                .collect();
            if cells.iter().all(Option::is_none) {
                continue;
            }
            let egg_line: Vec<String> = cells
                .iter()
                .map(|c| format!("[{:<cell_width$}]", c.map_or("", |e| e.egg_id.as_str())))
                .collect();
            let title_line: Vec<String> = cells
                .iter()
                .map(|c| format!(" {:<cell_width$} ", c.map_or("", Entry::title)))
                .collect();
            let _ = writeln!(out, "{}", egg_line.join(" ").trim_end());
            let _ = writeln!(out, "{}", title_line.join(" ").trim_end());
        }
        out.push('\n');
    }
    out
}
