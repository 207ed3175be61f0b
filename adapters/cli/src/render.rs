use std::collections::HashSet;

use maze_rescue_core::{CellCoord, Damage, Direction};
use maze_rescue_world::{query, Maze};

/// Draws the maze as ASCII art.
///
/// Each cell is three characters wide. A wall is drawn when either cell on
/// its sides observed it. Cells on `route` are marked with `*` unless they
/// hold a survivor or the entrance.
pub(crate) fn render(maze: &Maze, route: &[CellCoord]) -> String {
    let (columns, rows) = query::dimensions(maze);
    let on_route: HashSet<CellCoord> = route.iter().copied().collect();
    let mut out = String::new();

    for row in 0..rows {
        for column in 0..columns {
            let cell = CellCoord::new(column, row);
            out.push('+');
            out.push_str(if has_wall(maze, cell, Direction::North) {
                "---"
            } else {
                "   "
            });
        }
        out.push_str("+\n");

        for column in 0..columns {
            let cell = CellCoord::new(column, row);
            out.push(if has_wall(maze, cell, Direction::West) {
                '|'
            } else {
                ' '
            });
            out.push(' ');
            out.push(glyph(maze, cell, on_route.contains(&cell)));
            out.push(' ');
        }
        let last = CellCoord::new(columns.saturating_sub(1), row);
        out.push(if has_wall(maze, last, Direction::East) {
            '|'
        } else {
            ' '
        });
        out.push('\n');
    }

    for column in 0..columns {
        let cell = CellCoord::new(column, rows.saturating_sub(1));
        out.push('+');
        out.push_str(if has_wall(maze, cell, Direction::South) {
            "---"
        } else {
            "   "
        });
    }
    out.push_str("+\n");
    out
}

/// Legend matching the glyphs produced by [`render`].
pub(crate) const LEGEND: &str =
    "S survivor  E entrance  # severe  ~ light  . clear  * route  ? unexplored";

fn has_wall(maze: &Maze, cell: CellCoord, direction: Direction) -> bool {
    let (columns, rows) = query::dimensions(maze);
    let own = query::cell(maze, cell).is_some_and(|state| state.walls().blocks(direction));
    let neighbour = direction
        .neighbor(cell, columns, rows)
        .and_then(|next| query::cell(maze, next))
        .is_some_and(|state| state.walls().blocks(direction.opposite()));
    own || neighbour
}

fn glyph(maze: &Maze, coord: CellCoord, on_route: bool) -> char {
    let Some(cell) = query::cell(maze, coord) else {
        return ' ';
    };
    if cell.has_survivor() {
        return 'S';
    }
    if coord == query::entrance(maze) {
        return 'E';
    }
    if on_route {
        return '*';
    }
    if !cell.is_explored() {
        return '?';
    }
    match cell.damage() {
        Damage::Severe => '#',
        Damage::Light => '~',
        Damage::Clear => '.',
        Damage::Unknown => ' ',
    }
}
