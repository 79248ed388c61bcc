use gridstore::core::grid::{self, Bounds, Grid};

fn rows(lines: &[&str]) -> Grid {
    Grid::from_rows(lines.iter().map(|l| l.chars().collect()).collect())
}

#[test]
fn decode_splits_rows_and_encode_restores_text() {
    let text = "01t\nabc\nttf";
    let grid = grid::decode(text);

    assert_eq!(grid.height(), 3);
    assert_eq!(grid.width(), 3);
    assert_eq!(grid.cell(1, 2), Some('c'));
    assert_eq!(grid.cell(3, 0), None);
    assert_eq!(grid::encode(&grid), text);
}

#[test]
fn empty_text_decodes_to_zero_rows() {
    let grid = grid::decode("");
    assert_eq!(grid.height(), 0);
    assert!(grid.is_empty());
    assert_eq!(grid::encode(&grid), "");
}

#[test]
fn trim_strips_transparent_rows_and_columns_from_every_edge() {
    let grid = rows(&["tttttt", "tt0ttt", "ttt1tt", "tttttt", "tttttt"]);
    let trimmed = grid::trim_transparent_border(&grid);

    assert_eq!(trimmed, rows(&["0t", "t1"]));
}

#[test]
fn trim_keeps_interior_transparent_cells() {
    let grid = rows(&["5tt5", "tttt", "5tt5"]);
    assert_eq!(grid::trim_transparent_border(&grid), grid);
}

#[test]
fn trim_of_fully_transparent_grid_is_empty() {
    let grid = rows(&["ttt", "ttt"]);
    assert_eq!(grid::opaque_bounds(&grid), Bounds::default());
    assert!(grid::trim_transparent_border(&grid).is_empty());
}

#[test]
fn crop_applies_the_same_bounds_to_a_parallel_grid() {
    let pixels = rows(&["tttt", "t0at", "tttt"]);
    let shade = rows(&["tttt", "t34t", "tttt"]);

    let bounds = grid::opaque_bounds(&pixels);
    assert_eq!(
        bounds,
        Bounds {
            top: 1,
            bottom: 2,
            left: 1,
            right: 3
        }
    );
    assert_eq!(grid::crop(&shade, bounds), rows(&["34"]));
}
