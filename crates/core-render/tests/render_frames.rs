//! Frame composition against the in-memory surface.

use core_render::{geometry, Palette, Renderer};
use core_state::{EditorState, Focus, SearchMatch};
use core_syntax::SyntaxEngine;
use core_terminal::{MemorySurface, Surface, TerminalCaps};
use core_text::{Buffer, Position};

fn renderer() -> Renderer {
    let config = core_config_default();
    let palette = Palette::for_caps(TerminalCaps::with_colors(256), &config);
    Renderer::new(palette, true)
}

fn core_config_default() -> core_config::Config {
    core_config::Config::from_file(core_config::ConfigFile::default())
}

fn state_with(lines: &[&str]) -> EditorState {
    EditorState::new(Buffer::from_content(&lines.join("\n")))
}

#[test]
fn renders_text_with_gutter_numbers() {
    let mut surface = MemorySurface::new(10, 30);
    let mut syntax = SyntaxEngine::new();
    let state = state_with(&["alpha", "beta"]);
    renderer()
        .render(&mut surface, &state, &mut syntax)
        .unwrap();

    let row0 = surface.grid.row_text(0);
    assert!(row0.starts_with("1 alpha"), "row0 = {row0:?}");
    let row1 = surface.grid.row_text(1);
    assert!(row1.starts_with("2 beta"), "row1 = {row1:?}");
    assert_eq!(surface.flush_count, 1);
}

#[test]
fn status_bar_shows_position_language_and_mode() {
    let mut surface = MemorySurface::new(10, 60);
    let mut syntax = SyntaxEngine::new();
    let mut state = state_with(&["hello"]);
    state.language = "Rust".to_string();
    state.caret = Position::new(0, 3);
    state.buffer.set_modified(true);
    renderer()
        .render(&mut surface, &state, &mut syntax)
        .unwrap();

    let status = surface.grid.row_text(9);
    assert!(status.contains("untitled*"), "status = {status:?}");
    assert!(status.contains("Rust"));
    assert!(status.contains("utf-8"));
    assert!(status.contains("Ln 1/2"));
    assert!(status.contains("Col 4"));
    assert!(status.contains("INS"));
}

#[test]
fn separator_line_above_status() {
    let mut surface = MemorySurface::new(6, 20);
    let mut syntax = SyntaxEngine::new();
    let state = state_with(&["x"]);
    renderer()
        .render(&mut surface, &state, &mut syntax)
        .unwrap();
    let sep = surface.grid.row_text(4);
    assert!(sep.chars().all(|c| c == '─'), "sep = {sep:?}");
}

#[test]
fn error_status_paints_error_attribute() {
    let mut surface = MemorySurface::new(8, 60);
    let mut syntax = SyntaxEngine::new();
    let mut state = state_with(&["x"]);
    state.set_status("Replace error: boom");
    renderer()
        .render(&mut surface, &state, &mut syntax)
        .unwrap();
    // Error status paints bold cells on the status row.
    let attr = surface.grid.attr_at(7, 0).unwrap();
    assert!(attr.bold);
}

#[test]
fn search_matches_change_cell_attributes() {
    let mut surface = MemorySurface::new(8, 40);
    let mut syntax = SyntaxEngine::new();
    let mut state = state_with(&["foo bar foo"]);
    state.search_matches = vec![
        SearchMatch {
            row: 0,
            start_col: 0,
            end_col: 3,
        },
        SearchMatch {
            row: 0,
            start_col: 8,
            end_col: 11,
        },
    ];
    let r = renderer();
    let highlight_bg = r.palette().search_patch().bg;
    let mut r = r;
    r.render(&mut surface, &state, &mut syntax).unwrap();

    // Gutter is "1 " (two cells); match cells start at x=2.
    for x in 2..5 {
        assert_eq!(surface.grid.attr_at(0, x).unwrap().bg, highlight_bg);
    }
    // The gap between matches is unpainted.
    assert_ne!(surface.grid.attr_at(0, 6).unwrap().bg, highlight_bg);
}

#[test]
fn multi_line_selection_is_rectangular() {
    let mut surface = MemorySurface::new(10, 40);
    let mut syntax = SyntaxEngine::new();
    let mut state = state_with(&["short", "a much longer line", "mid"]);
    state
        .selection
        .set(Position::new(0, 2), Position::new(2, 1));
    state.caret = Position::new(2, 1);
    let r = renderer();
    let sel_bg = r.palette().selection_patch().bg;
    let mut r = r;
    r.render(&mut surface, &state, &mut syntax).unwrap();

    // Block width = widest line (18 cells), applied from column 0 on every
    // selected row; gutter is 2 cells wide.
    for row in 0..3 {
        assert_eq!(
            surface.grid.attr_at(row, 2).unwrap().bg,
            sel_bg,
            "row {row} col 2"
        );
        assert_eq!(
            surface.grid.attr_at(row, 2 + 17).unwrap().bg,
            sel_bg,
            "row {row} right edge"
        );
    }
    // Beyond the block width nothing is painted.
    assert_ne!(surface.grid.attr_at(0, 2 + 18).unwrap().bg, sel_bg);
}

#[test]
fn single_line_selection_covers_exact_cells() {
    let mut surface = MemorySurface::new(8, 40);
    let mut syntax = SyntaxEngine::new();
    let mut state = state_with(&["abcdef"]);
    state
        .selection
        .set(Position::new(0, 1), Position::new(0, 4));
    state.caret = Position::new(0, 4);
    let r = renderer();
    let sel_bg = r.palette().selection_patch().bg;
    let mut r = r;
    r.render(&mut surface, &state, &mut syntax).unwrap();

    assert_ne!(surface.grid.attr_at(0, 2).unwrap().bg, sel_bg); // 'a'
    for x in 3..6 {
        assert_eq!(surface.grid.attr_at(0, x).unwrap().bg, sel_bg);
    }
    assert_ne!(surface.grid.attr_at(0, 6).unwrap().bg, sel_bg);
}

#[test]
fn bracket_match_reverses_both_ends() {
    let mut surface = MemorySurface::new(8, 40);
    let mut syntax = SyntaxEngine::new();
    let mut state = state_with(&["f(abc)"]);
    state.caret = Position::new(0, 1);
    renderer()
        .render(&mut surface, &state, &mut syntax)
        .unwrap();

    // '(' at x=3 (after "1 " gutter and 'f'), ')' at x=7.
    assert!(surface.grid.attr_at(0, 3).unwrap().reverse);
    assert!(surface.grid.attr_at(0, 7).unwrap().reverse);
    assert!(!surface.grid.attr_at(0, 4).unwrap().reverse);
}

#[test]
fn cursor_follows_caret_and_hides_with_panel_focus() {
    let mut surface = MemorySurface::new(10, 40);
    let mut syntax = SyntaxEngine::new();
    let mut state = state_with(&["hello"]);
    state.caret = Position::new(0, 2);
    let mut r = renderer();
    r.render(&mut surface, &state, &mut syntax).unwrap();
    assert!(surface.cursor_visible());
    assert_eq!(surface.cursor(), (0, 4)); // gutter "1 " + col 2

    state.focus = Focus::Panel;
    r.render(&mut surface, &state, &mut syntax).unwrap();
    assert!(!surface.cursor_visible());
}

#[test]
fn horizontal_scroll_cuts_wide_glyphs_safely() {
    let mut surface = MemorySurface::new(8, 10);
    let mut syntax = SyntaxEngine::new();
    let mut state = state_with(&["漢漢漢漢漢"]);
    state.scroll_left = 1; // falls inside the first wide glyph
    renderer()
        .render(&mut surface, &state, &mut syntax)
        .unwrap();
    let row = surface.grid.row_text(0);
    // The straddled glyph is skipped entirely (its cell stays blank),
    // never half-drawn.
    assert!(!row.contains('\u{fffd}'));
    assert!(row.starts_with("1  漢"), "row = {row:?}");
}

#[test]
fn small_window_renders_notice() {
    let mut surface = MemorySurface::new(2, 30);
    let mut syntax = SyntaxEngine::new();
    let state = state_with(&["x"]);
    renderer()
        .render(&mut surface, &state, &mut syntax)
        .unwrap();
    assert!(surface.grid.row_text(0).contains("too small"));
}

#[test]
fn geometry_matches_renderer_view() {
    let state = state_with(&["x"]);
    let g = geometry(state.buffer.line_count(), 24, 80, true);
    assert_eq!(g.text_rows, 22);
    assert_eq!(g.gutter_width, 2);
}
