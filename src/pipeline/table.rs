//! Line-based table detection over page geometry.
//!
//! Payroll exports draw their summary sheet as a fully ruled grid: every
//! column and row boundary is a stroked line. Detection therefore works from
//! the page's drawn rule lines rather than from whitespace analysis:
//!
//! 1. classify near-axis-aligned path segments as vertical or horizontal
//!    rules;
//! 2. snap rules whose positions differ by less than the snap tolerance into
//!    one boundary, and join collinear fragments separated by less than the
//!    join tolerance;
//! 3. form the grid from the surviving boundaries and assign each text glyph
//!    to the cell containing its midpoint.
//!
//! This is deliberately not a general-purpose table extractor; the
//! tolerances and the single-grid-per-page assumption are tuned for this
//! document family. Rows that do not look like employee rows are discarded
//! downstream by [`crate::pipeline::chunk`].

use tracing::trace;

/// Fraction of the longest boundary span a candidate must cover to survive.
/// Short decorative strokes (header flourishes, signature lines) fall below
/// this and are discarded.
const MIN_SPAN_RATIO: f32 = 0.5;

/// Word-gap threshold inside a cell, as a fraction of the median glyph width.
const SPACE_GAP_RATIO: f32 = 0.3;

/// A stroked line segment from the page's path objects, in page points.
/// PDF coordinates: origin bottom-left, y grows upward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleLine {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// A positioned character from the page's text layer.
///
/// `x` is the left edge, `y` the vertical midpoint of the glyph box.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

/// Everything table detection needs from one page.
#[derive(Debug, Clone, Default)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub rules: Vec<RuleLine>,
    pub glyphs: Vec<Glyph>,
}

/// Layout tuning knobs, taken from [`crate::config::AuditConfig`].
#[derive(Debug, Clone, Copy)]
pub struct LayoutSettings {
    /// Rules whose positions differ by no more than this collapse into one
    /// boundary (page points).
    pub snap_tolerance: f32,
    /// Collinear fragments separated by no more than this count as one
    /// continuous line (page points).
    pub join_tolerance: f32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            snap_tolerance: 3.0,
            join_tolerance: 3.0,
        }
    }
}

/// A detected grid: rows of cell texts, top-to-bottom, left-to-right.
pub type TableRows = Vec<Vec<String>>;

/// Detect the ruled grid on a page and return its rows.
///
/// Returns `None` when the page has no grid (fewer than two boundaries on
/// either axis after snapping), which is the normal case for cover and
/// signature pages.
pub fn detect_table(geometry: &PageGeometry, settings: &LayoutSettings) -> Option<TableRows> {
    let mut vertical = Vec::new();
    let mut horizontal = Vec::new();

    for rule in &geometry.rules {
        let dx = (rule.x1 - rule.x0).abs();
        let dy = (rule.y1 - rule.y0).abs();
        if dx <= settings.snap_tolerance && dy > settings.snap_tolerance {
            // Vertical: position on x, extent on y.
            vertical.push(Segment {
                position: (rule.x0 + rule.x1) / 2.0,
                lo: rule.y0.min(rule.y1),
                hi: rule.y0.max(rule.y1),
            });
        } else if dy <= settings.snap_tolerance && dx > settings.snap_tolerance {
            horizontal.push(Segment {
                position: (rule.y0 + rule.y1) / 2.0,
                lo: rule.x0.min(rule.x1),
                hi: rule.x0.max(rule.x1),
            });
        }
        // Diagonal or dot-sized strokes are not grid rules.
    }

    let mut xs = snap_boundaries(vertical, settings);
    let mut ys = snap_boundaries(horizontal, settings);

    if xs.len() < 2 || ys.len() < 2 {
        return None;
    }

    xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    // Top row first: PDF y grows upward.
    ys.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    trace!(
        columns = xs.len() - 1,
        rows = ys.len() - 1,
        "grid boundaries resolved"
    );

    Some(fill_cells(&xs, &ys, &geometry.glyphs))
}

// ── Boundary snapping ────────────────────────────────────────────────────

struct Segment {
    position: f32,
    lo: f32,
    hi: f32,
}

/// Collapse segments into boundary positions.
///
/// Segments within `snap_tolerance` of each other form one cluster; within a
/// cluster, fragments whose gaps are at most `join_tolerance` merge into
/// continuous spans. A cluster survives only if its longest span covers at
/// least [`MIN_SPAN_RATIO`] of the longest span on the axis.
fn snap_boundaries(mut segments: Vec<Segment>, settings: &LayoutSettings) -> Vec<f32> {
    if segments.is_empty() {
        return Vec::new();
    }

    segments.sort_by(|a, b| {
        a.position
            .partial_cmp(&b.position)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut clusters: Vec<Vec<Segment>> = Vec::new();
    for segment in segments {
        let starts_new = clusters
            .last()
            .and_then(|cluster| cluster.last())
            .map(|previous| segment.position - previous.position > settings.snap_tolerance)
            .unwrap_or(true);
        if starts_new {
            clusters.push(vec![segment]);
        } else {
            clusters.last_mut().expect("cluster exists").push(segment);
        }
    }

    let spans: Vec<(f32, f32)> = clusters
        .iter()
        .map(|cluster| {
            let position =
                cluster.iter().map(|s| s.position).sum::<f32>() / cluster.len() as f32;
            (position, longest_joined_span(cluster, settings.join_tolerance))
        })
        .collect();

    let max_span = spans.iter().map(|(_, span)| *span).fold(0.0_f32, f32::max);
    if max_span <= 0.0 {
        return Vec::new();
    }

    spans
        .into_iter()
        .filter(|(_, span)| *span >= MIN_SPAN_RATIO * max_span)
        .map(|(position, _)| position)
        .collect()
}

/// Merge a cluster's fragments along their extent axis, bridging gaps of at
/// most `join_tolerance`, and return the longest continuous span.
fn longest_joined_span(cluster: &[Segment], join_tolerance: f32) -> f32 {
    let mut intervals: Vec<(f32, f32)> = cluster.iter().map(|s| (s.lo, s.hi)).collect();
    intervals.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut longest = 0.0_f32;
    let mut current: Option<(f32, f32)> = None;

    for (lo, hi) in intervals {
        match current {
            Some((clo, chi)) if lo - chi <= join_tolerance => {
                current = Some((clo, chi.max(hi)));
            }
            _ => {
                if let Some((clo, chi)) = current {
                    longest = longest.max(chi - clo);
                }
                current = Some((lo, hi));
            }
        }
    }
    if let Some((clo, chi)) = current {
        longest = longest.max(chi - clo);
    }

    longest
}

// ── Cell assignment ──────────────────────────────────────────────────────

/// Assign glyphs to grid cells by midpoint and render each cell's text.
fn fill_cells(xs: &[f32], ys: &[f32], glyphs: &[Glyph]) -> TableRows {
    let columns = xs.len() - 1;
    let rows = ys.len() - 1;
    let mut cells: Vec<Vec<Vec<&Glyph>>> = vec![vec![Vec::new(); columns]; rows];

    for glyph in glyphs {
        let center_x = glyph.x + glyph.width / 2.0;
        let column = xs.partition_point(|&x| x <= center_x);
        if column == 0 || column > columns {
            continue;
        }
        let row = ys.partition_point(|&y| y > glyph.y);
        if row == 0 || row > rows {
            continue;
        }
        cells[row - 1][column - 1].push(glyph);
    }

    let median_width = median_glyph_width(glyphs);
    let space_gap = (median_width * SPACE_GAP_RATIO).max(0.8);

    cells
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| render_cell(cell, space_gap))
                .collect()
        })
        .collect()
}

fn median_glyph_width(glyphs: &[Glyph]) -> f32 {
    let mut widths: Vec<f32> = glyphs
        .iter()
        .map(|g| g.width)
        .filter(|w| *w > 0.0)
        .collect();
    if widths.is_empty() {
        return 4.0;
    }
    widths.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    widths[widths.len() / 2]
}

/// Order a cell's glyphs into reading order and join them, inserting a space
/// at word-sized horizontal gaps. Wrapped lines inside one cell are joined
/// with a single space.
fn render_cell(mut cell: Vec<&Glyph>, space_gap: f32) -> String {
    if cell.is_empty() {
        return String::new();
    }

    // Quantise y so glyphs on the same visual line sort together, then read
    // left to right.
    let line_of = |g: &Glyph| -(g.y / 4.0).round() as i32;
    cell.sort_by(|a, b| {
        line_of(a)
            .cmp(&line_of(b))
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut text = String::new();
    let mut previous: Option<&Glyph> = None;
    for glyph in cell {
        if let Some(prev) = previous {
            if line_of(prev) != line_of(glyph) {
                text.push(' ');
            } else if glyph.x - (prev.x + prev.width) > space_gap {
                text.push(' ');
            }
        }
        if !glyph.ch.is_control() {
            text.push(glyph.ch);
        }
        previous = Some(glyph);
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hline(y: f32, x0: f32, x1: f32) -> RuleLine {
        RuleLine { x0, y0: y, x1, y1: y }
    }

    fn vline(x: f32, y0: f32, y1: f32) -> RuleLine {
        RuleLine { x0: x, y0, x1: x, y1 }
    }

    fn word(text: &str, x: f32, y: f32) -> Vec<Glyph> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| Glyph {
                ch,
                x: x + i as f32 * 5.0,
                y,
                width: 4.0,
            })
            .collect()
    }

    /// 2 columns x 2 rows: boundaries at x {10, 100, 200}, y {700, 650, 600}.
    fn grid_geometry() -> PageGeometry {
        let mut geometry = PageGeometry {
            width: 595.0,
            height: 842.0,
            ..Default::default()
        };
        for &y in &[700.0, 650.0, 600.0] {
            geometry.rules.push(hline(y, 10.0, 200.0));
        }
        for &x in &[10.0, 100.0, 200.0] {
            geometry.rules.push(vline(x, 600.0, 700.0));
        }
        geometry
    }

    #[test]
    fn detects_simple_grid() {
        let mut geometry = grid_geometry();
        geometry.glyphs.extend(word("1", 20.0, 675.0));
        geometry.glyphs.extend(word("Ali", 110.0, 675.0));
        geometry.glyphs.extend(word("2", 20.0, 625.0));
        geometry.glyphs.extend(word("Veli", 110.0, 625.0));

        let rows = detect_table(&geometry, &LayoutSettings::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["1", "Ali"]);
        assert_eq!(rows[1], vec!["2", "Veli"]);
    }

    #[test]
    fn snaps_nearby_rules_into_one_boundary() {
        let mut geometry = grid_geometry();
        // A second stroke 1.5pt from an existing boundary must not create a
        // phantom column.
        geometry.rules.push(vline(101.5, 600.0, 700.0));
        geometry.glyphs.extend(word("x", 110.0, 675.0));

        let rows = detect_table(&geometry, &LayoutSettings::default()).unwrap();
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn joins_fragmented_lines() {
        let mut geometry = grid_geometry();
        geometry.rules.retain(|r| *r != vline(200.0, 600.0, 700.0));
        // Right border drawn as two fragments with a 2pt gap.
        geometry.rules.push(vline(200.0, 600.0, 648.0));
        geometry.rules.push(vline(200.0, 650.0, 700.0));
        geometry.glyphs.extend(word("a", 110.0, 675.0));

        let rows = detect_table(&geometry, &LayoutSettings::default()).unwrap();
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn short_decorative_strokes_are_dropped() {
        let mut geometry = grid_geometry();
        // A 12pt underline elsewhere on the page is not a column boundary.
        geometry.rules.push(vline(300.0, 688.0, 700.0));
        geometry.glyphs.extend(word("a", 110.0, 675.0));

        let rows = detect_table(&geometry, &LayoutSettings::default()).unwrap();
        assert_eq!(rows[0].len(), 2, "short stroke must not add a column");
    }

    #[test]
    fn glyphs_outside_grid_are_ignored() {
        let mut geometry = grid_geometry();
        geometry.glyphs.extend(word("Bordro", 250.0, 750.0));
        geometry.glyphs.extend(word("in", 20.0, 675.0));

        let rows = detect_table(&geometry, &LayoutSettings::default()).unwrap();
        assert_eq!(rows[0][0], "in");
        assert!(rows.iter().flatten().all(|cell| !cell.contains("Bordro")));
    }

    #[test]
    fn word_gaps_become_spaces() {
        let mut geometry = grid_geometry();
        let mut glyphs = word("Ayşe", 105.0, 675.0);
        glyphs.extend(word("Yılmaz", 135.0, 675.0));
        geometry.glyphs = glyphs;

        let rows = detect_table(&geometry, &LayoutSettings::default()).unwrap();
        assert_eq!(rows[0][1], "Ayşe Yılmaz");
    }

    #[test]
    fn pages_without_grid_yield_none() {
        let geometry = PageGeometry {
            width: 595.0,
            height: 842.0,
            rules: vec![hline(700.0, 10.0, 200.0)],
            glyphs: word("Bordro İcmali", 50.0, 720.0),
        };
        assert!(detect_table(&geometry, &LayoutSettings::default()).is_none());
    }
}
