//! Extracts ordered boundary polygons from a binarized 2-D probability map
//! via connected-component labeling followed by Moore-neighborhood boundary
//! following (Suzuki-Abe style outer contours; holes are ignored).

use crate::geometry::{Point, Polygon};

/// Thresholds a raw probability map into a `{0,1}` binary map.
pub fn binarize(prob_map: &[f32], threshold: f32) -> Vec<u8> {
    prob_map
        .iter()
        .map(|&v| if v >= threshold { 1 } else { 0 })
        .collect()
}

/// Traces the outer boundary of every 8-connected foreground component in
/// `binary` (row-major, `width * height` long). Components whose traced
/// boundary has fewer than `min_boundary_pixels` points are discarded before
/// they reach the caller.
pub fn trace_boundaries(
    binary: &[u8],
    width: usize,
    height: usize,
    min_boundary_pixels: usize,
) -> Vec<Polygon> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let (labels, starts) = label_components(binary, width, height);

    let mut polygons = Vec::new();
    for (label, start) in starts.into_iter().enumerate() {
        let boundary = moore_trace(&labels, width, height, label as i32 + 1, start);
        if boundary.len() < min_boundary_pixels || boundary.len() < 3 {
            continue;
        }
        if let Ok(poly) = Polygon::new(boundary) {
            polygons.push(poly);
        }
    }
    polygons
}

/// 8-connected flood-fill labeling. Returns per-pixel labels (0 = background,
/// 1-based foreground labels) and, for each label, the first pixel
/// encountered in raster order (guaranteed to have a background west
/// neighbor, making it a valid Moore-tracing start point).
fn label_components(binary: &[u8], width: usize, height: usize) -> (Vec<i32>, Vec<(i32, i32)>) {
    let mut labels = vec![0i32; width * height];
    let mut starts = Vec::new();
    let mut next_label = 1i32;

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            if binary[idx] == 0 || labels[idx] != 0 {
                continue;
            }
            let label = next_label;
            next_label += 1;
            starts.push((x as i32, y as i32));

            let mut stack = vec![(x as i32, y as i32)];
            labels[idx] = label;
            while let Some((cx, cy)) = stack.pop() {
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = cx + dx;
                        let ny = cy + dy;
                        if nx < 0 || ny < 0 || nx as usize >= width || ny as usize >= height {
                            continue;
                        }
                        let nidx = ny as usize * width + nx as usize;
                        if binary[nidx] != 0 && labels[nidx] == 0 {
                            labels[nidx] = label;
                            stack.push((nx, ny));
                        }
                    }
                }
            }
        }
    }
    (labels, starts)
}

const DIRS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];
const WEST_DIR_INDEX: usize = 6;

/// Moore-neighborhood boundary trace starting at `start`, which must have a
/// background west neighbor (true for the first raster-order pixel of a
/// component). Terminates when the walk returns to the start pixel.
fn moore_trace(
    labels: &[i32],
    width: usize,
    height: usize,
    label: i32,
    start: (i32, i32),
) -> Vec<Point> {
    let is_fg = |x: i32, y: i32| -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < width
            && (y as usize) < height
            && labels[y as usize * width + x as usize] == label
    };

    let mut boundary = vec![start];
    let mut current = start;
    let mut backtrack_dir = WEST_DIR_INDEX;
    let max_steps = width * height * 4 + 8;

    loop {
        let mut found = None;
        for k in 1..=8 {
            let dir_idx = (backtrack_dir + k) % 8;
            let (dx, dy) = DIRS[dir_idx];
            let candidate = (current.0 + dx, current.1 + dy);
            if is_fg(candidate.0, candidate.1) {
                found = Some((dir_idx, candidate));
                break;
            }
        }

        match found {
            None => break,
            Some((dir_idx, next_pixel)) => {
                if next_pixel == start {
                    break;
                }
                boundary.push(next_pixel);
                current = next_pixel;
                backtrack_dir = (dir_idx + 4) % 8;
                if boundary.len() > max_steps {
                    break;
                }
            }
        }
    }

    boundary
        .into_iter()
        .map(|(x, y)| Point::new(x as f64, y as f64))
        .collect()
}
