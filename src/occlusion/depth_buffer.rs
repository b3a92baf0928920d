/// Masked depth buffer — the coverage+depth primitive behind occlusion
/// queries.
///
/// A fixed-resolution raster target storing, per pixel, the depth of
/// the nearest occluder surface written so far (encoded as f32 bits in
/// an AtomicU32 so disjoint screen bins can rasterize concurrently
/// without locks). All answers are conservative: a query may report
/// "visible" for an occluded box, never "occluded" for a visible one.
///
/// Rasterization is deliberately coarse. Each triangle writes a single
/// conservative depth (its farthest vertex), pixels are sampled at
/// their centers, and triangles straddling the near plane are dropped
/// rather than clipped — every simplification errs toward visibility.

use std::sync::atomic::{AtomicU32, Ordering};
use bitflags::bitflags;
use glam::{Mat4, Vec4};

bitflags! {
    /// Planes an occluder may straddle, set by the culling tool so the
    /// rasterizer knows when the per-vertex near test is required.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClipPlanes: u32 {
        const LEFT   = 1 << 0;
        const RIGHT  = 1 << 1;
        const BOTTOM = 1 << 2;
        const TOP    = 1 << 3;
        const NEAR   = 1 << 4;
        const ALL    = 0x1f;
    }
}

/// Triangle winding treated as back-facing by the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfaceWinding {
    /// Rasterize both windings
    None,
    /// Cull clockwise triangles (in a y-up pixel space)
    Cw,
    /// Cull counter-clockwise triangles
    Ccw,
}

/// Outcome of a visibility query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullingResult {
    /// At least one pixel of the query may be visible
    Visible,
    /// Every pixel of the query is behind a written occluder
    Occluded,
    /// The query lies entirely outside the buffer
    ViewCulled,
}

/// One bin's rectangle of the screen, in pixels. Max bounds exclusive.
#[derive(Debug, Clone, Copy)]
pub struct ScissorRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

// ===== TRIANGLE LIST =====

/// Fixed-capacity list of screen-space triangles bound for one bin.
///
/// Layout: 9 floats per triangle — (x, y, w) per vertex, x/y in pixels,
/// w the view depth. Storage is allocated once and reused; `clear`
/// only resets the count.
pub struct TriList {
    data: Vec<f32>,
    tri_count: usize,
    max_tris: usize,
}

impl TriList {
    /// Allocate storage for `max_tris` triangles.
    pub fn with_capacity(max_tris: usize) -> Self {
        Self {
            data: vec![0.0; max_tris * 9],
            tri_count: 0,
            max_tris,
        }
    }

    /// Drop all triangles, keeping the storage.
    pub fn clear(&mut self) {
        self.tri_count = 0;
    }

    /// Number of triangles currently stored
    pub fn tri_count(&self) -> usize {
        self.tri_count
    }

    /// Append one triangle. Returns false if the list is full.
    pub fn push(&mut self, tri: &[f32; 9]) -> bool {
        if self.tri_count >= self.max_tris {
            return false;
        }
        let base = self.tri_count * 9;
        self.data[base..base + 9].copy_from_slice(tri);
        self.tri_count += 1;
        true
    }

    /// The 9 floats of triangle `i`
    pub fn tri(&self, i: usize) -> &[f32] {
        &self.data[i * 9..i * 9 + 9]
    }
}

// ===== DEPTH BUFFER =====

const DEPTH_CLEAR_BITS: u32 = 0x7f80_0000; // +infinity

/// Shared conservative coverage+depth buffer.
pub struct MaskedDepthBuffer {
    width: u32,
    height: u32,
    /// Per-pixel nearest occluder depth, f32 bits. Positive floats
    /// order identically to their bit patterns, so `fetch_min` on the
    /// bits is a depth min.
    depth: Vec<AtomicU32>,
    /// Minimum view depth a vertex may have before its triangle is
    /// dropped, f32 bits.
    near_clip: AtomicU32,
}

impl MaskedDepthBuffer {
    /// Create a cleared buffer at a fixed resolution.
    pub fn new(width: u32, height: u32) -> Self {
        let mut depth = Vec::with_capacity((width * height) as usize);
        depth.resize_with((width * height) as usize, || AtomicU32::new(DEPTH_CLEAR_BITS));
        Self {
            width,
            height,
            depth,
            near_clip: AtomicU32::new(1e-3f32.to_bits()),
        }
    }

    /// Buffer resolution in pixels
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reset every pixel to uncovered.
    pub fn clear(&self) {
        for pixel in &self.depth {
            pixel.store(DEPTH_CLEAR_BITS, Ordering::Relaxed);
        }
    }

    /// Set the near clip distance used by the per-vertex drop test.
    pub fn set_near_clip(&self, near: f32) {
        self.near_clip.store(near.max(0.0).to_bits(), Ordering::Relaxed);
    }

    /// Pixel size of one bin for a `bins_w` x `bins_h` partition.
    /// The final row/column absorbs the remainder.
    pub fn bin_dimensions(&self, bins_w: u32, bins_h: u32) -> (u32, u32) {
        (self.width / bins_w, self.height / bins_h)
    }

    /// Scissor rectangles of a `bins_w` x `bins_h` partition, row-major.
    pub fn bin_rects(&self, bins_w: u32, bins_h: u32) -> Vec<ScissorRect> {
        let (bin_w, bin_h) = self.bin_dimensions(bins_w, bins_h);
        let mut rects = Vec::with_capacity((bins_w * bins_h) as usize);
        for ty in 0..bins_h {
            for tx in 0..bins_w {
                rects.push(ScissorRect {
                    min_x: tx * bin_w,
                    max_x: if tx + 1 == bins_w { self.width } else { (tx + 1) * bin_w },
                    min_y: ty * bin_h,
                    max_y: if ty + 1 == bins_h { self.height } else { (ty + 1) * bin_h },
                });
            }
        }
        rects
    }

    // ===== BINNING =====

    /// Project a triangle batch and partition it into per-bin lists.
    ///
    /// `positions` is a flattened xyz array; `indices` is a triangle
    /// list into it. Triangles are transformed by `matrix` (identity if
    /// `None`), back-face culled per `winding`, dropped if any vertex
    /// is nearer than the near clip, and appended to every bin list
    /// their pixel bounds overlap.
    #[allow(clippy::too_many_arguments)]
    pub fn bin_triangles(
        &self,
        positions: &[f32],
        indices: &[u32],
        matrix: Option<&Mat4>,
        winding: BackfaceWinding,
        _clip_mask: ClipPlanes,
        bins_w: u32,
        bins_h: u32,
        lists: &mut [&mut TriList],
    ) {
        debug_assert_eq!(lists.len(), (bins_w * bins_h) as usize);
        let (bin_w, bin_h) = self.bin_dimensions(bins_w, bins_h);
        let near = f32::from_bits(self.near_clip.load(Ordering::Relaxed));

        for tri_indices in indices.chunks_exact(3) {
            let mut screen = [[0.0f32; 3]; 3];
            let mut dropped = false;

            for (corner, &index) in screen.iter_mut().zip(tri_indices) {
                let base = index as usize * 3;
                let local = Vec4::new(
                    positions[base],
                    positions[base + 1],
                    positions[base + 2],
                    1.0,
                );
                let clip = match matrix {
                    Some(m) => *m * local,
                    None => local,
                };
                // A vertex at or behind the eye plane cannot be
                // projected; the whole triangle is dropped, which is
                // the visible-safe direction for an occluder.
                if clip.w <= near {
                    dropped = true;
                    break;
                }
                let ndc_x = clip.x / clip.w;
                let ndc_y = clip.y / clip.w;
                *corner = [
                    (ndc_x * 0.5 + 0.5) * self.width as f32,
                    (ndc_y * 0.5 + 0.5) * self.height as f32,
                    clip.w,
                ];
            }
            if dropped {
                continue;
            }

            // Signed area in pixel space decides the winding
            let area = edge(
                screen[0][0], screen[0][1],
                screen[1][0], screen[1][1],
                screen[2][0], screen[2][1],
            );
            match winding {
                BackfaceWinding::None => {
                    if area == 0.0 {
                        continue;
                    }
                }
                BackfaceWinding::Cw => {
                    if area <= 0.0 {
                        continue;
                    }
                }
                BackfaceWinding::Ccw => {
                    if area >= 0.0 {
                        continue;
                    }
                }
            }

            let min_x = screen[0][0].min(screen[1][0]).min(screen[2][0]);
            let max_x = screen[0][0].max(screen[1][0]).max(screen[2][0]);
            let min_y = screen[0][1].min(screen[1][1]).min(screen[2][1]);
            let max_y = screen[0][1].max(screen[1][1]).max(screen[2][1]);
            if max_x < 0.0 || max_y < 0.0
                || min_x >= self.width as f32 || min_y >= self.height as f32
            {
                continue;
            }

            let bx0 = (min_x.max(0.0) as u32 / bin_w).min(bins_w - 1);
            let bx1 = (max_x.max(0.0) as u32 / bin_w).min(bins_w - 1);
            let by0 = (min_y.max(0.0) as u32 / bin_h).min(bins_h - 1);
            let by1 = (max_y.max(0.0) as u32 / bin_h).min(bins_h - 1);

            let tri = [
                screen[0][0], screen[0][1], screen[0][2],
                screen[1][0], screen[1][1], screen[1][2],
                screen[2][0], screen[2][1], screen[2][2],
            ];
            for by in by0..=by1 {
                for bx in bx0..=bx1 {
                    let bin = (by * bins_w + bx) as usize;
                    lists[bin].push(&tri);
                }
            }
        }
    }

    // ===== RASTERIZATION =====

    /// Rasterize one bin's triangle list inside its scissor rectangle.
    ///
    /// Each triangle writes its farthest vertex depth to every pixel
    /// whose center it covers.
    pub fn render_trilist(&self, list: &TriList, rect: &ScissorRect) {
        for i in 0..list.tri_count() {
            let t = list.tri(i);
            let (mut x0, mut y0) = (t[0], t[1]);
            let (mut x1, mut y1) = (t[3], t[4]);
            let (x2, y2) = (t[6], t[7]);
            let depth = t[2].max(t[5]).max(t[8]);

            // Normalize orientation so the edge tests are all >= 0
            if edge(x0, y0, x1, y1, x2, y2) < 0.0 {
                std::mem::swap(&mut x0, &mut x1);
                std::mem::swap(&mut y0, &mut y1);
            }

            let px0 = (x0.min(x1).min(x2).floor().max(rect.min_x as f32)) as u32;
            let px1 = (x0.max(x1).max(x2).ceil().min(rect.max_x as f32)) as u32;
            let py0 = (y0.min(y1).min(y2).floor().max(rect.min_y as f32)) as u32;
            let py1 = (y0.max(y1).max(y2).ceil().min(rect.max_y as f32)) as u32;

            let depth_bits = depth.to_bits();
            for py in py0..py1 {
                for px in px0..px1 {
                    let cx = px as f32 + 0.5;
                    let cy = py as f32 + 0.5;
                    if edge(x0, y0, x1, y1, cx, cy) >= 0.0
                        && edge(x1, y1, x2, y2, cx, cy) >= 0.0
                        && edge(x2, y2, x0, y0, cx, cy) >= 0.0
                    {
                        let idx = (py * self.width + px) as usize;
                        self.depth[idx].fetch_min(depth_bits, Ordering::Relaxed);
                    }
                }
            }
        }
    }

    // ===== QUERIES =====

    /// Test an NDC rectangle at view depth `wmin` against the buffer.
    ///
    /// Returns `Occluded` only if every pixel the rectangle touches
    /// holds an occluder strictly nearer than `wmin`.
    pub fn test_rect(
        &self,
        xmin: f32,
        ymin: f32,
        xmax: f32,
        ymax: f32,
        wmin: f32,
    ) -> CullingResult {
        if wmin <= 0.0 {
            return CullingResult::Visible;
        }

        let px_min = (xmin * 0.5 + 0.5) * self.width as f32;
        let px_max = (xmax * 0.5 + 0.5) * self.width as f32;
        let py_min = (ymin * 0.5 + 0.5) * self.height as f32;
        let py_max = (ymax * 0.5 + 0.5) * self.height as f32;

        if px_max < 0.0 || py_max < 0.0
            || px_min >= self.width as f32 || py_min >= self.height as f32
        {
            return CullingResult::ViewCulled;
        }

        let x0 = px_min.max(0.0).floor() as u32;
        let x1 = (px_max.ceil() as u32).min(self.width);
        let y0 = py_min.max(0.0).floor() as u32;
        let y1 = (py_max.ceil() as u32).min(self.height);

        for py in y0..y1 {
            for px in x0..x1 {
                let bits = self.depth[(py * self.width + px) as usize].load(Ordering::Relaxed);
                if f32::from_bits(bits) >= wmin {
                    return CullingResult::Visible;
                }
            }
        }
        CullingResult::Occluded
    }

    /// Test a triangle batch against the buffer.
    ///
    /// A triangle proves visibility if any pixel its bounds touch holds
    /// no occluder strictly nearer than its nearest vertex.
    pub fn test_triangles(
        &self,
        positions: &[f32],
        indices: &[u32],
        matrix: Option<&Mat4>,
    ) -> CullingResult {
        let near = f32::from_bits(self.near_clip.load(Ordering::Relaxed));
        let mut any_on_screen = false;

        for tri_indices in indices.chunks_exact(3) {
            let mut ndc = [[0.0f32; 2]; 3];
            let mut wmin = f32::INFINITY;
            let mut dropped = false;

            for (corner, &index) in ndc.iter_mut().zip(tri_indices) {
                let base = index as usize * 3;
                let local = Vec4::new(
                    positions[base],
                    positions[base + 1],
                    positions[base + 2],
                    1.0,
                );
                let clip = match matrix {
                    Some(m) => *m * local,
                    None => local,
                };
                if clip.w <= near {
                    dropped = true;
                    break;
                }
                *corner = [clip.x / clip.w, clip.y / clip.w];
                wmin = wmin.min(clip.w);
            }
            if dropped {
                // Straddles the eye plane: cannot be proven occluded
                return CullingResult::Visible;
            }

            let xmin = ndc[0][0].min(ndc[1][0]).min(ndc[2][0]);
            let xmax = ndc[0][0].max(ndc[1][0]).max(ndc[2][0]);
            let ymin = ndc[0][1].min(ndc[1][1]).min(ndc[2][1]);
            let ymax = ndc[0][1].max(ndc[1][1]).max(ndc[2][1]);

            match self.test_rect(xmin, ymin, xmax, ymax, wmin) {
                CullingResult::Visible => return CullingResult::Visible,
                CullingResult::Occluded => any_on_screen = true,
                CullingResult::ViewCulled => {}
            }
        }

        if any_on_screen {
            CullingResult::Occluded
        } else {
            CullingResult::ViewCulled
        }
    }
}

/// Edge function: positive when (px, py) is left of the edge a→b.
#[inline]
fn edge(ax: f32, ay: f32, bx: f32, by: f32, px: f32, py: f32) -> f32 {
    (bx - ax) * (py - ay) - (by - ay) * (px - ax)
}

#[cfg(test)]
#[path = "depth_buffer_tests.rs"]
mod tests;
