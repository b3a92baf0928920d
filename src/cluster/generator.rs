/// Cluster data generator — maps screen tiles × depth ranges to the
/// set of object/light ids influencing them.
///
/// The camera frustum is sliced by boundary planes through the eye
/// (one fan of planes per screen axis, one plane every `tile_size`
/// scaled pixels), and depth is quantized into square-root-remapped
/// bins so resolution stays denser near the camera. For every tracked
/// sphere the generator sets the id's bit in every (slice, bin) cell
/// the sphere overlaps, working outward from the sphere's home tile
/// until a boundary plane is farther than the radius.
///
/// Membership is written in parallel: objects are split into fixed
/// size chunks, each chunk's inputs copied into a deferred task, and
/// the bitset words OR-ed atomically. Tasks are joined the first time
/// an output array is read.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use glam::{Mat4, Vec3};
use crate::camera::Camera;
use crate::config::CullingConfig;
use crate::engine_error;
use crate::error::{Error, Result};
use super::task::Task;

// ===== SHARED TASK CONTEXT =====

/// Read-only inputs shared by every chunk task of one `generate`.
struct ClusterContext {
    view_matrix: Mat4,
    frustum_fld: Vec3,
    frustum_fru: Vec3,
    screen_w: f32,
    screen_h: f32,
    tile_size: i32,
    depth_divisions: u32,
    set_size: usize,
    near: f32,
    far: f32,
    x_planes: Vec<Vec3>,
    y_planes: Vec<Vec3>,
}

impl ClusterContext {
    /// Non-linear depth remap keeping bins denser near the camera.
    fn depth_kernel(d: f32) -> f32 {
        d.sqrt()
    }

    /// Set the id's bit in `slice` for every depth bin the [n, f]
    /// range touches.
    fn fill_slice(&self, data: &[AtomicU32], slice: i32, n: f32, f: f32, id: u32) {
        if f < self.near || n > self.far {
            return;
        }
        let n = n.max(self.near);
        let f = f.min(self.far);

        let knear = Self::depth_kernel(self.near);
        let kfar = Self::depth_kernel(self.far);
        let denom = (kfar - knear).max(f32::EPSILON);
        let divisions = self.depth_divisions as f32;

        let lrange = ((Self::depth_kernel(n) - knear) / denom * divisions).max(0.0) as i32;
        let rrange = ((Self::depth_kernel(f) - knear) / denom * divisions)
            .min(self.depth_divisions as f32 - 1.0) as i32;

        let offset = (id >> 5) as usize;
        let value = 1u32 << (id & 31);
        for bin in lrange..=rrange {
            let index =
                (slice as usize * self.depth_divisions as usize + bin as usize) * self.set_size
                    + offset;
            data[index].fetch_or(value, Ordering::Relaxed);
        }
    }

    /// Fill a neighboring slice the sphere reaches across a boundary
    /// plane: the in-slice depth extent shrinks with the perpendicular
    /// distance to the plane.
    fn fill_slice_sphere(
        &self,
        data: &[AtomicU32],
        slice: i32,
        plane_dis: f32,
        dis: f32,
        rad: f32,
        id: u32,
    ) {
        let dis2 = (dis * dis - plane_dis * plane_dis).sqrt();
        let rad2 = (rad * rad - plane_dis * plane_dis).sqrt();
        self.fill_slice(data, slice, dis2 - rad2, dis2 + rad2, id);
    }

    /// Cluster one chunk of objects into both bitset arrays.
    fn cluster_chunk(
        &self,
        data_xz: &[AtomicU32],
        data_yz: &[AtomicU32],
        points: &[Vec3],
        rads: &[f32],
        ids: &[u32],
    ) {
        let x_last = self.x_planes.len() - 1;
        let y_last = self.y_planes.len() - 1;

        for i in 0..ids.len() {
            let point = self.view_matrix.transform_point3(points[i]);
            let rad = rads[i];
            let id = ids[i];
            let dis = point.length();

            // Home X tile, or the nearest grid edge the sphere reaches
            let xcenter: i32;
            if self.x_planes[0].dot(point) < 0.0 && self.x_planes[x_last].dot(point) > 0.0 {
                let coordx = point.x * (self.frustum_fld.z / point.z);
                let coordx = (coordx - self.frustum_fld.x)
                    / (self.frustum_fru.x - self.frustum_fld.x)
                    * self.screen_w;
                xcenter = ((coordx as i32) / self.tile_size).clamp(0, x_last as i32 - 1);
                self.fill_slice(data_xz, xcenter, dis - rad, dis + rad, id);
            } else if self.x_planes[0].dot(point).abs() < rad {
                xcenter = -1;
            } else if self.x_planes[x_last].dot(point).abs() < rad {
                xcenter = x_last as i32;
            } else {
                continue;
            }

            // Home Y tile, same scheme
            let ycenter: i32;
            if self.y_planes[0].dot(point) < 0.0 && self.y_planes[y_last].dot(point) > 0.0 {
                let coordy = point.y * (self.frustum_fld.z / point.z);
                let coordy = (coordy - self.frustum_fld.y)
                    / (self.frustum_fru.y - self.frustum_fld.y)
                    * self.screen_h;
                ycenter = ((coordy as i32) / self.tile_size).clamp(0, y_last as i32 - 1);
                self.fill_slice(data_yz, ycenter, dis - rad, dis + rad, id);
            } else if self.y_planes[0].dot(point).abs() < rad {
                ycenter = -1;
            } else if self.y_planes[y_last].dot(point).abs() < rad {
                ycenter = y_last as i32;
            } else {
                continue;
            }

            // Walk outward while the sphere still crosses the boundary
            let mut slice = xcenter - 1;
            while slice >= 0 {
                let plane_dis = self.x_planes[(slice + 1) as usize].dot(point).abs();
                if plane_dis > rad {
                    break;
                }
                self.fill_slice_sphere(data_xz, slice, plane_dis, dis, rad, id);
                slice -= 1;
            }
            let mut slice = xcenter + 1;
            while (slice as usize) < x_last {
                let plane_dis = self.x_planes[slice as usize].dot(point).abs();
                if plane_dis > rad {
                    break;
                }
                self.fill_slice_sphere(data_xz, slice, plane_dis, dis, rad, id);
                slice += 1;
            }
            let mut slice = ycenter - 1;
            while slice >= 0 {
                let plane_dis = self.y_planes[(slice + 1) as usize].dot(point).abs();
                if plane_dis > rad {
                    break;
                }
                self.fill_slice_sphere(data_yz, slice, plane_dis, dis, rad, id);
                slice -= 1;
            }
            let mut slice = ycenter + 1;
            while (slice as usize) < y_last {
                let plane_dis = self.y_planes[slice as usize].dot(point).abs();
                if plane_dis > rad {
                    break;
                }
                self.fill_slice_sphere(data_yz, slice, plane_dis, dis, rad, id);
                slice += 1;
            }
        }
    }
}

// ===== GENERATOR =====

/// Per-camera cluster membership precomputation.
pub struct ClusterDataGenerator {
    config: CullingConfig,
    initialized: bool,
    generated: bool,

    screen: (u32, u32),
    frustum_fld: Vec3,
    frustum_fru: Vec3,
    view_matrix: Mat4,
    origin: Vec3,
    near: f32,
    far: f32,
    x_planes: Vec<Vec3>,
    y_planes: Vec<Vec3>,

    object_pos: Vec<Vec3>,
    object_rad: Vec<f32>,
    object_ids: Vec<u32>,

    set_size: u32,
    data_xz: Arc<Vec<AtomicU32>>,
    data_yz: Arc<Vec<AtomicU32>>,
    finished_xz: Vec<u32>,
    finished_yz: Vec<u32>,
    tasks: Vec<Task>,
}

impl ClusterDataGenerator {
    pub fn new(config: CullingConfig) -> Self {
        Self {
            config,
            initialized: false,
            generated: false,
            screen: (0, 0),
            frustum_fld: Vec3::ZERO,
            frustum_fru: Vec3::ZERO,
            view_matrix: Mat4::IDENTITY,
            origin: Vec3::ZERO,
            near: 0.0,
            far: 0.0,
            x_planes: Vec::new(),
            y_planes: Vec::new(),
            object_pos: Vec::new(),
            object_rad: Vec::new(),
            object_ids: Vec::new(),
            set_size: 0,
            data_xz: Arc::new(Vec::new()),
            data_yz: Arc::new(Vec::new()),
            finished_xz: Vec::new(),
            finished_yz: Vec::new(),
            tasks: Vec::new(),
        }
    }

    // ===== SETUP =====

    /// Capture the camera and build the tile boundary planes.
    ///
    /// Each plane passes through the eye; its normal comes from the
    /// boundary ray interpolated across the far plane. Re-callable:
    /// resets all state for a new camera.
    pub fn init(&mut self, camera: &Camera) {
        self.clear();
        self.initialized = true;

        let scale = self.config.render_scale;
        let (vw, vh) = camera.viewport();
        self.screen = (
            (vw as f32 * scale) as u32,
            (vh as f32 * scale) as u32,
        );

        let (fld, fru) = camera.far_corners_view();
        self.frustum_fld = fld;
        self.frustum_fru = fru;
        self.view_matrix = *camera.view_matrix();
        self.origin = camera.position();
        self.near = camera.near();

        let tile = self.config.tile_size;
        let mut i = 0u32;
        while i < self.screen.0 {
            let ray = fld.lerp(fru, i as f32 / self.screen.0 as f32);
            self.x_planes.push(Vec3::new(ray.z, 0.0, -ray.x).normalize());
            i += tile;
        }
        self.x_planes.push(Vec3::new(fru.z, 0.0, -fru.x).normalize());

        let mut i = 0u32;
        while i < self.screen.1 {
            let ray = fld.lerp(fru, i as f32 / self.screen.1 as f32);
            self.y_planes.push(Vec3::new(0.0, ray.z, -ray.y).normalize());
            i += tile;
        }
        self.y_planes.push(Vec3::new(0.0, fru.z, -fru.y).normalize());
    }

    /// Track a sphere. Ids need not be contiguous.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` before `init` or after `generate`.
    pub fn add_object(&mut self, world_pos: Vec3, radius: f32, id: u32) -> Result<()> {
        if !self.initialized {
            let err = Error::InvalidOperation(
                "adding a cluster object before initializing with a camera".to_string(),
            );
            engine_error!("nova3d::ClusterDataGenerator", "{}", err);
            return Err(err);
        }
        if self.generated {
            let err = Error::InvalidOperation(
                "adding a cluster object after generating the data".to_string(),
            );
            engine_error!("nova3d::ClusterDataGenerator", "{}", err);
            return Err(err);
        }
        self.object_pos.push(world_pos);
        self.object_rad.push(radius);
        self.object_ids.push(id);
        Ok(())
    }

    // ===== GENERATION =====

    /// Launch the clustering tasks. Idempotent: a second call without
    /// an intervening `clear`/`init` is a no-op.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` before `init`.
    pub fn generate(&mut self) -> Result<()> {
        if !self.initialized {
            let err = Error::InvalidOperation(
                "generating cluster data before initializing with a camera".to_string(),
            );
            engine_error!("nova3d::ClusterDataGenerator", "{}", err);
            return Err(err);
        }
        if self.generated {
            return Ok(());
        }
        self.generated = true;

        self.far = 0.0;
        for i in 0..self.object_ids.len() {
            self.far = self
                .far
                .max(self.origin.distance(self.object_pos[i]) + self.object_rad[i]);
        }

        if self.object_ids.is_empty() {
            self.set_size = 0;
            return Ok(());
        }

        // Dense id → object-index remap; ids are the bit positions
        let max_id = *self.object_ids.iter().max().unwrap() as usize;
        let mut inv_id = vec![u32::MAX; max_id + 1];
        for (index, &id) in self.object_ids.iter().enumerate() {
            inv_id[id as usize] = index as u32;
        }

        self.set_size = ((inv_id.len() as u32 - 1) >> 5) + 1;

        let x_slices = self.x_planes.len() - 1;
        let y_slices = self.y_planes.len() - 1;
        let divisions = self.config.depth_divisions as usize;
        let set_size = self.set_size as usize;
        self.data_xz = Arc::new(new_atomic_words(x_slices * divisions * set_size));
        self.data_yz = Arc::new(new_atomic_words(y_slices * divisions * set_size));

        let context = Arc::new(ClusterContext {
            view_matrix: self.view_matrix,
            frustum_fld: self.frustum_fld,
            frustum_fru: self.frustum_fru,
            screen_w: self.screen.0 as f32,
            screen_h: self.screen.1 as f32,
            tile_size: self.config.tile_size as i32,
            depth_divisions: self.config.depth_divisions,
            set_size,
            near: self.near,
            far: self.far,
            x_planes: self.x_planes.clone(),
            y_planes: self.y_planes.clone(),
        });

        let chunk_size = self.config.cluster_chunk_size as usize;
        let mut chunk_start = 0usize;
        while chunk_start < inv_id.len() {
            // Chunk inputs copied by value; the generator's own arrays
            // stay free to mutate
            let mut points = Vec::new();
            let mut rads = Vec::new();
            let mut ids = Vec::new();
            for id in chunk_start..(chunk_start + chunk_size).min(inv_id.len()) {
                let index = inv_id[id];
                if index == u32::MAX {
                    continue;
                }
                points.push(self.object_pos[index as usize]);
                rads.push(self.object_rad[index as usize]);
                ids.push(id as u32);
            }
            chunk_start += chunk_size;
            if ids.is_empty() {
                continue;
            }

            let context = Arc::clone(&context);
            let data_xz = Arc::clone(&self.data_xz);
            let data_yz = Arc::clone(&self.data_yz);
            self.tasks.push(Task::spawn(move || {
                context.cluster_chunk(&data_xz, &data_yz, &points, &rads, &ids);
            }));
        }

        Ok(())
    }

    /// Join outstanding tasks and snapshot the bitset words.
    fn finish(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        for task in &mut self.tasks {
            task.join();
        }
        self.tasks.clear();
        self.finished_xz = self.data_xz.iter().map(|w| w.load(Ordering::Relaxed)).collect();
        self.finished_yz = self.data_yz.iter().map(|w| w.load(Ordering::Relaxed)).collect();
    }

    // ===== OUTPUTS =====

    /// The X-slice × depth-bin bitset array. Triggers `generate` if it
    /// has not run and joins all chunk tasks.
    pub fn cluster_data_xz(&mut self) -> Result<&[u32]> {
        self.generate()?;
        self.finish();
        Ok(&self.finished_xz)
    }

    /// The Y-slice × depth-bin bitset array. Triggers `generate` if it
    /// has not run and joins all chunk tasks.
    pub fn cluster_data_yz(&mut self) -> Result<&[u32]> {
        self.generate()?;
        self.finish();
        Ok(&self.finished_yz)
    }

    /// Words per (slice, bin) cell
    pub fn set_size(&self) -> u32 {
        self.set_size
    }

    /// Far distance covering every tracked object (valid after
    /// `generate`)
    pub fn far_distance(&self) -> f32 {
        self.far
    }

    /// X boundary plane normals (length = slice count + 1)
    pub fn x_planes(&self) -> &[Vec3] {
        &self.x_planes
    }

    /// Y boundary plane normals (length = slice count + 1)
    pub fn y_planes(&self) -> &[Vec3] {
        &self.y_planes
    }

    /// Reset to the pre-`init` state.
    pub fn clear(&mut self) {
        self.tasks.clear();

        self.x_planes.clear();
        self.y_planes.clear();

        self.data_xz = Arc::new(Vec::new());
        self.data_yz = Arc::new(Vec::new());
        self.finished_xz.clear();
        self.finished_yz.clear();
        self.set_size = 0;

        self.object_pos.clear();
        self.object_rad.clear();
        self.object_ids.clear();

        self.initialized = false;
        self.generated = false;
    }
}

fn new_atomic_words(len: usize) -> Vec<AtomicU32> {
    let mut words = Vec::with_capacity(len);
    words.resize_with(len, || AtomicU32::new(0));
    words
}

#[cfg(test)]
#[path = "generator_tests.rs"]
mod tests;
