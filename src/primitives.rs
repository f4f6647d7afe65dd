//! Procedural geometry centred on the origin.

use std::f32::consts::TAU;

use glam::Vec3;

use crate::scene_graph::Geometry;

/// Axis aligned box with flat shaded faces.
pub fn cuboid(width: f32, height: f32, depth: f32) -> Geometry {
    let half = Vec3::new(width, height, depth) * 0.5;
    // (normal, tangent u, tangent v) per face; u x v == normal keeps CCW winding
    let faces = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    ];

    let mut geometry = Geometry::default();
    for (normal, u, v) in faces {
        let base = geometry.positions.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let corner = normal + u * su + v * sv;
            geometry.positions.push(corner * half);
            geometry.normals.push(normal);
        }
        geometry
            .indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    geometry
}

/// Capped cylinder (or cone frustum) along Y.
pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, segments: u32) -> Geometry {
    let segments = segments.max(3);
    let half = height * 0.5;
    let slope = if height > 0.0 {
        (radius_bottom - radius_top) / height
    } else {
        0.0
    };
    let mut geometry = Geometry::default();

    for i in 0..=segments {
        let theta = i as f32 / segments as f32 * TAU;
        let (sin, cos) = theta.sin_cos();
        let normal = Vec3::new(sin, slope, cos).normalize();
        geometry
            .positions
            .push(Vec3::new(radius_top * sin, half, radius_top * cos));
        geometry.normals.push(normal);
        geometry
            .positions
            .push(Vec3::new(radius_bottom * sin, -half, radius_bottom * cos));
        geometry.normals.push(normal);
    }
    for i in 0..segments {
        let top = i * 2;
        let bottom = top + 1;
        let next_top = top + 2;
        let next_bottom = top + 3;
        geometry
            .indices
            .extend_from_slice(&[top, bottom, next_top, bottom, next_bottom, next_top]);
    }

    for (y, radius, normal) in [(half, radius_top, Vec3::Y), (-half, radius_bottom, Vec3::NEG_Y)] {
        if radius <= 0.0 {
            continue;
        }
        let center = geometry.positions.len() as u32;
        geometry.positions.push(Vec3::new(0.0, y, 0.0));
        geometry.normals.push(normal);
        for i in 0..segments {
            let theta = i as f32 / segments as f32 * TAU;
            let (sin, cos) = theta.sin_cos();
            geometry
                .positions
                .push(Vec3::new(radius * sin, y, radius * cos));
            geometry.normals.push(normal);
        }
        for i in 0..segments {
            let current = center + 1 + i;
            let next = center + 1 + (i + 1) % segments;
            if normal.y > 0.0 {
                geometry.indices.extend_from_slice(&[center, current, next]);
            } else {
                geometry.indices.extend_from_slice(&[center, next, current]);
            }
        }
    }
    geometry
}

/// Icosahedron subdivided `detail` times per edge and projected onto a sphere.
///
/// Each of the 20 faces is split into `(detail + 1)^2` triangles.
pub fn icosphere(radius: f32, detail: u32) -> Geometry {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let corners = [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ];
    let faces: [[usize; 3]; 20] = [
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    let steps = detail + 1;
    let mut geometry = Geometry::default();
    let mut push = |point: Vec3| {
        let direction = point.normalize();
        geometry.positions.push(direction * radius);
        geometry.normals.push(direction);
        geometry.indices.push(geometry.indices.len() as u32);
    };

    for [a, b, c] in faces {
        let (a, b, c) = (corners[a], corners[b], corners[c]);
        let grid = |i: u32, j: u32| {
            a + (b - a) * (i as f32 / steps as f32) + (c - a) * (j as f32 / steps as f32)
        };
        for i in 0..steps {
            for j in 0..(steps - i) {
                push(grid(i, j));
                push(grid(i + 1, j));
                push(grid(i, j + 1));
                if j + 1 < steps - i {
                    push(grid(i + 1, j));
                    push(grid(i + 1, j + 1));
                    push(grid(i, j + 1));
                }
            }
        }
    }
    geometry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{a} != {b}");
    }

    #[test]
    fn cuboid_spans_its_dimensions() {
        let geometry = cuboid(0.6, 0.1, 0.2);
        let bounds = geometry.bounds().unwrap();
        assert_close(bounds.size().x, 0.6);
        assert_close(bounds.size().y, 0.1);
        assert_close(bounds.size().z, 0.2);
        assert_eq!(geometry.triangle_count(), 12);
    }

    #[test]
    fn cuboid_faces_wind_outwards() {
        let geometry = cuboid(1.0, 1.0, 1.0);
        for triangle in geometry.indices.chunks_exact(3) {
            let [p0, p1, p2] = [0, 1, 2].map(|k| geometry.positions[triangle[k] as usize]);
            let face_normal = (p1 - p0).cross(p2 - p0).normalize();
            assert!(face_normal.dot(geometry.normals[triangle[0] as usize]) > 0.99);
        }
    }

    #[test]
    fn cylinder_tapers_between_radii() {
        let geometry = cylinder(0.05, 0.2, 0.7, 8);
        let bounds = geometry.bounds().unwrap();
        assert_close(bounds.min.y, -0.35);
        assert_close(bounds.max.y, 0.35);
        assert_close(bounds.max.x, 0.2 * (TAU / 4.0).sin());
        // 8 side quads plus two 8-triangle caps
        assert_eq!(geometry.triangle_count(), 16 + 16);
    }

    #[test]
    fn icosphere_vertices_sit_on_the_sphere() {
        let geometry = icosphere(0.15, 1);
        assert_eq!(geometry.triangle_count(), 80);
        for position in &geometry.positions {
            assert_close(position.length(), 0.15);
        }
        assert_close(geometry.bounds().unwrap().max.y, 0.15);
    }
}
