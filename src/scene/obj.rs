use std::{fs, path::Path};

use thiserror::Error;

use crate::geometry::{Transform, Triangle, WorldPoint};

use super::{Material, Object, Shape};

/// Loads all triangles of a Wavefront OBJ file as triangle objects sharing one
/// placement and material.
pub fn load_obj(
    path: impl AsRef<Path>,
    transform: Transform,
    material: Material,
) -> Result<Vec<Object>, ObjOpenError> {
    let content = fs::read_to_string(path)?;
    parse_obj(content, transform, material)
}

pub fn parse_obj(
    content: String,
    transform: Transform,
    material: Material,
) -> Result<Vec<Object>, ObjOpenError> {
    let parsed = wavefront_obj::obj::parse(content)?;

    let mut objects = Vec::new();
    let mut skipped = 0usize;
    for o in parsed.objects.iter() {
        let vertex = |index: usize| {
            let v = &o.vertices[index];
            WorldPoint::new(v.x as f32, v.y as f32, v.z as f32)
        };

        for geometry in &o.geometry {
            for shape in &geometry.shapes {
                let wavefront_obj::obj::Primitive::Triangle(a, b, c) = &shape.primitive else {
                    skipped += 1;
                    continue;
                };
                let vertices = Triangle::new(vertex(a.0), vertex(b.0), vertex(c.0));
                objects.push(Object::new(Shape::Triangle { vertices }, transform, material));
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(skipped, "non-triangle primitives ignored");
    }
    tracing::debug!(triangles = objects.len(), "loaded obj");
    Ok(objects)
}

#[derive(Debug, Error)]
pub enum ObjOpenError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse file: {0}")]
    ParseError(#[from] wavefront_obj::ParseError),
}
