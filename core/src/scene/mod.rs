//! In-memory model scene.
//!
//! Holds boxes for structural elements (slabs, beams) and pipe bodies and
//! answers upward ray queries against them. Stands in for a document-backed
//! intersector when running outside a modelling host.

use crate::element::ElementId;
use crate::geometry::{first_crossing, Aabb, Centerline, Point3, Ray, Vector3};
use crate::rod::{Deadline, GeometryQuery, HitOrigin, QueryError, RayHit};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Structure,
    Pipe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneElement {
    pub id: ElementId,
    pub name: String,
    pub kind: ElementKind,
    pub bounds: Aabb,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    elements: Vec<SceneElement>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by id.
    pub fn add(&mut self, element: SceneElement) {
        self.elements.retain(|e| e.id != element.id);
        self.elements.push(element);
    }

    pub fn add_structure(&mut self, name: &str, bounds: Aabb) -> ElementId {
        let id = ElementId::new_deterministic(name);
        self.add(SceneElement {
            id,
            name: name.to_string(),
            kind: ElementKind::Structure,
            bounds,
        });
        id
    }

    /// Register a pipe body one box per centerline segment, replacing any
    /// body already registered under `id`.
    pub fn add_pipe_run(&mut self, id: ElementId, centerline: &Centerline, radius: f64) {
        self.elements.retain(|e| e.id != id);
        let points = match centerline {
            Centerline::Line(span) => vec![span.start(), span.end()],
            Centerline::Polyline(points) => points.clone(),
        };
        for w in points.windows(2) {
            self.elements.push(SceneElement {
                id,
                name: format!("Pipe {}", id),
                kind: ElementKind::Pipe,
                bounds: Aabb::around_segment(&w[0], &w[1], radius),
            });
        }
    }

    /// Remove every element registered under `id`, returning the first.
    pub fn remove(&mut self, id: ElementId) -> Option<SceneElement> {
        let idx = self.elements.iter().position(|e| e.id == id)?;
        let removed = self.elements.remove(idx);
        self.elements.retain(|e| e.id != id);
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn elements(&self) -> &[SceneElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl GeometryQuery for Scene {
    /// Reports structural elements and the subject pipe. Other pipes are not
    /// valid hanging points and are left out.
    fn cast_ray(
        &self,
        origin: &Point3,
        direction: &Vector3,
        subject: ElementId,
        deadline: &Deadline,
    ) -> Result<Vec<RayHit>, QueryError> {
        if direction.norm() == 0.0 {
            return Err(QueryError::Failed("zero ray direction".to_string()));
        }
        let ray = Ray::new(*origin, *direction);
        let mut hits = Vec::new();

        for element in &self.elements {
            deadline.check()?;

            let tag = if element.id == subject {
                HitOrigin::SelfElement
            } else if element.kind == ElementKind::Structure {
                HitOrigin::Structure
            } else {
                continue;
            };

            if let Some(t) = first_crossing(&ray, &element.bounds) {
                hits.push(RayHit {
                    proximity: t,
                    element: element.id,
                    origin: tag,
                });
            }
        }

        hits.sort_by(|a, b| a.proximity.total_cmp(&b.proximity));
        Ok(hits)
    }
}
