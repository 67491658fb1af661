use std::fmt;
use std::rc::Rc;

use crate::math::Vec3;

/// Identifier the scene layer assigns to a renderable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u64);

/// Read access to a positioned, renderable object owned by the scene layer.
///
/// The behavioral core only ever references these objects; geometry, materials
/// and loading stay with whoever implements this trait.
pub trait WorldObject {
    fn object_id(&self) -> ObjectId;
    fn position(&self) -> Vec3;
    /// Euler rotation in radians.
    fn rotation(&self) -> Vec3;
    fn is_visible(&self) -> bool;
    fn debug_name(&self) -> &str {
        "object"
    }
}

/// Shared reference to a scene object. Cloning the handle never clones the
/// object itself.
#[derive(Clone)]
pub struct WorldHandle(Rc<dyn WorldObject>);

impl WorldHandle {
    pub fn new(object: Rc<dyn WorldObject>) -> Self {
        Self(object)
    }

    pub fn from_object<T: WorldObject + 'static>(object: T) -> Self {
        Self(Rc::new(object))
    }

    pub fn object_id(&self) -> ObjectId {
        self.0.object_id()
    }

    pub fn position(&self) -> Vec3 {
        self.0.position()
    }

    pub fn rotation(&self) -> Vec3 {
        self.0.rotation()
    }

    pub fn is_visible(&self) -> bool {
        self.0.is_visible()
    }

    pub fn debug_name(&self) -> &str {
        self.0.debug_name()
    }

    /// True when both handles point at the same scene object instance.
    pub fn same_object(&self, other: &WorldHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for WorldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldHandle")
            .field("object_id", &self.object_id())
            .field("name", &self.debug_name())
            .field("position", &self.position())
            .finish()
    }
}

/// Fixed-transform object for tests and scenery that never moves.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticMesh {
    pub id: ObjectId,
    pub name: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub visible: bool,
}

impl StaticMesh {
    pub fn new(id: u64, name: impl Into<String>, position: Vec3) -> Self {
        Self {
            id: ObjectId(id),
            name: name.into(),
            position,
            rotation: Vec3::ZERO,
            visible: true,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

impl WorldObject for StaticMesh {
    fn object_id(&self) -> ObjectId {
        self.id
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Vec3 {
        self.rotation
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn debug_name(&self) -> &str {
        &self.name
    }
}
