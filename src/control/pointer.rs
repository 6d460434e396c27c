//! Multi-contact pointer arbitration for the on-screen joystick.
//!
//! Any number of pointers may touch the surface, but exactly one of them (the
//! primary contact) drives the X/Y axes. Whether a contact may ever become
//! primary is decided once, when it starts, by hit-testing against the joystick
//! base. When the primary lifts, the earliest still-active qualifying contact
//! takes over in the same call, so no centered sample is produced in between.

use super::axis::{encode, AxisState};
use tracing::{debug, info};

/// Fraction of the base diameter taken up by the stick's radius.
pub const DEFAULT_STICK_RATIO: f32 = 0.11;

/// A position in the joystick's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Identity of a pointer. The mouse is a single implicit pointer and never
/// enters contact bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactId {
    Mouse,
    Touch(u64),
}

/// Layout of the joystick base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoystickGeometry {
    pub center: Point,
    pub base_diameter: f32,
    pub stick_ratio: f32,
}

impl JoystickGeometry {
    pub fn new(center: Point, base_diameter: f32) -> Self {
        Self {
            center,
            base_diameter,
            stick_ratio: DEFAULT_STICK_RATIO,
        }
    }

    pub fn base_radius(&self) -> f32 {
        self.base_diameter / 2.0
    }

    pub fn stick_radius(&self) -> f32 {
        self.stick_ratio * self.base_diameter
    }

    /// Usable travel of the stick center.
    pub fn max_radius(&self) -> f32 {
        (self.base_radius() - self.stick_radius()).max(f32::EPSILON)
    }

    /// Hit test against the joystick base.
    pub fn contains(&self, point: Point) -> bool {
        let dx = point.x - self.center.x;
        let dy = point.y - self.center.y;
        dx.hypot(dy) <= self.base_radius()
    }

    /// Displacement from the center, rescaled onto the travel circle when it overshoots.
    pub fn clamped_delta(&self, point: Point) -> (f32, f32) {
        let dx = point.x - self.center.x;
        let dy = point.y - self.center.y;
        let max_radius = self.max_radius();

        if dx.hypot(dy) > max_radius {
            let angle = dy.atan2(dx);
            (max_radius * angle.cos(), max_radius * angle.sin())
        } else {
            (dx, dy)
        }
    }

    /// Clamped displacement scaled into `[-1, 1]` per axis.
    pub fn normalize(&self, point: Point) -> (f32, f32) {
        let (dx, dy) = self.clamped_delta(point);
        let max_radius = self.max_radius();
        (
            (dx / max_radius).clamp(-1.0, 1.0),
            (dy / max_radius).clamp(-1.0, 1.0),
        )
    }
}

impl Default for JoystickGeometry {
    fn default() -> Self {
        Self::new(Point::new(100.0, 100.0), 200.0)
    }
}

/// A touch currently on the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerContact {
    pub id: ContactId,
    pub position: Point,
    pub qualifies_as_primary: bool,
}

/// Tracks active contacts and elects the primary one.
#[derive(Debug, Clone)]
pub struct PointerArbiter {
    geometry: JoystickGeometry,
    // Registration order; promotion picks the first qualifying entry.
    contacts: Vec<PointerContact>,
    primary: Option<ContactId>,
}

impl PointerArbiter {
    pub fn new(geometry: JoystickGeometry) -> Self {
        Self {
            geometry,
            contacts: Vec::new(),
            primary: None,
        }
    }

    pub fn geometry(&self) -> &JoystickGeometry {
        &self.geometry
    }

    pub fn primary(&self) -> Option<ContactId> {
        self.primary
    }

    pub fn contacts(&self) -> &[PointerContact] {
        &self.contacts
    }

    /// Returns `true` when the axis state changed.
    pub fn on_contact_start(&mut self, id: ContactId, point: Point, axes: &mut AxisState) -> bool {
        let inside = self.geometry.contains(point);

        if id == ContactId::Mouse {
            if !inside {
                return false;
            }
            debug!("Mouse pressed on joystick, taking primary");
            self.primary = Some(ContactId::Mouse);
            return self.drive(point, axes);
        }

        // A repeated start for a live id replaces the old entry.
        self.contacts.retain(|contact| contact.id != id);
        self.contacts.push(PointerContact {
            id,
            position: point,
            qualifies_as_primary: inside,
        });

        if inside && self.primary.is_none() {
            debug!("Contact {:?} became primary", id);
            self.primary = Some(id);
            return self.drive(point, axes);
        }
        false
    }

    /// Returns `true` when the axis state changed.
    pub fn on_contact_move(&mut self, id: ContactId, point: Point, axes: &mut AxisState) -> bool {
        if let Some(contact) = self.contacts.iter_mut().find(|contact| contact.id == id) {
            contact.position = point;
        }

        if self.primary == Some(id) {
            self.drive(point, axes)
        } else {
            false
        }
    }

    /// Returns `true` when the axis state changed.
    pub fn on_contact_end(&mut self, id: ContactId, axes: &mut AxisState) -> bool {
        self.contacts.retain(|contact| contact.id != id);

        if self.primary != Some(id) {
            return false;
        }

        self.primary = None;
        axes.reset_to_center();

        let successor = self
            .contacts
            .iter()
            .find(|contact| contact.qualifies_as_primary)
            .copied();

        match successor {
            Some(contact) => {
                info!("Primary {:?} released, handing off to {:?}", id, contact.id);
                self.primary = Some(contact.id);
                self.drive(contact.position, axes);
            }
            None => {
                debug!("Primary {:?} released, stick centered", id);
            }
        }
        true
    }

    fn drive(&self, point: Point, axes: &mut AxisState) -> bool {
        let (nx, ny) = self.geometry.normalize(point);
        axes.set_xy(encode(nx), encode(ny))
    }
}
