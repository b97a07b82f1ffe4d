//! Sectioned key/value persistence
//!
//! The orbit model is stored field by field under the `orbit` section so that a
//! partially mapped model survives a restart; routine state is stored as JSON
//! under the `controller` section.

use std::collections::HashMap;

use log::warn;

use crate::math::{format_vector, parse_vector};
use crate::orbit::OrbitModel;
use crate::types::Field;

pub const ORBIT_SECTION: &str = "orbit";
pub const CONTROLLER_SECTION: &str = "controller";
pub const ROUTINE_KEY: &str = "routine";

/// Storage collaborator: string values addressed by section and key
pub trait Storage {
    fn read_field(&self, section: &str, key: &str) -> Option<String>;
    fn write_field(&mut self, section: &str, key: &str, value: String);
    fn remove_field(&mut self, section: &str, key: &str);
}

/// In-memory [`Storage`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStorage {
    entries: HashMap<(String, String), String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn read_field(&self, section: &str, key: &str) -> Option<String> {
        self.entries
            .get(&(section.to_string(), key.to_string()))
            .cloned()
    }

    fn write_field(&mut self, section: &str, key: &str, value: String) {
        self.entries
            .insert((section.to_string(), key.to_string()), value);
    }

    fn remove_field(&mut self, section: &str, key: &str) {
        self.entries.remove(&(section.to_string(), key.to_string()));
    }
}

fn key(field: Field) -> &'static str {
    match field {
        Field::PlaneNormal => "normal",
        Field::Direction => "direction",
        Field::AngularSpeed => "speed",
    }
}

/// Write every mapped field and remove every unmapped one
pub fn save_orbit<S: Storage + ?Sized>(storage: &mut S, model: &OrbitModel) {
    for field in Field::ALL {
        let value = match field {
            Field::PlaneNormal => model.plane_normal().map(|normal| format_vector(&normal)),
            Field::Direction => model.direction().map(|sign| sign.as_i8().to_string()),
            Field::AngularSpeed => model.angular_speed().map(|speed| speed.to_string()),
        };
        match value {
            Some(value) => storage.write_field(ORBIT_SECTION, key(field), value),
            None => storage.remove_field(ORBIT_SECTION, key(field)),
        }
    }
}

/// Load whatever fields are stored and valid
///
/// Unparseable or out-of-range entries leave their field unmapped.
pub fn load_orbit<S: Storage + ?Sized>(storage: &S, max_angular_speed: f64) -> OrbitModel {
    let mut model = OrbitModel::new(max_angular_speed);

    if let Some(text) = storage.read_field(ORBIT_SECTION, key(Field::PlaneNormal)) {
        let loaded = parse_vector(&text).is_ok_and(|normal| model.set_plane_normal(normal));
        if !loaded {
            warn!("ignoring stored plane normal {text:?}");
        }
    }
    if let Some(text) = storage.read_field(ORBIT_SECTION, key(Field::Direction)) {
        let loaded = text
            .trim()
            .parse::<i8>()
            .is_ok_and(|value| model.set_direction_value(value));
        if !loaded {
            warn!("ignoring stored direction {text:?}");
        }
    }
    if let Some(text) = storage.read_field(ORBIT_SECTION, key(Field::AngularSpeed)) {
        let loaded = text
            .trim()
            .parse::<f64>()
            .is_ok_and(|speed| model.set_angular_speed(speed));
        if !loaded {
            warn!("ignoring stored angular speed {text:?}");
        }
    }
    model
}
