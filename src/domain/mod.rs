pub mod changes;
pub mod comparison;
pub mod decision;
pub mod diff_item;
pub mod error;
pub mod fingerprint;
pub mod path;
pub mod ports;
pub mod value_objects;
