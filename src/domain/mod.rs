// Domain layer: entity types, code tables, backend wire shapes and ports.

pub mod codes;
pub mod model;
pub mod ports;
pub mod wire;
