// Domain layer: the resource-graph model and the ports builders and the engine talk through.

pub mod model;
pub mod ports;
