mod order_world;
mod steps;

pub use order_world::OrderWorld;
