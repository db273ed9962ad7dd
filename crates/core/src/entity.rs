//! Entity trait: a record addressed by its identifier.

/// Record that carries its own store key.
pub trait Entity {
    fn id(&self) -> &str;
}
