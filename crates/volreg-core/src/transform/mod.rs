//! Rigid-body transforms.
//!
//! [`RigidParams`] is the six-value parameter vector estimated per volume;
//! [`RigidTransform`] turns it into a voxel-to-voxel mapping for a given grid
//! geometry.

pub mod trait_;
pub mod params;
pub mod rigid;

pub use trait_::Transform;
pub use params::RigidParams;
pub use rigid::RigidTransform;
