pub mod frustum;
pub mod interpolation;
pub mod transform;
