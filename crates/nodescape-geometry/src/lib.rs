mod frustum;
mod quad;
mod units;
mod vector;

pub use frustum::{Plane, ViewingVolume, horizontal_fov_deg};
pub use quad::Quadrilateral;
pub use units::HostUnits;
pub use vector::{Vec3, rotate_around_axis};
