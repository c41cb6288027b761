//! PLY file writing and loading

mod loader;
mod vertex;
mod writer;

pub use loader::load_vertices_from_ply;
pub use vertex::PlyVertex;
pub use writer::write_points_ply;
