pub mod fundamental_matrix;
pub mod triangulation;
