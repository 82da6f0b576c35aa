pub mod io;
pub mod normalize;
