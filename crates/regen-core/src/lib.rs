pub mod consts;
pub mod error;
pub mod frame;
pub mod io;
pub mod reconstruct;
pub mod volume;
