pub mod blob;
pub mod file;
pub mod user;

pub use blob::*;
pub use file::*;
pub use user::*;
