mod material;
mod message;
mod photo;
mod progress;
mod user;
mod worksite;

pub use material::*;
pub use message::*;
pub use photo::*;
pub use progress::*;
pub use user::*;
pub use worksite::*;
