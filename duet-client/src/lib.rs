mod config;
mod engine;
mod error;
mod link;
mod media;
mod session;
mod supervisor;
mod transport;

pub use config::*;
pub use engine::*;
pub use error::*;
pub use link::*;
pub use media::*;
pub use session::*;
pub use supervisor::*;
pub use transport::*;
