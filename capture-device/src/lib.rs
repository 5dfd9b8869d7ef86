mod config;
mod request;
mod session;

pub use config::*;
pub use request::*;
pub use session::*;
