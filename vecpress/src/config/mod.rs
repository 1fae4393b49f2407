mod press;
mod server;
mod target;

pub use self::{
    press::PressArgs,
    server::ServerConfig,
    target::{RequestKind, TargetConfig},
};
