mod human;
mod json;

pub use self::{human::HumanReporter, json::JsonlReporter};
