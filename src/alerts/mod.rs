pub mod cooldown;
pub mod evaluate;
pub mod fanout;
pub mod message;
pub mod service;

pub use cooldown::CooldownGate;
pub use service::AlertService;
