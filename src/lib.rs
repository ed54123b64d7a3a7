mod backend;
mod clock;
mod config;
mod filter;
mod frame;
mod lidar;
mod message;
mod noise;
mod points;
mod postprocess;
mod registry;
mod rig;
mod scheduler;
mod sink;
mod stats;
mod stitch;
mod worker;

pub use backend::*;
pub use clock::*;
pub use config::*;
pub use filter::*;
pub use frame::*;
pub use lidar::*;
pub use message::*;
pub use noise::*;
pub use points::*;
pub use postprocess::*;
pub use registry::*;
pub use rig::*;
pub use scheduler::*;
pub use sink::*;
pub use stats::*;
pub use stitch::*;
pub use worker::*;
