pub mod animation;
pub mod config;
pub mod effects;
pub mod encode;
pub mod error;
pub mod frames;
pub mod server;

pub use animation::{
    create_animation, create_animation_with, decode_image, Animation, AnimationParams,
};
pub use effects::Effects;
pub use error::{AnimationError, AnimationResult};
