use std::net::{IpAddr, SocketAddr};

use clap::Parser;

use crate::animation::{
    ParamLimits, DEFAULT_DURATION_SECS, DEFAULT_FRAMES, DEFAULT_MAX_ANIMATION_PIXELS,
};

#[derive(Parser, Debug, Clone)]
#[command(name = "fragmentgif", version, about = "Serves glitchy GIFs made from uploaded images")]
pub struct Config {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, default_value_t = 5001)]
    pub port: u16,

    /// Frames generated when a request doesn't say.
    #[arg(long, default_value_t = DEFAULT_FRAMES)]
    pub default_frames: u32,

    /// Animation length in seconds when a request doesn't say.
    #[arg(long, default_value_t = DEFAULT_DURATION_SECS)]
    pub default_duration: u32,

    #[arg(long, default_value_t = 500)]
    pub max_frames: u32,

    #[arg(long, default_value_t = 600)]
    pub max_duration: u32,

    /// Most pixels one animation may hold across all its frames.
    #[arg(long, default_value_t = DEFAULT_MAX_ANIMATION_PIXELS)]
    pub max_animation_pixels: u64,

    /// Largest multipart body accepted, in bytes.
    #[arg(long, default_value_t = 20 * 1024 * 1024)]
    pub max_upload_bytes: u64,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn limits(&self) -> ParamLimits {
        ParamLimits {
            default_frames: self.default_frames,
            default_duration_secs: self.default_duration,
            max_frames: self.max_frames,
            max_duration_secs: self.max_duration,
            max_animation_pixels: self.max_animation_pixels,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let limits = ParamLimits::default();
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 5001,
            default_frames: limits.default_frames,
            default_duration: limits.default_duration_secs,
            max_frames: limits.max_frames,
            max_duration: limits.max_duration_secs,
            max_animation_pixels: limits.max_animation_pixels,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}
