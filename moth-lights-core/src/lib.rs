pub mod audio;
pub mod config;
pub mod controller;
pub mod errors;
pub mod fps;
pub mod installation;
pub mod lights;
pub mod logging;
pub mod output;
pub mod params;
pub mod scheduler;
pub mod settings;
pub mod windows;
