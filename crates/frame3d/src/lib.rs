pub mod config;
pub mod events;
pub mod frame;
pub mod platform {
    pub mod environment;
}
pub mod tasks {
    pub mod host;
    pub mod loader;
    pub mod viewer;
}
