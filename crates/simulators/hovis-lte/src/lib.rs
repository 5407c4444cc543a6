#![forbid(unsafe_code)]

pub mod lte {
    pub mod bucket;
    pub mod devices;
    pub mod map;
    pub mod remote;
    pub mod stack;
    pub mod telemetry;
    pub mod topology;
    pub mod traffic;
}

pub mod simulation {
    pub mod builder;
    pub mod config;
    pub mod ui;
}
