#![forbid(unsafe_code)]

pub mod dist;
pub mod error;

pub mod device {
    pub mod mobility;
    pub mod placement;
}

pub mod net {
    pub mod address;
    pub mod capacity;
    pub mod handover;
    pub mod radio;
    pub mod traffic;
}
