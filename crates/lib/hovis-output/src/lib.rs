#![forbid(unsafe_code)]

pub mod logger;
pub mod rem;
pub mod result;
pub mod terminal;
pub mod trace;
pub mod tracker;
pub mod ui;
pub mod writer;

pub mod tables {
    pub mod rsrp;
    pub mod rx;
}
