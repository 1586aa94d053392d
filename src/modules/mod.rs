pub mod auto_timer;
pub mod config;
pub mod overlay;
pub mod race_machine;
pub mod redis;
pub mod session;
pub mod submission;

pub mod models {
    pub mod lap;
    pub mod overlay;
    pub mod race;
}

pub mod timing {
    pub mod clock;
    pub mod lap_timer;
    pub mod race_timer;
    pub mod reset_counter;
}

pub mod helpers {
    pub mod format;
    pub mod lap;
    pub mod logging;
    pub mod math;
}
