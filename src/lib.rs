pub mod errors;
pub mod modules;

pub use modules::race_machine::{Outcome, RaceEvent, RaceMachine, RaceState, SessionView};
pub use modules::session::{RaceSession, SessionHandle};
