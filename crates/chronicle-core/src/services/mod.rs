//! Services shared by every client of the engine.

mod calendar;

pub use calendar::CalendarService;
