pub mod calendar;
pub mod feed;
pub mod lifecycle;
pub mod operator;
pub mod pricing;
pub mod views;

pub use calendar::{CalendarDay, CalendarIndex, DayAgenda, MonthGrid};
pub use feed::{appointments_collection, appointments_query, fetch_appointment, fetch_appointments, AppointmentDashboard};
pub use lifecycle::{AppointmentLifecycleController, AppointmentLifecycleService, LifecycleOutcome, REFUND_REASON};
pub use operator::{ChannelPrompt, OperatorMessage, OperatorPrompt, OperatorRequest, OperatorResponse, PreAnswered};
pub use pricing::RefundQuote;
pub use views::{AppointmentStats, DashboardQuery, DashboardView, SortState, StatusView, ViewCache};
