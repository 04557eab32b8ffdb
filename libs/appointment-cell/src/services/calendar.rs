use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::models::{Appointment, AppointmentError};

/// Appointments grouped by calendar day. Within a day the order is the order
/// the records were indexed in.
#[derive(Debug, Clone, Default)]
pub struct CalendarIndex {
    days: BTreeMap<NaiveDate, Vec<Appointment>>,
}

impl CalendarIndex {
    pub fn build(appointments: &[Appointment]) -> Self {
        let mut days: BTreeMap<NaiveDate, Vec<Appointment>> = BTreeMap::new();
        for appointment in appointments {
            days.entry(appointment.date()).or_default().push(appointment.clone());
        }
        Self { days }
    }

    pub fn on(&self, date: NaiveDate) -> &[Appointment] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.days.keys()
    }

    /// Month grid with per-day appointment counts filled in.
    pub fn month(&self, year: i32, month: u32) -> Result<MonthGrid, AppointmentError> {
        let mut grid = MonthGrid::new(year, month)?;
        for day in &mut grid.days {
            day.appointment_count = self.on(day.date).len();
        }
        Ok(grid)
    }

    /// Agenda for a clicked cell; `None` for cells outside the month.
    pub fn agenda(&self, grid: &MonthGrid, date: NaiveDate) -> Option<DayAgenda> {
        let date = grid.select(date)?;
        Some(DayAgenda {
            date,
            appointments: self.on(date).to_vec(),
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub in_current_month: bool,
    /// Leading and trailing days of neighbouring months cannot be clicked.
    pub selectable: bool,
    pub appointment_count: usize,
}

/// Sunday-first, whole-week grid covering one month.
#[derive(Debug, Clone, Serialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
}

impl MonthGrid {
    pub fn new(year: i32, month: u32) -> Result<Self, AppointmentError> {
        let invalid = || AppointmentError::InvalidMonth { year, month };
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(invalid)?;
        let last = next_month - Duration::days(1);

        let start = first - Duration::days(first.weekday().num_days_from_sunday() as i64);
        let end = last + Duration::days(6 - last.weekday().num_days_from_sunday() as i64);

        let days = start
            .iter_days()
            .take_while(|date| *date <= end)
            .map(|date| {
                let in_current_month = date.month() == month && date.year() == year;
                CalendarDay {
                    date,
                    in_current_month,
                    selectable: in_current_month,
                    appointment_count: 0,
                }
            })
            .collect();

        Ok(Self { year, month, days })
    }

    pub fn weeks(&self) -> impl Iterator<Item = &[CalendarDay]> {
        self.days.chunks(7)
    }

    /// Returns the date if its cell is interactive.
    pub fn select(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.days
            .iter()
            .find(|day| day.date == date && day.selectable)
            .map(|day| day.date)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DayAgenda {
    pub date: NaiveDate,
    pub appointments: Vec<Appointment>,
}
