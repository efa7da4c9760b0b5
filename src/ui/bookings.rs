use crate::bookings::BookingRecord;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table, Widget},
};

pub const COLUMNS: [&str; 9] = [
    "#",
    "First Name",
    "Last Name",
    "Check-In",
    "Check-Out",
    "Hotel",
    "Room Type",
    "Guests",
    "Status",
];

/// Read-only table of the current bookings
pub struct BookingTable<'a> {
    records: &'a [BookingRecord],
}

impl<'a> BookingTable<'a> {
    pub fn new(records: &'a [BookingRecord]) -> Self {
        Self { records }
    }
}

/// Cell texts for one record, in [`COLUMNS`] order
pub fn row_cells(record: &BookingRecord) -> [String; 9] {
    let date = |date: Option<chrono::NaiveDate>| date.map(|d| d.to_string()).unwrap_or_default();
    [
        record.booking_number.clone(),
        record.first_name.clone().unwrap_or_default(),
        record.last_name.clone().unwrap_or_default(),
        date(record.check_in_date),
        date(record.check_out_date),
        record.hotel_name.clone().unwrap_or_default(),
        record.room_type.map(|room| room.to_string()).unwrap_or_default(),
        record.number_of_guests.to_string(),
        status_icon(record).to_string(),
    ]
}

pub fn status_icon(record: &BookingRecord) -> &'static str {
    if record.is_confirmed() { "✅" } else { "❌" }
}

impl Widget for BookingTable<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let header = Row::new(COLUMNS.iter().map(|title| Cell::from(*title)))
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

        let rows = self.records.iter().map(|record| {
            let style = if record.is_confirmed() {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Row::new(row_cells(record).map(Cell::from)).style(style)
        });

        let widths = [
            Constraint::Length(6),
            Constraint::Min(8),
            Constraint::Min(8),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Min(12),
            Constraint::Length(9),
            Constraint::Length(6),
            Constraint::Length(6),
        ];

        let title = format!("Hotel Bookings Database ({})", self.records.len());
        Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(title))
            .column_spacing(1)
            .render(area, buf);
    }
}
