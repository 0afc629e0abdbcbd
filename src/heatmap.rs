//! Rendering of the contribution graph as an SVG calendar heatmap.
//!
//! The graph has one column per week and one row per weekday, starting on Sunday. It covers the
//! 365 days before `today` plus `today` itself, padded at the start so that the first column
//! begins on a Sunday.

use crate::contributions::ContributionCounter;
use crate::{Error, Result};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Number of week columns.
pub const WEEKS: u32 = 53;
/// Number of weekday rows.
pub const DAYS_PER_WEEK: u32 = 7;
/// Length of the trailing window in days, not counting `today`.
pub const WINDOW_DAYS: i64 = 365;
/// Edge length of a cell.
pub const CELL_SIZE: u32 = 10;
/// Gap between two cells.
pub const CELL_MARGIN: u32 = 3;
/// Corner radius of a cell.
pub const CELL_RADIUS: u32 = 2;

const CELL_PITCH: u32 = CELL_SIZE + CELL_MARGIN;

/// An SVG color in `#rgb` or `#rrggbb` notation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Color> {
        let digits = s.strip_prefix('#').unwrap_or_default();

        if s.starts_with('#')
            && matches!(digits.len(), 3 | 6)
            && digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            Ok(Color(s.to_owned()))
        } else {
            Err(Error::InvalidSetting {
                name: "palette",
                reason: format!("`{s}` is not a hex color like #39d353"),
            })
        }
    }
}

impl TryFrom<String> for Color {
    type Error = Error;

    fn try_from(s: String) -> Result<Color> {
        s.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> String {
        color.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Discrete intensity level of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColorBucket {
    /// No contributions.
    Bucket0,
    /// 1 to 2 contributions.
    Bucket1,
    /// 3 to 5 contributions.
    Bucket2,
    /// 6 to 9 contributions.
    Bucket3,
    /// 10 or more contributions.
    Bucket4,
}

impl ColorBucket {
    /// Maps a contribution count to its bucket.
    pub fn from_count(count: u32) -> ColorBucket {
        match count {
            0 => ColorBucket::Bucket0,
            1..=2 => ColorBucket::Bucket1,
            3..=5 => ColorBucket::Bucket2,
            6..=9 => ColorBucket::Bucket3,
            _ => ColorBucket::Bucket4,
        }
    }

    /// Position of the bucket, from 0 for the lowest to 4 for the highest.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// The five fill colors, indexed by bucket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Palette([Color; 5]);

impl Palette {
    /// GitHub's dark mode colors.
    pub fn dark() -> Palette {
        Palette::from_static(["#161b22", "#0e4429", "#006d32", "#26a641", "#39d353"])
    }

    /// GitHub's light mode colors.
    pub fn light() -> Palette {
        Palette::from_static(["#ebedf0", "#9be9a8", "#40c463", "#30a14e", "#216e39"])
    }

    fn from_static(colors: [&'static str; 5]) -> Palette {
        Palette(colors.map(|color| Color(color.to_owned())))
    }

    pub fn color(&self, bucket: ColorBucket) -> &Color {
        &self.0[bucket.index()]
    }
}

/// Named palettes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn palette(self) -> Palette {
        match self {
            Theme::Dark => Palette::dark(),
            Theme::Light => Palette::light(),
        }
    }
}

/// The fixed 53 × 7 calendar layout for a given `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarGrid {
    today: NaiveDate,
    start_date: NaiveDate,
    start_of_graph: NaiveDate,
}

impl CalendarGrid {
    pub fn new(today: NaiveDate) -> CalendarGrid {
        let start_date = today - Duration::days(WINDOW_DAYS);
        // Walk back to the Sunday on or before `start_date`.
        let start_of_graph =
            start_date - Duration::days(i64::from(start_date.weekday().num_days_from_sunday()));

        CalendarGrid {
            today,
            start_date,
            start_of_graph,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// First day of the window.
    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// The date of the top-left cell; always a Sunday.
    pub fn start_of_graph(&self) -> NaiveDate {
        self.start_of_graph
    }

    /// Date of the cell in column `week` and row `day` (0 = Sunday).
    pub fn date_at(&self, week: u32, day: u32) -> NaiveDate {
        self.start_of_graph + Duration::days(i64::from(DAYS_PER_WEEK * week + day))
    }

    /// Whether `date` lies within `[start_date, today]`.
    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start_date..=self.today).contains(&date)
    }

    /// All grid positions whose date lies within the window, column by column.
    pub fn positions(&self) -> impl Iterator<Item = (u32, u32, NaiveDate)> + '_ {
        (0..WEEKS)
            .flat_map(|week| (0..DAYS_PER_WEEK).map(move |day| (week, day)))
            .map(|(week, day)| (week, day, self.date_at(week, day)))
            .filter(|(_, _, date)| self.contains(*date))
    }
}

/// A cell that is drawn on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub week: u32,
    pub day: u32,
    pub date: NaiveDate,
    pub count: u32,
    pub bucket: ColorBucket,
}

impl Cell {
    pub fn x(&self) -> u32 {
        self.week * CELL_PITCH
    }

    pub fn y(&self) -> u32 {
        self.day * CELL_PITCH
    }
}

/// A rendered contribution graph.
#[derive(Debug, Clone)]
pub struct Heatmap {
    grid: CalendarGrid,
    palette: Palette,
    cells: Vec<Cell>,
}

impl Heatmap {
    /// Lays out `counter` on the grid ending at `today`. Counts for dates outside of the window
    /// are ignored.
    pub fn render(counter: &ContributionCounter, today: NaiveDate, palette: Palette) -> Heatmap {
        let grid = CalendarGrid::new(today);

        let cells = grid
            .positions()
            .map(|(week, day, date)| {
                let count = counter.get(date);
                Cell {
                    week,
                    day,
                    date,
                    count,
                    bucket: ColorBucket::from_count(count),
                }
            })
            .collect();

        Heatmap {
            grid,
            palette,
            cells,
        }
    }

    pub fn grid(&self) -> &CalendarGrid {
        &self.grid
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Canvas width.
    pub fn width(&self) -> u32 {
        WEEKS * CELL_PITCH
    }

    /// Canvas height.
    pub fn height(&self) -> u32 {
        DAYS_PER_WEEK * CELL_PITCH
    }

    /// Returns the SVG document.
    pub fn to_svg(&self) -> String {
        self.to_string()
    }

    /// Writes the SVG document to `path`, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_svg())?;
        Ok(())
    }
}

impl fmt::Display for Heatmap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (width, height) = (self.width(), self.height());

        writeln!(f, r#"<?xml version="1.0" encoding="utf-8" ?>"#)?;
        writeln!(
            f,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}px" height="{height}px" viewBox="0 0 {width} {height}">"#
        )?;

        for cell in &self.cells {
            writeln!(
                f,
                r#"<rect x="{}" y="{}" width="{CELL_SIZE}" height="{CELL_SIZE}" rx="{CELL_RADIUS}" ry="{CELL_RADIUS}" fill="{}" data-date="{}" data-count="{}" />"#,
                cell.x(),
                cell.y(),
                self.palette.color(cell.bucket),
                cell.date,
                cell.count,
            )?;
        }

        writeln!(f, "</svg>")
    }
}
