//! Status page rendering and publishing.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use homectl_protocol::{names, DoorState, StatusRecord};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::SinkError;

/// Seconds between browser refreshes.
const REFRESH_SECS: u32 = 10;

/// Links to the web server's protected control scripts.
const CONTROLS: &[(&str, &str)] = &[
    ("protected/openGarageDoor.html", "Open Garage Door"),
    ("protected/closeGarage.php", "Close Garage Door"),
    ("protected/homeMode.php", "Home Mode"),
    ("protected/awayMode.php", "Away Mode"),
    ("protected/setTempAuto.php", "Run Schedule"),
    ("protected/wakeUpServer.php", "Wake Up Server"),
];

/// Destination for complete status records.
pub trait StatusSink {
    /// Publish one record.
    fn publish(&mut self, record: &StatusRecord) -> Result<(), SinkError>;
}

/// Renders the status page and replaces the file at `path` atomically.
#[derive(Debug, Clone)]
pub struct HtmlPageSink {
    path: PathBuf,
}

impl HtmlPageSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        HtmlPageSink { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusSink for HtmlPageSink {
    fn publish(&mut self, record: &StatusRecord) -> Result<(), SinkError> {
        let page = StatusPage::new(record, Local::now()).to_string();
        write_atomically(&self.path, page.as_bytes())?;
        debug!("Status page written to {}", self.path.display());
        Ok(())
    }
}

/// Write to a temporary file beside `path`, then rename it into place so
/// readers never see a half-written page.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), SinkError> {
    let wrap = |source: io::Error| SinkError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(wrap)?;
    file.write_all(contents).map_err(wrap)?;
    file.as_file().sync_all().map_err(wrap)?;

    // Temporary files are created owner-only; the page must be world readable.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(wrap)?;
    }

    file.persist(path).map_err(|e| wrap(e.error))?;
    Ok(())
}

/// HTML view of one status record.
pub struct StatusPage<'a> {
    record: &'a StatusRecord,
    polled_at: DateTime<Local>,
}

impl<'a> StatusPage<'a> {
    pub fn new(record: &'a StatusRecord, polled_at: DateTime<Local>) -> Self {
        StatusPage { record, polled_at }
    }

    fn value(&self, name: &str) -> Cow<'a, str> {
        escape_html(self.record.get(name).unwrap_or_default())
    }

    fn is_set(&self, name: &str) -> bool {
        self.record.get(name).map(str::trim) == Some("1")
    }

    fn on_off(&self, name: &str) -> &'static str {
        if self.is_set(name) {
            "ON"
        } else {
            "OFF"
        }
    }

    fn write_furnace(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<strong>Furnace</strong><BR>")?;
        writeln!(f, "Furnace is: {}<BR>", self.on_off(names::FURNACE_STATUS))?;
        if self.is_set(names::FURNACE_STATUS) {
            write!(f, "{} minutes Now, ", self.value(names::FURNACE_RUNTIME_NOW))?;
        }
        writeln!(
            f,
            "{} minutes Today, {} minutes since reboot<BR>",
            self.value(names::FURNACE_RUNTIME_TODAY),
            self.value(names::FURNACE_RUNTIME_SINCE_REBOOT)
        )?;
        if self.is_set(names::MAINTAIN_TEMPERATURE) {
            writeln!(f, "Set Point: {}<BR>", self.value(names::TEMP_SET_POINT))?;
        } else {
            writeln!(f, "Temperature Control: Disabled<BR>")?;
        }
        writeln!(
            f,
            "Thermostat Schedule: {}<BR>",
            enabled(self.is_set(names::PROGRAMMABLE_THERMOSTAT_ENABLED))
        )?;

        let fan = if self.is_set(names::VENT_FAN_FORCE_ON) {
            "ON (forced)"
        } else {
            self.on_off(names::VENT_FAN_STATUS)
        };
        writeln!(
            f,
            "Vent Fan: {}, Auto: {}<BR>",
            fan,
            enabled(self.is_set(names::VENT_FAN_AUTO_ENABLED))
        )
    }

    fn write_main_floor(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<BR><strong>Main Floor</strong><BR>")?;
        writeln!(f, "Main Floor Temperature: {}<BR>", self.value(names::MAIN_FLOOR_AVG_TEMP))?;
        writeln!(f, "Living Room Temperature: {}<BR>", self.value(names::LIVING_ROOM_TEMPERATURE))?;
        writeln!(
            f,
            "Master Bedroom Temperature: {} Set Point: {} HEATER: {}<BR>",
            self.value(names::MASTER_BEDROOM_TEMPERATURE),
            self.value(names::MASTER_BEDROOM_TEMPERATURE_SET_POINT),
            self.on_off(names::BEDROOM_HEATER_STATUS)
        )?;
        writeln!(f, "Back Bedroom Temperature: {}<BR>", self.value(names::BACK_BEDROOM_TEMPERATURE))
    }

    fn write_basement(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<BR><strong>Basement</strong><BR>")?;
        writeln!(f, "Basement Temperature: {}<BR>", self.value(names::BASEMENT_TEMP_AMBIENT))?;
        if self.record.schema().contains(names::CONTROLLER_TEMPERATURE) {
            writeln!(
                f,
                "Controller Temperature: {}<BR>",
                self.value(names::CONTROLLER_TEMPERATURE)
            )?;
        }
        Ok(())
    }

    fn write_garage(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<BR><strong>Garage and Outdoor</strong><BR>")?;
        writeln!(f, "Garage Temperature: {}<BR>", self.value(names::GARAGE_TEMP_AMBIENT))?;
        writeln!(f, "Outdoor Temperature: {}<BR>", self.value(names::GARAGE_TEMP_OUTDOOR))?;

        match self.record.door_state() {
            Some(DoorState::Open) => writeln!(f, "Garage Door is OPEN<BR>")?,
            Some(DoorState::Closed) => writeln!(f, "Garage Door is CLOSED<BR>")?,
            None => writeln!(
                f,
                "Garage Door is UNKNOWN ({})<BR>",
                self.value(names::GARAGE_DOOR_STATUS)
            )?,
        }

        let block_heater = if self.is_set(names::BLOCK_HEATER_STATUS) {
            "ON"
        } else if self.is_set(names::BLOCK_HEATER_ENABLED) {
            "Scheduled"
        } else {
            "OFF"
        };
        writeln!(
            f,
            "Block Heater: {} (on {}:00, off {}:00)<BR>",
            block_heater,
            self.value(names::BLOCK_HEATER_ON_HOUR),
            self.value(names::BLOCK_HEATER_OFF_HOUR)
        )?;
        if self.record.schema().contains(names::BLOCK_HEATER_MAX_TEMP) {
            writeln!(
                f,
                "Block Heater Max Temperature: {}<BR>",
                self.value(names::BLOCK_HEATER_MAX_TEMP)
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for StatusPage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<HTML>")?;
        writeln!(f, "<HEAD>")?;
        writeln!(f, "<TITLE>Home Controller</TITLE>")?;
        writeln!(f, "<meta http-equiv=\"refresh\" content=\"{}\">", REFRESH_SECS)?;
        writeln!(f, "</HEAD>")?;
        writeln!(f, "<BODY bgcolor=\"#ACDBDA\">")?;

        self.write_furnace(f)?;
        self.write_main_floor(f)?;
        self.write_basement(f)?;
        self.write_garage(f)?;

        writeln!(f, "<BR><strong>Controls:</strong><BR>")?;
        for (href, label) in CONTROLS {
            writeln!(f, "<a href=\"{}\">{}</a><BR>", href, label)?;
        }

        writeln!(f, "<BR><BR>Last Update: {}<BR>", escape_html(self.record.timestamp()))?;
        writeln!(f, "Polled: {}<BR>", self.polled_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "</BODY>")?;
        writeln!(f, "</HTML>")
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "Enabled"
    } else {
        "Disabled"
    }
}

/// Escape text for inclusion in HTML.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use homectl_protocol::StatusSchema;

    fn record(schema: StatusSchema, overrides: &[(&str, &str)]) -> StatusRecord {
        let mut values: Vec<String> = vec!["0".to_string(); schema.len()];
        for (name, value) in overrides {
            let index = schema.position(name).unwrap();
            values[index] = value.to_string();
        }
        StatusRecord::new(schema, values).unwrap()
    }

    fn render(record: &StatusRecord) -> String {
        let polled_at = Local.with_ymd_and_hms(2024, 1, 15, 7, 30, 0).unwrap();
        StatusPage::new(record, polled_at).to_string()
    }

    #[test]
    fn test_page_has_sections_and_refresh() {
        let page = render(&record(
            StatusSchema::Standard,
            &[(names::DATE_TIME, "2024/01/15 07:29")],
        ));

        assert!(page.contains("<meta http-equiv=\"refresh\" content=\"10\">"));
        for section in ["Furnace", "Main Floor", "Basement", "Garage and Outdoor", "Controls:"] {
            assert!(page.contains(&format!("<strong>{}</strong>", section)), "missing {}", section);
        }
        assert!(page.contains("Last Update: 2024/01/15 07:29<BR>"));
        assert!(page.contains("Polled: 2024-01-15 07:30:00<BR>"));
    }

    #[test]
    fn test_furnace_lines() {
        let page = render(&record(
            StatusSchema::Standard,
            &[
                (names::FURNACE_STATUS, "1"),
                (names::FURNACE_RUNTIME_NOW, "12"),
                (names::MAINTAIN_TEMPERATURE, "1"),
                (names::TEMP_SET_POINT, "21.00"),
            ],
        ));
        assert!(page.contains("Furnace is: ON<BR>"));
        assert!(page.contains("12 minutes Now, "));
        assert!(page.contains("Set Point: 21.00<BR>"));
        assert!(page.contains("Thermostat Schedule: Disabled<BR>"));
    }

    #[test]
    fn test_door_and_block_heater() {
        let page = render(&record(
            StatusSchema::Standard,
            &[(names::GARAGE_DOOR_STATUS, "1"), (names::BLOCK_HEATER_ENABLED, "1")],
        ));
        assert!(page.contains("Garage Door is CLOSED<BR>"));
        assert!(page.contains("Block Heater: Scheduled"));

        let page = render(&record(StatusSchema::Standard, &[(names::GARAGE_DOOR_STATUS, "0")]));
        assert!(page.contains("Garage Door is OPEN<BR>"));

        let page = render(&record(StatusSchema::Standard, &[(names::GARAGE_DOOR_STATUS, "?")]));
        assert!(page.contains("Garage Door is UNKNOWN (?)<BR>"));
    }

    #[test]
    fn test_optional_fields_follow_schema() {
        let page = render(&record(StatusSchema::Standard, &[]));
        assert!(!page.contains("Controller Temperature"));
        assert!(!page.contains("Block Heater Max Temperature"));

        let page = render(&record(
            StatusSchema::Extended,
            &[(names::CONTROLLER_TEMPERATURE, "31.5")],
        ));
        assert!(page.contains("Controller Temperature: 31.5<BR>"));
        assert!(page.contains("Block Heater Max Temperature"));
    }

    #[test]
    fn test_values_are_escaped() {
        let page = render(&record(
            StatusSchema::Standard,
            &[(names::LIVING_ROOM_TEMPERATURE, "<script>&")],
        ));
        assert!(page.contains("Living Room Temperature: &lt;script&gt;&amp;<BR>"));
        assert!(!page.contains("<script>"));
    }

    #[test]
    fn test_escape_html_borrows_plain_text() {
        assert!(matches!(escape_html("21.50"), Cow::Borrowed("21.50")));
        assert_eq!(escape_html("a\"b'c"), "a&quot;b&#39;c");
    }

    #[test]
    fn test_sink_replaces_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html");
        fs::write(&path, "stale").unwrap();

        let mut sink = HtmlPageSink::new(&path);
        sink.publish(&record(StatusSchema::Standard, &[(names::DATE_TIME, "now")])).unwrap();

        let page = fs::read_to_string(&path).unwrap();
        assert!(page.starts_with("<HTML>"));
        assert!(page.contains("Last Update: now"));

        // Only the page itself is left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_sink_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("index.html");

        let err = HtmlPageSink::new(&path)
            .publish(&record(StatusSchema::Standard, &[]))
            .unwrap_err();
        assert!(matches!(err, SinkError::Write { path: ref p, .. } if p == &path));
    }
}
