use crate::error::Result;
use crate::models::StationMetadata;
use crate::utils::constants::{GHCN_ID_COLUMNS, GHCN_NAME_COLUMNS, GHCN_STATE_COLUMNS};
use memmap2::Mmap;
use rayon::prelude::*;
use std::borrow::Cow;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Reader for the fixed-width GHCN `ghcnd-stations.txt` inventory.
pub struct StationReader {
    state_filter: Option<String>,
    use_mmap: bool,
}

impl StationReader {
    pub fn new() -> Self {
        Self {
            state_filter: None,
            use_mmap: false,
        }
    }

    /// Keep only stations in `state` (two-letter code, e.g. `WI`).
    pub fn with_state_filter(mut self, state: impl Into<String>) -> Self {
        self.state_filter = Some(state.into());
        self
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    /// Read station metadata from the inventory file
    pub fn read_stations(&self, path: &Path) -> Result<Vec<StationMetadata>> {
        let stations = if self.use_mmap {
            let file = File::open(path)?;
            let mmap = unsafe { Mmap::map(&file)? };
            self.parse_stations(&decode(&mmap))
        } else {
            let bytes = std::fs::read(path)?;
            self.parse_stations(&decode(&bytes))
        };

        debug!(
            "Read {} stations from {} (filter: {:?})",
            stations.len(),
            path.display(),
            self.state_filter
        );
        Ok(stations)
    }

    /// Parse inventory text, keeping file order.
    pub fn parse_stations(&self, content: &str) -> Vec<StationMetadata> {
        content
            .par_lines()
            .filter_map(|line| self.parse_station_line(line))
            .filter(|station| match &self.state_filter {
                Some(state) => station.in_state(state),
                None => true,
            })
            .collect()
    }

    /// Parse a single fixed-width line; `None` for blank or malformed lines.
    fn parse_station_line(&self, line: &str) -> Option<StationMetadata> {
        // Columns: ID 1-11, LAT 13-20, LON 22-30, ELEV 32-37, ST 39-40, NAME 42-71
        let id = column(line, GHCN_ID_COLUMNS);
        let name = column(line, GHCN_NAME_COLUMNS);
        if id.is_empty() || name.is_empty() {
            return None;
        }

        let station = StationMetadata::new(id, name);
        let state = column(line, GHCN_STATE_COLUMNS);
        if state.is_empty() {
            Some(station)
        } else {
            Some(station.with_state(state))
        }
    }
}

impl Default for StationReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Inventory files are ASCII in practice; fall back to Windows-1252 for
/// the odd accented station name.
fn decode(bytes: &[u8]) -> Cow<'_, str> {
    match encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => text,
        None => encoding_rs::WINDOWS_1252.decode(bytes).0,
    }
}

/// Trimmed text of 1-based inclusive character columns.
fn column(line: &str, (start, end): (usize, usize)) -> String {
    line.chars()
        .skip(start - 1)
        .take(end + 1 - start)
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const INVENTORY: &str = "\
USC00470124  44.6333  -90.3833  291.1 WI ABBOTSFORD
USW00014837  43.1406  -89.3453  264.0 WI MADISON DANE CO RGNL AP        GSN     72641
USW00014922  44.8831  -93.2289  265.8 MN MINNEAPOLIS/ST PAUL AP         GSN HCN 72658
AE000041196  25.3330   55.5170   34.0    SHARJAH INTER. AIRP            GSN     41196
";

    #[test]
    fn test_parse_station_line() {
        let reader = StationReader::new();
        let line = "USW00014837  43.1406  -89.3453  264.0 WI MADISON DANE CO RGNL AP        GSN     72641";
        let station = reader.parse_station_line(line).unwrap();

        assert_eq!(station.id, "USW00014837");
        assert_eq!(station.name, "MADISON DANE CO RGNL AP");
        assert_eq!(station.state.as_deref(), Some("WI"));
    }

    #[test]
    fn test_line_without_state() {
        let reader = StationReader::new();
        let line = "AE000041196  25.3330   55.5170   34.0    SHARJAH INTER. AIRP            GSN     41196";
        let station = reader.parse_station_line(line).unwrap();

        assert_eq!(station.name, "SHARJAH INTER. AIRP");
        assert_eq!(station.state, None);
    }

    #[test]
    fn test_state_filter() {
        let stations = StationReader::new()
            .with_state_filter("WI")
            .parse_stations(INVENTORY);

        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].id, "USC00470124");
        assert_eq!(stations[1].id, "USW00014837");
    }

    #[test]
    fn test_read_stations_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        write!(temp_file, "{}", INVENTORY)?;
        writeln!(temp_file)?;

        let all = StationReader::new().read_stations(temp_file.path())?;
        assert_eq!(all.len(), 4);

        let mapped = StationReader::new()
            .with_mmap(true)
            .with_state_filter("MN")
            .read_stations(temp_file.path())?;
        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped[0].name, "MINNEAPOLIS/ST PAUL AP");

        Ok(())
    }

    #[test]
    fn test_windows_1252_names() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        let mut line =
            b"MXN00001234  19.4000  -99.1000 2240.0    CIUDAD DE M".to_vec();
        line.push(0xC9); // É in Windows-1252
        line.extend_from_slice(b"XICO\n");
        temp_file.write_all(&line)?;

        let stations = StationReader::new().read_stations(temp_file.path())?;
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].name, "CIUDAD DE MÉXICO");

        Ok(())
    }
}
