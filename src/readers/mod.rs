pub mod station_reader;
pub mod temperature_reader;

pub use station_reader::StationReader;
pub use temperature_reader::{parse_date, TemperatureReader};
