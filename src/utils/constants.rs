/// Offset between Kelvin and degrees Celsius
pub const KELVIN_OFFSET: f64 = 273.15;

/// Dataset variable names
pub const DEFAULT_TAS_VARIABLE: &str = "tas";

/// Column prefixes added to the station table during gap filling
pub const FILLED_PREFIX: &str = "filled_";
pub const COMBINED_PREFIX: &str = "combined_";

/// File names inside the validation workspace
pub const REFERENCE_FILE: &str = "era5_for_station.nc";
pub const REFERENCE_TEMP_FILE: &str = "era5_temp";
pub const REPORT_PDF_FILE: &str = "validation.pdf";
pub const REPORT_CSV_FILE: &str = "validation.csv";
pub const REPORT_ZIP_FILE: &str = "validation.zip";
pub const REPORT_PARQUET_FILE: &str = "validation.parquet";
pub const REPORT_SUMMARY_FILE: &str = "validation_summary.json";

/// Extensions bundled by `make_zip`
pub const REPORT_EXTENSIONS: [&str; 3] = ["png", "pdf", "csv"];

/// CSV column labels
pub const CSV_TIME_LABEL: &str = "time";
pub const RECONSTRUCTED_LABEL: &str = "Reconstructed";
pub const REFERENCE_LABEL: &str = "ERA5";
pub const MEASUREMENTS_LABEL: &str = "Measurements";

/// Chart sequence defaults
pub const DEFAULT_WINDOW_STEPS: usize = 168; // 7 days of hourly data
pub const DEFAULT_WINDOW_COUNT: usize = 5;
pub const DEFAULT_CHART_WIDTH: u32 = 1600;
pub const DEFAULT_CHART_HEIGHT: u32 = 960;

/// A3 landscape page in millimetres
pub const PAGE_WIDTH_MM: f32 = 420.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const PAGE_IMAGE_HEIGHT_MM: f32 = 240.0;
pub const PAGE_MARGIN_MM: f32 = 10.0;

/// Progress phases reported by the validation pipeline
pub const PHASE_VALIDATING: &str = "Validating";
pub const PHASE_CONVERTING: &str = "Converts grib to nc";
pub const PHASE_CROPPING: &str = "Cropping ERA5";
pub const PHASE_EVALUATING: &str = "Evaluating";
pub const PHASE_INFILLING: &str = "Infilling";
pub const PHASE_EXPORTING: &str = "Exporting";
pub const PHASE_PLOTTING: &str = "Plotting";
pub const PHASE_IDLE: &str = "";

/// TOA5 logger file conventions
pub const TOA5_MARKER: &str = "TOA5";
pub const TOA5_TIMESTAMP: &str = "TIMESTAMP";
pub const TOA5_RECORD: &str = "RECORD";
pub const TOA5_MISSING: &str = "NAN";
pub const TOA5_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const TOA5_EXTENSION: &str = "dat";

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
