use chrono::NaiveDateTime;
use uuid::Uuid;

/// Generate the gap-filled export filename: infilled_{YYYYMMDD}_{YYYYMMDD}.{ext}
pub fn infilled_file_name(first: NaiveDateTime, last: NaiveDateTime, extension: &str) -> String {
    format!(
        "infilled_{}_{}.{}",
        first.format("%Y%m%d"),
        last.format("%Y%m%d"),
        extension.trim_start_matches('.')
    )
}

/// Generate a collision-free filename with the given extension
pub fn unique_file_name(extension: &str) -> String {
    format!("{}.{}", Uuid::new_v4(), extension.trim_start_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_infilled_file_name() {
        let name = infilled_file_name(at(2023, 1, 5, 0), at(2023, 12, 31, 23), "dat");
        assert_eq!(name, "infilled_20230105_20231231.dat");
    }

    #[test]
    fn test_infilled_file_name_strips_leading_dot() {
        let name = infilled_file_name(at(2021, 6, 1, 12), at(2021, 6, 1, 13), ".csv");
        assert_eq!(name, "infilled_20210601_20210601.csv");
    }

    #[test]
    fn test_unique_file_name() {
        let first = unique_file_name("png");
        let second = unique_file_name("png");

        assert!(first.ends_with(".png"));
        assert_eq!(first.len(), 36 + 4);
        assert_ne!(first, second);
    }
}
