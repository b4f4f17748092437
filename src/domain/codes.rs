//! Code normalisation and work-type classification.

/// Left-pads a numeric category code to two digits (`"4"` -> `"04"`).
pub fn normalize_category(raw: &str) -> String {
    pad_numeric(raw, 2)
}

/// Left-pads a numeric model code to six digits (`"90401"` -> `"090401"`).
pub fn normalize_model(raw: &str) -> String {
    pad_numeric(raw, 6)
}

fn pad_numeric(raw: &str, width: usize) -> String {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        format!("{:0>width$}", trimmed, width = width)
    } else {
        trimmed.to_string()
    }
}

/// Right-pads `value` with spaces to exactly `width` characters, truncating
/// longer values. Used by the composition update's fixed-width columns.
pub fn rpad(value: &str, width: usize) -> String {
    let mut out: String = value.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat(' ').take(width - len));
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskClass {
    Installation,
    Removal,
    AfterService,
    Suspension,
}

impl TaskClass {
    /// Maps a work code (`01`..`09`) to its task class. Unknown codes are
    /// treated as installation work.
    pub fn from_work_code(work_code: &str) -> Self {
        match normalize_category(work_code).as_str() {
            "02" | "08" => TaskClass::Removal,
            "03" => TaskClass::AfterService,
            "04" => TaskClass::Suspension,
            _ => TaskClass::Installation,
        }
    }

    /// The backend's `CRR_TSK_CL` code.
    pub fn code(self) -> &'static str {
        match self {
            TaskClass::Installation => "01",
            TaskClass::Removal => "02",
            TaskClass::AfterService => "03",
            TaskClass::Suspension => "04",
        }
    }
}

/// Removal-class work reports the customer's units as the removal pool.
pub fn is_removal_work(work_code: &str) -> bool {
    matches!(
        normalize_category(work_code).as_str(),
        "02" | "07" | "08" | "09"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pads_numeric_codes() {
        assert_eq!(normalize_category("4"), "04");
        assert_eq!(normalize_category(" 10 "), "10");
        assert_eq!(normalize_model("90401"), "090401");
        assert_eq!(normalize_model("AB12"), "AB12");
        assert_eq!(normalize_model(""), "");
    }

    #[test]
    fn test_rpad_fixed_width() {
        assert_eq!(rpad("04", 10), "04        ");
        assert_eq!(rpad("12345678901", 10), "1234567890");
        assert_eq!(rpad("", 2), "  ");
    }

    #[test]
    fn test_task_class_mapping() {
        for code in ["01", "05", "06", "07", "09", "99"] {
            assert_eq!(TaskClass::from_work_code(code), TaskClass::Installation);
        }
        assert_eq!(TaskClass::from_work_code("2"), TaskClass::Removal);
        assert_eq!(TaskClass::from_work_code("08").code(), "02");
        assert_eq!(TaskClass::from_work_code("03"), TaskClass::AfterService);
        assert_eq!(TaskClass::from_work_code("04"), TaskClass::Suspension);
    }

    #[test]
    fn test_removal_work_codes() {
        assert!(is_removal_work("02"));
        assert!(is_removal_work("07"));
        assert!(!is_removal_work("01"));
        assert!(!is_removal_work("04"));
    }
}
