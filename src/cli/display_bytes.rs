use std::fmt;

const BYTE_UNITS: &[&str] = &["kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// A number of bytes displayed with the largest decimal unit that keeps it above 1.
pub struct DisplayBytes {
    unit: Option<&'static str>,
    value: f64,
}

impl fmt::Display for DisplayBytes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(unit) = self.unit {
            write!(f, "{:.2} {}", self.value, unit)
        } else {
            write!(f, "{:.0} B", self.value)
        }
    }
}

impl DisplayBytes {
    pub fn new(value: u64) -> Self {
        let value = value as f64;

        match BYTE_UNITS
            .iter()
            .enumerate()
            .map(|(i, u)| (value / 1000_f64.powf(i as f64 + 1.0), *u))
            .take_while(|(i, _)| *i > 1.0)
            .last()
        {
            Some((value, unit)) => Self {
                unit: Some(unit),
                value,
            },
            None => Self { unit: None, value },
        }
    }
}
