//! Observation labels and value formatting.

/// Human-readable label for an observation type.
///
/// Unknown types are title-cased from their snake_case name.
pub fn label(obs_type: &str) -> String {
    let known = match obs_type {
        "out_temperature" => "Outside temperature",
        "in_temperature" => "Inside temperature",
        "dewpoint_temperature" => "Dew point",
        "out_humidity" => "Outside humidity",
        "in_humidity" => "Inside humidity",
        "wind_speed" => "Wind speed",
        "wind_gust" => "Wind gust",
        "wind_dir" => "Wind direction",
        "sealevel_pressure" => "Sea-level pressure",
        "altimeter_pressure" => "Altimeter",
        "radiation_radiation" => "Solar radiation",
        "rain_rain" => "Rain",
        "rain_rate" => "Rain rate",
        _ => "",
    };
    if !known.is_empty() {
        return known.to_string();
    }

    let mut out = String::with_capacity(obs_type.len());
    for (i, word) in obs_type.split('_').filter(|w| !w.is_empty()).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                out.extend(first.to_uppercase());
            } else {
                out.push(first);
            }
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Unit suffix and decimal places for an observation type.
fn unit(obs_type: &str) -> (&'static str, usize) {
    if obs_type.ends_with("_temperature") {
        ("°C", 1)
    } else if obs_type.ends_with("_humidity") {
        ("%", 0)
    } else if obs_type.ends_with("_pressure") {
        (" hPa", 1)
    } else if obs_type == "wind_dir" {
        ("°", 0)
    } else if obs_type.starts_with("wind_") {
        (" m/s", 1)
    } else if obs_type.starts_with("radiation") {
        (" W/m²", 0)
    } else if obs_type == "rain_rate" {
        (" mm/h", 1)
    } else if obs_type.starts_with("rain") {
        (" mm", 1)
    } else {
        ("", 2)
    }
}

/// Format a value with its unit, e.g. `21.4°C`.
pub fn format_value(obs_type: &str, value: f64) -> String {
    let (suffix, places) = unit(obs_type);
    if obs_type == "wind_dir" {
        return format!("{:.0}{} {}", value, suffix, compass_point(value));
    }
    format!("{:.*}{}", places, value, suffix)
}

/// Format an optional value, using "-" for missing observations.
pub fn format_optional(obs_type: &str, value: Option<f64>) -> String {
    value.map(|v| format_value(obs_type, v)).unwrap_or_else(|| "-".to_string())
}

/// Sixteen-point compass name for a bearing in degrees.
pub fn compass_point(degrees: f64) -> &'static str {
    const POINTS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
        "NW", "NNW",
    ];
    let normalized = degrees.rem_euclid(360.0);
    let index = ((normalized / 22.5) + 0.5) as usize % POINTS.len();
    POINTS[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_derived_labels() {
        assert_eq!(label("wind_speed"), "Wind speed");
        assert_eq!(label("soil_moisture_1"), "Soil moisture 1");
        assert_eq!(label("uv"), "Uv");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value("out_temperature", 21.44), "21.4°C");
        assert_eq!(format_value("out_humidity", 55.6), "56%");
        assert_eq!(format_value("sealevel_pressure", 1013.25), "1013.2 hPa");
        assert_eq!(format_value("wind_dir", 270.0), "270° W");
        assert_eq!(format_optional("wind_speed", None), "-");
    }

    #[test]
    fn test_compass_point_wraps() {
        assert_eq!(compass_point(0.0), "N");
        assert_eq!(compass_point(359.0), "N");
        assert_eq!(compass_point(-90.0), "W");
        assert_eq!(compass_point(135.0), "SE");
    }
}
