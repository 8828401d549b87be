use std::fmt::Write;

use super::dto::ReadingDto;

/// Render readings as a standalone HTML page with one table row each.
pub fn render_table(readings: &[ReadingDto]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Sensor readings</title></head>\n<body>\n\
         <h1>Sensor readings</h1>\n<table border=\"1\">\n\
         <tr><th>Device</th><th>Temperature (°C)</th><th>Humidity (%)</th>\
         <th>Light</th><th>Motion</th><th>Timestamp</th></tr>\n",
    );

    for r in readings {
        let light = r.light.map(|l| l.to_string()).unwrap_or_else(|| "-".into());
        let motion = r.motion.map(|m| m.to_string()).unwrap_or_else(|| "-".into());
        // Writing into a String cannot fail.
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{:.1}</td><td>{:.1}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&r.device_id),
            r.temperature,
            r.humidity,
            light,
            motion,
            escape(&r.timestamp),
        );
    }

    if readings.is_empty() {
        html.push_str("<tr><td colspan=\"6\">No readings yet</td></tr>\n");
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
