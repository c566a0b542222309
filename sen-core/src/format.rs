//! Formatação de relatórios de medição (txt, json, xml)

use std::fmt::{self, Write as _};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat};
use serde::ser::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::SenError;
use crate::types::Measurement;

/// Formato de saída
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
    Xml,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Json, OutputFormat::Xml, OutputFormat::Txt];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Xml => "xml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = SenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(OutputFormat::Txt),
            "json" => Ok(OutputFormat::Json),
            "xml" => Ok(OutputFormat::Xml),
            other => Err(SenError::Config(format!(
                "unknown output format '{}' (expected json, xml or txt)",
                other
            ))),
        }
    }
}

/// Formata milissegundos Unix como RFC 3339 em UTC (`2023-11-14T22:13:20.123Z`)
///
/// Fora do intervalo representável, devolve os milissegundos crus.
pub fn rfc3339_millis(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| timestamp_ms.to_string())
}

/// Relatório de uma medição, como impresso por `senlib`
#[derive(Debug, Clone)]
pub struct Report<'a> {
    pub name: &'a str,
    pub measurement: &'a Measurement,
}

impl<'a> Report<'a> {
    pub fn new(name: &'a str, measurement: &'a Measurement) -> Self {
        Self { name, measurement }
    }

    pub fn timestamp(&self) -> String {
        rfc3339_millis(self.measurement.timestamp_ms())
    }

    /// Só o formato json pode falhar
    pub fn render(&self, format: OutputFormat, pretty: bool) -> serde_json::Result<String> {
        match format {
            OutputFormat::Txt => Ok(self.to_text()),
            OutputFormat::Json => self.to_json(pretty),
            OutputFormat::Xml => Ok(self.to_xml(pretty)),
        }
    }

    pub fn to_value(&self) -> Value {
        let measurements: Map<String, Value> = self
            .measurement
            .iter()
            .map(|(q, v)| (q.name().to_string(), json!(v)))
            .collect();
        json!({
            "name": self.name,
            "timestamp": self.timestamp(),
            "measurements": measurements,
        })
    }

    pub fn to_text(&self) -> String {
        let mut out = format!("timestamp: {}\n", self.timestamp());
        for (quantity, value) in self.measurement.iter() {
            let _ = writeln!(out, "{}: {}", quantity, value);
        }
        out
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        let value = self.to_value();
        if !pretty {
            return serde_json::to_string(&value);
        }
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value.serialize(&mut ser)?;
        String::from_utf8(buf).map_err(serde_json::Error::custom)
    }

    pub fn to_xml(&self, pretty: bool) -> String {
        let (nl, ind) = if pretty { ("\n", "\t") } else { ("", "") };
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>");
        out.push_str(nl);
        let _ = write!(out, "<sensor>{nl}");
        let _ = write!(out, "{ind}<name>{}</name>{nl}", xml_escape(self.name));
        let _ = write!(out, "{ind}<timestamp>{}</timestamp>{nl}", self.timestamp());
        let _ = write!(out, "{ind}<measurements>{nl}");
        for (quantity, value) in self.measurement.iter() {
            let _ = write!(out, "{ind}{ind}<{q}>{value}</{q}>{nl}", q = quantity.name());
        }
        let _ = write!(out, "{ind}</measurements>{nl}");
        out.push_str("</sensor>");
        out.push_str(nl);
        out
    }
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Quantity;

    const TS: u64 = 1_700_000_000_123;

    fn measurement() -> Measurement {
        Measurement::new(
            [(Quantity::Temperature, 28.5), (Quantity::Humidity, 25.2)],
            TS,
        )
    }

    #[test]
    fn test_rfc3339() {
        assert_eq!(rfc3339_millis(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(rfc3339_millis(TS), "2023-11-14T22:13:20.123Z");
        assert_eq!(rfc3339_millis(951_782_400_000), "2000-02-29T00:00:00.000Z");
        assert_eq!(rfc3339_millis(4_102_444_799_999), "2099-12-31T23:59:59.999Z");
    }

    #[test]
    fn test_rfc3339_out_of_range() {
        assert_eq!(rfc3339_millis(u64::MAX), u64::MAX.to_string());
        assert_eq!(rfc3339_millis(253_402_300_799_999), "9999-12-31T23:59:59.999Z");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("txt".parse::<OutputFormat>().unwrap(), OutputFormat::Txt);
        assert!("yaml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default().to_string(), "txt");
    }

    #[test]
    fn test_text_report() {
        let m = measurement();
        let text = Report::new("bme280", &m).to_text();
        assert_eq!(
            text,
            "timestamp: 2023-11-14T22:13:20.123Z\nhumidity: 25.2\ntemperature: 28.5\n"
        );
    }

    #[test]
    fn test_json_report() {
        let m = measurement();
        let json = Report::new("bme280", &m).to_json(false).unwrap();
        assert_eq!(
            json,
            r#"{"measurements":{"humidity":25.2,"temperature":28.5},"name":"bme280","timestamp":"2023-11-14T22:13:20.123Z"}"#
        );
    }

    #[test]
    fn test_json_pretty_uses_four_spaces() {
        let m = measurement();
        let json = Report::new("bme280", &m).to_json(true).unwrap();
        assert!(json.contains("\n    \"name\": \"bme280\""));
        assert!(json.contains("\n        \"humidity\": 25.2"));
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["measurements"]["temperature"], 28.5);
    }

    #[test]
    fn test_xml_report() {
        let m = measurement();
        let xml = Report::new("bme280", &m).to_xml(false);
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\" ?><sensor><name>bme280</name>\
             <timestamp>2023-11-14T22:13:20.123Z</timestamp><measurements>\
             <humidity>25.2</humidity><temperature>28.5</temperature>\
             </measurements></sensor>"
        );

        let pretty = Report::new("a&b", &m).to_xml(true);
        assert!(pretty.contains("\t<name>a&amp;b</name>\n"));
        assert!(pretty.contains("\t\t<humidity>25.2</humidity>\n"));
    }

    #[test]
    fn test_render_dispatch() {
        let m = measurement();
        let report = Report::new("mock-sensor", &m);
        for format in OutputFormat::ALL {
            let out = report.render(format, false).unwrap();
            assert!(out.contains("28.5"), "{format}: {out}");
        }
    }
}
