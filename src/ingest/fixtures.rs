/// Test fixtures: representative JSON payloads from the PegelOnline REST API.
///
/// Shapes returned by https://www.pegelonline.wsv.de/webservices/rest-api/v2
///
///   /stations/{uuid}/W/currentmeasurement.json
///     { "timestamp": "...+02:00", "value": 312.0,
///       "stateMnwMhw": "normal", "stateNswHsw": "normal" }
///
///   /stations/{uuid}/W/measurements.json?start=P10D
///     [ { "timestamp": "...+02:00", "value": 305.0 }, ... ]
///
/// Timestamps carry a local offset (CET/CEST). Values are centimeters.

/// Current reading at Köln, summer time offset.
pub(crate) fn fixture_current_measurement_json() -> &'static str {
    r#"{
      "timestamp": "2024-05-01T14:15:00+02:00",
      "value": 312.0,
      "stateMnwMhw": "normal",
      "stateNswHsw": "normal"
    }"#
}

/// Three readings 15 minutes apart, oldest first, with a +02:00 offset.
pub(crate) fn fixture_measurements_json() -> &'static str {
    r#"[
      { "timestamp": "2024-05-01T14:00:00+02:00", "value": 310.0 },
      { "timestamp": "2024-05-01T14:15:00+02:00", "value": 311.0 },
      { "timestamp": "2024-05-01T14:30:00+02:00", "value": 312.0 }
    ]"#
}

/// Readings mixing a winter offset, an explicit UTC designator and a
/// timestamp with no offset at all, plus a below-datum level.
pub(crate) fn fixture_mixed_offsets_json() -> &'static str {
    r#"[
      { "timestamp": "2024-01-15T08:00:00+01:00", "value": 45.0 },
      { "timestamp": "2024-01-15T07:15:00Z", "value": 44.0 },
      { "timestamp": "2024-01-15T07:30:00", "value": -3.5 }
    ]"#
}

/// Station known to the API but with nothing in the requested window.
pub(crate) fn fixture_empty_measurements_json() -> &'static str {
    "[]"
}

/// HTML error page served with a 200 by an upstream proxy.
pub(crate) fn fixture_not_json() -> &'static str {
    "<html><body>Service temporarily unavailable</body></html>"
}

/// Well-formed JSON whose timestamp cannot be read.
pub(crate) fn fixture_bad_timestamp_json() -> &'static str {
    r#"[ { "timestamp": "yesterday at noon", "value": 300.0 } ]"#
}
