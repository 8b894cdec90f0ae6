use serde_json::Value;

/// Whether a submitted location payload counts as present.
///
/// Null, empty objects, empty arrays and empty strings do not count.
pub fn location_present(location: Option<&Value>) -> bool {
    match location {
        None | Some(Value::Null) => false,
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Face evidence for a mark.
///
/// Without a face-match service, submitting an image is the signal. With one,
/// only a positive match counts.
pub fn face_present(image_submitted: bool, matcher_verdict: Option<bool>) -> bool {
    match matcher_verdict {
        Some(verified) => image_submitted && verified,
        None => image_submitted,
    }
}
