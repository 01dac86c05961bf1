use serde::{Deserialize, Deserializer};

/// Deserializes a field that distinguishes "absent" from "explicit null".
///
/// Used with `#[serde(default, deserialize_with = "patch::nullable")]` on
/// `Option<Option<T>>` fields: `None` means the field was omitted,
/// `Some(None)` means the client sent null to clear the value.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Payload {
        #[serde(default, deserialize_with = "super::nullable")]
        image: Option<Option<String>>,
    }

    #[test]
    fn omitted_field_is_none() {
        let p: Payload = serde_json::from_str("{}").unwrap();
        assert!(p.image.is_none());
    }

    #[test]
    fn explicit_null_is_some_none() {
        let p: Payload = serde_json::from_str(r#"{"image": null}"#).unwrap();
        assert_eq!(p.image, Some(None));
    }

    #[test]
    fn value_is_some_some() {
        let p: Payload = serde_json::from_str(r#"{"image": "https://x/y.png"}"#).unwrap();
        assert_eq!(p.image, Some(Some("https://x/y.png".to_string())));
    }
}
