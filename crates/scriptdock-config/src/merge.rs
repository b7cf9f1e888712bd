/// Recursively deep-merge `overlay` into `base`.
///
/// - Tables merge recursively per-field.
/// - Scalars and arrays from the overlay **replace** the base value, so a
///   user-supplied `[[risk.patterns]]` list replaces the default list
///   instead of appending to it.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_tables_merge_per_field() {
        let mut base = parse("[watch]\nenabled = true\ndebounce_ms = 500\n");
        deep_merge(&mut base, &parse("[watch]\ndebounce_ms = 50\n"));

        assert_eq!(base["watch"]["enabled"].as_bool(), Some(true));
        assert_eq!(base["watch"]["debounce_ms"].as_integer(), Some(50));
    }

    #[test]
    fn test_arrays_are_replaced() {
        let mut base = parse("[metadata]\ndescription_labels = [\"A:\", \"B:\"]\n");
        deep_merge(
            &mut base,
            &parse("[metadata]\ndescription_labels = [\"C:\"]\n"),
        );

        let labels = base["metadata"]["description_labels"].as_array().unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].as_str(), Some("C:"));
    }

    #[test]
    fn test_new_sections_are_inserted() {
        let mut base = parse("[watch]\nenabled = true\n");
        deep_merge(&mut base, &parse("[logging]\nlevel = \"debug\"\n"));

        assert_eq!(base["logging"]["level"].as_str(), Some("debug"));
        assert_eq!(base["watch"]["enabled"].as_bool(), Some(true));
    }
}
