//! Display helpers for IGDB platform names.

/// Short label for a platform name; unknown names pass through.
#[must_use]
pub fn format_platform_name(name: &str) -> &str {
    match name {
        "PC (Microsoft Windows)" => "PC",
        "PlayStation 4" => "PS4",
        "PlayStation 5" => "PS5",
        "Xbox One" => "XB1",
        "Xbox Series X|S" => "XSX",
        "Nintendo GameCube" => "GameCube",
        other => other,
    }
}

/// Merges "Nintendo Switch" and "Nintendo Switch 2" into one "Nintendo Switch 1+2" label.
#[must_use]
pub fn combine_special_platforms(names: Vec<String>) -> Vec<String> {
    if names.len() <= 1 {
        return names;
    }
    let has_switch = names.iter().any(|n| n == "Nintendo Switch");
    let has_switch2 = names.iter().any(|n| n == "Nintendo Switch 2");
    if !(has_switch && has_switch2) {
        return names;
    }
    let mut merged: Vec<String> = names
        .into_iter()
        .filter(|n| n != "Nintendo Switch" && n != "Nintendo Switch 2")
        .collect();
    merged.push("Nintendo Switch 1+2".to_string());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_are_shortened() {
        assert_eq!(format_platform_name("PlayStation 5"), "PS5");
        assert_eq!(format_platform_name("Sega Saturn"), "Sega Saturn");
    }

    #[test]
    fn switch_generations_merge() {
        let names = vec![
            "Nintendo Switch".to_string(),
            "PC".to_string(),
            "Nintendo Switch 2".to_string(),
        ];
        assert_eq!(
            combine_special_platforms(names),
            vec!["PC".to_string(), "Nintendo Switch 1+2".to_string()]
        );
    }

    #[test]
    fn single_switch_is_untouched() {
        let names = vec!["Nintendo Switch".to_string(), "PC".to_string()];
        assert_eq!(combine_special_platforms(names.clone()), names);
    }
}
